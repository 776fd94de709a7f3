/// Finds the IDs of every running process whose command name is `name`.
///
/// The command name is what the kernel reports in `/proc/<pid>/comm`,
/// which is truncated to 15 characters.
pub fn pids_by_name(name: &str) -> std::io::Result<Vec<i32>> {
    let mut pids = Vec::new();

    for entry in std::fs::read_dir("/proc")? {
        let entry = entry?;

        let Ok(pid) = entry.file_name().to_string_lossy().parse::<i32>() else {
            continue;
        };

        // the process may be gone by the time we read its comm
        let Ok(comm) = std::fs::read_to_string(entry.path().join("comm")) else {
            continue;
        };

        if comm.trim_end() == name {
            pids.push(pid);
        }
    }

    pids.sort_unstable();

    Ok(pids)
}
