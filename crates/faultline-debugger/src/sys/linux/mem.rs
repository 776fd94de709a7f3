use nix::errno::Errno;
use nix::libc::{iovec, process_vm_readv};
use nix::unistd::Pid;

/// Reads memory from the process with the given ID.
///
/// Returns the number of bytes actually read, which may be less than
/// `buf.len()` when the range crosses into unmapped memory.
pub fn read_process_memory(pid: Pid, addr: u64, buf: &mut [u8]) -> crate::Result<usize> {
    let local_iov = iovec {
        iov_base: buf.as_mut_ptr().cast(),
        iov_len: buf.len(),
    };

    let remote_iov = iovec {
        iov_base: addr as *mut _,
        iov_len: buf.len(),
    };

    let len = unsafe {
        Errno::result(process_vm_readv(
            pid.as_raw(),
            &local_iov as *const _,
            1,
            &remote_iov as *const _,
            1,
            0,
        ))
        .inspect_err(
            |e| tracing::debug!(error = %e, addr = format_args!("{addr:#x}"), "process_vm_readv"),
        )
        .map(|len| len as usize)?
    };

    if len == 0 {
        Err(crate::Error::PartialMemOp(0, buf.len()))
    } else {
        Ok(len)
    }
}
