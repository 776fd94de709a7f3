/// Error type of this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The target process could not be spawned.
    #[error("failed to spawn traced process: {0}")]
    Spawn(std::io::Error),

    /// Generic I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The tracer has no pending attach target and no spawn command.
    #[error("no process left to trace (no spawn command configured)")]
    NoTarget,

    /// OS-level tracing error.
    #[cfg(target_os = "linux")]
    #[error("os error: {0}")]
    Os(#[from] nix::Error),

    /// A wait on traced processes reported an unclassifiable status.
    #[cfg(target_os = "linux")]
    #[error("bad child wait status: {0:?}")]
    BadChildWait(nix::sys::wait::WaitStatus),

    /// Disassembly error.
    #[cfg(target_os = "linux")]
    #[error(transparent)]
    Disasm(#[from] capstone::Error),

    /// A memory read returned fewer bytes than requested.
    #[error("memory read {0} bytes instead of {1}")]
    PartialMemOp(usize, usize),
}

/// Result type of this crate.
pub type Result<T> = core::result::Result<T, Error>;
