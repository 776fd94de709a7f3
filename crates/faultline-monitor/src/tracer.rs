use indexmap::IndexMap;

/// Classification of a kernel-delivered event for a traced process.
///
/// Every event reported by a [Tracer] falls into exactly one of these three
/// categories; anything else is a fatal tracer-internal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    /// A signal was delivered to a traced process, which is now stopped.
    Signal {
        /// Process the signal was delivered to.
        process_id: u64,

        /// Raw signal number.
        signal: i32,
    },

    /// A generic lifecycle stop (e.g., a ptrace event notification).
    Lifecycle {
        /// Process that stopped.
        process_id: u64,

        /// Raw event code, as reported by the tracing facility.
        event: i32,
    },

    /// A traced process exited.
    Exit {
        /// Process that exited.
        process_id: u64,

        /// How the process exited.
        status: ExitStatus,
    },
}

impl TraceEvent {
    /// Returns the process this event refers to.
    pub const fn process_id(&self) -> u64 {
        match self {
            Self::Signal { process_id, .. }
            | Self::Lifecycle { process_id, .. }
            | Self::Exit { process_id, .. } => *process_id,
        }
    }
}

/// Exit status of a traced process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The process exited with the given code.
    Code(i32),

    /// The process was terminated by the given signal.
    Signal(i32),
}

/// One frame of a backtrace gathered from a stopped process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Instruction address of the frame.
    pub instr_addr: u64,

    /// Symbol the address resolves to, when available.
    pub symbol: Option<String>,
}

/// Trait for implementing a process tracer.
///
/// A tracer is able to put target processes under trace (by spawning them or
/// attaching to them) and to block until the next event concerning any of
/// them.
pub trait Tracer {
    /// Handle over one traced process.
    type Process: TracedProcess<Error = Self::Error>;

    /// Error returned by this tracer.
    type Error: std::error::Error;

    /// Puts the next target under trace, leaving it stopped.
    ///
    /// Called once per initial target and again whenever a crashed target is
    /// respawned.
    fn spawn(&mut self) -> Result<Self::Process, Self::Error>;

    /// Blocks until the next event from any traced process.
    ///
    /// An event that cannot be classified as a [TraceEvent] is an error.
    fn wait_event(&mut self) -> Result<TraceEvent, Self::Error>;
}

/// Trait describing one process under trace.
///
/// The forensic accessors are independently best-effort: any of them may be
/// unsupported for a given platform or process state, and callers are
/// expected to tolerate individual failures.
pub trait TracedProcess {
    /// Error returned by this process handle.
    type Error: std::error::Error;

    /// Returns the process ID.
    fn id(&self) -> u64;

    /// Whether the process is still attached to the tracer.
    fn is_attached(&self) -> bool;

    /// Resumes the stopped process, optionally delivering a signal.
    fn resume(&mut self, signal: Option<i32>) -> Result<(), Self::Error>;

    /// Detaches from the process, leaving it running.
    fn detach(&mut self) -> Result<(), Self::Error>;

    /// Captures a register snapshot of the stopped process.
    fn registers(&mut self) -> Result<IndexMap<String, u64>, Self::Error>;

    /// Reads up to `max_words` machine words from the top of the stack.
    fn stack(&mut self, max_words: usize) -> Result<Vec<(u64, u64)>, Self::Error>;

    /// Computes a backtrace of at most `max_depth` frames.
    fn backtrace(&mut self, max_depth: usize) -> Result<Vec<Frame>, Self::Error>;

    /// Disassembles up to `max_instrs` instructions at the current
    /// instruction pointer.
    fn disassembly(&mut self, max_instrs: usize) -> Result<Vec<(u64, String)>, Self::Error>;

    /// Returns the memory map of the process, one region per line.
    fn memory_maps(&self) -> Result<Vec<String>, Self::Error>;
}
