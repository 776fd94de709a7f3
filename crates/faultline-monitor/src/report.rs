use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use nix::sys::signal::Signal;

/// Fault signal recognized as a crash of the traced process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultSignal {
    /// Illegal instruction (`SIGILL`).
    IllegalInstruction,

    /// Abnormal termination requested by the process itself (`SIGABRT`).
    Abort,

    /// Floating-point exception (`SIGFPE`).
    FloatingPointError,

    /// Bus error (`SIGBUS`).
    BusError,

    /// Segmentation fault (`SIGSEGV`).
    SegmentationFault,

    /// Bad system call (`SIGSYS`).
    BadSyscall,
}

impl FaultSignal {
    /// Classifies a raw signal number, returning `None` for signals that are
    /// not considered faults.
    pub fn from_raw(signal: i32) -> Option<Self> {
        match Signal::try_from(signal).ok()? {
            Signal::SIGILL => Some(Self::IllegalInstruction),
            Signal::SIGABRT => Some(Self::Abort),
            Signal::SIGFPE => Some(Self::FloatingPointError),
            Signal::SIGBUS => Some(Self::BusError),
            Signal::SIGSEGV => Some(Self::SegmentationFault),
            Signal::SIGSYS => Some(Self::BadSyscall),
            _ => None,
        }
    }

    /// Returns the conventional name of the signal (e.g., `SIGSEGV`).
    pub const fn name(self) -> &'static str {
        match self {
            Self::IllegalInstruction => "SIGILL",
            Self::Abort => "SIGABRT",
            Self::FloatingPointError => "SIGFPE",
            Self::BusError => "SIGBUS",
            Self::SegmentationFault => "SIGSEGV",
            Self::BadSyscall => "SIGSYS",
        }
    }
}

/// One backtrace frame of a crash report.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BacktraceFrame {
    /// Symbol the frame's instruction pointer resolves to, or `??`.
    pub symbol: String,

    /// Formatted call arguments, when the tracer can recover them.
    pub arguments: Vec<String>,
}

/// Forensic record of one observed fault, immutable once serialized.
///
/// Built incrementally on the debug thread (each forensic section is
/// best-effort and may stay empty), then annotated with the crashing
/// `stream` and the retained `history` by the crash correlator before
/// being written out.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CrashReport {
    /// Identifier of the proxy run that produced this report.
    pub session_id: String,

    /// Value of the correlator's stream counter when the fault was observed.
    pub stream_count: u64,

    /// Process ID of the faulting process.
    pub pid: u64,

    /// Name of the fault signal (e.g., `SIGSEGV`).
    pub signal: String,

    /// Wall-clock time of the observation, in seconds since the Unix epoch.
    pub time: f64,

    /// Register snapshot, name to hex value.
    pub registers: IndexMap<String, String>,

    /// Backtrace, hex instruction pointer to frame, outermost call last.
    pub backtrace: IndexMap<String, BacktraceFrame>,

    /// Disassembly around the fault location, hex address to listing text.
    pub disassembly: IndexMap<String, String>,

    /// Memory map lines of the faulting process.
    pub maps: Vec<String>,

    /// Stack dump, hex address to hex value, lowest address first.
    pub stack: IndexMap<String, String>,

    /// Hex-encoded packets of the stream presumed to have caused the fault.
    pub stream: Vec<String>,

    /// Hex-encoded packets of every other retained stream, in recency order.
    pub history: Vec<Vec<String>>,
}

impl CrashReport {
    /// Creates an empty report for the given fault observation.
    pub fn new(session_id: impl Into<String>, pid: u64, signal: FaultSignal, stream_count: u64) -> Self {
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();

        Self {
            session_id: session_id.into(),
            stream_count,
            pid,
            signal: signal.name().to_owned(),
            time,
            registers: IndexMap::new(),
            backtrace: IndexMap::new(),
            disassembly: IndexMap::new(),
            maps: Vec::new(),
            stack: IndexMap::new(),
            stream: Vec::new(),
            history: Vec::new(),
        }
    }

    /// File name this report is persisted under, derived from the pid.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.pid)
    }

    /// Serializes the report as pretty-printed JSON.
    pub fn to_writer(&self, writer: impl std::io::Write) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(writer, self)
    }

    /// Parses a report back from JSON.
    pub fn from_reader(reader: impl std::io::Read) -> serde_json::Result<Self> {
        serde_json::from_reader(reader)
    }
}
