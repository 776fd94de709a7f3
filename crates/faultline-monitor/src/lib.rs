//! This crate provides the process-monitoring core of `faultline`.
//!
//! Three main components are provided:
//! - A data model for crash reports ([CrashReport]), serialized as one JSON
//!   document per crash.
//! - A set of traits ([Tracer](self::tracer::Tracer),
//!   [TracedProcess](self::tracer::TracedProcess)) describing the
//!   process-tracing collaborator: spawning or attaching to a target,
//!   waiting for kernel-delivered process events, and gathering best-effort
//!   forensics (registers, stack, backtrace, disassembly, memory maps).
//! - A [DebugSession](self::session::DebugSession) running a blocking
//!   wait-loop over the tracer, classifying each event and dispatching it to
//!   an [EventHandler](self::handler::EventHandler).
//!
//! The default tracer implementation (Linux `ptrace`) lives in
//! `faultline-debugger`.

mod error;
mod report;

/// Module containing the trace event handler trait.
pub mod handler;

/// Module implementing the debug session wait-loop.
pub mod session;

/// Module containing traits for implementing a process tracer.
pub mod tracer;

pub use self::error::{Error, HandlerError, Result, SessionError, TracerError};
pub use self::report::{BacktraceFrame, CrashReport, FaultSignal};
pub use self::session::DebugSession;
