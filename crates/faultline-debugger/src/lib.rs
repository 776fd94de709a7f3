//! This crate provides the default implementation of the `faultline`
//! process-tracing interface (the traits of `faultline-monitor`), backed by
//! Linux `ptrace`.
//!
//! The tracer is able to spawn a target process (on the **same host
//! machine**) as a traced child, or to attach to already-running processes
//! by ID. Forensic accessors (registers, stack, backtrace, disassembly,
//! memory maps) operate on a stopped process and are individually
//! best-effort.

mod command;
mod error;
mod sys;

pub use self::command::Command;
pub use self::error::{Error, Result};
#[cfg(target_os = "linux")]
pub use self::sys::{PtraceProcess, PtraceTracer};
