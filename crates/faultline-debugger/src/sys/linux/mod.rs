mod mem;
mod process;
mod thread;

use std::collections::VecDeque;

use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;

use faultline_monitor::tracer::{ExitStatus, TraceEvent, Tracer};

pub use self::process::PtraceProcess;
use crate::Command;

/// Process tracer backed by Linux `ptrace`.
///
/// Targets are either attached to by process ID or spawned from a command
/// line. Pending attach targets are consumed first; the command (when
/// configured) serves every later spawn, including respawns after a target
/// crash.
pub struct PtraceTracer {
    /// Process IDs not yet put under trace.
    pending_attach: VecDeque<Pid>,

    /// Command line for spawning fresh targets.
    command: Option<Command>,
}

impl PtraceTracer {
    /// Creates a tracer that spawns the given command under trace.
    pub fn spawn_command(command: Command) -> Self {
        Self {
            pending_attach: VecDeque::new(),
            command: Some(command),
        }
    }

    /// Creates a tracer that attaches to the given process IDs.
    pub fn attach_pids(pids: impl IntoIterator<Item = i32>) -> Self {
        Self {
            pending_attach: pids.into_iter().map(Pid::from_raw).collect(),
            command: None,
        }
    }

    /// Number of attach targets not yet put under trace.
    pub fn pending_targets(&self) -> usize {
        self.pending_attach.len()
    }
}

impl Tracer for PtraceTracer {
    type Process = PtraceProcess;
    type Error = crate::Error;

    fn spawn(&mut self) -> crate::Result<PtraceProcess> {
        if let Some(pid) = self.pending_attach.pop_front() {
            PtraceProcess::attach(pid)
        } else if let Some(command) = self.command.as_ref() {
            PtraceProcess::spawn(command)
        } else {
            Err(crate::Error::NoTarget)
        }
    }

    fn wait_event(&mut self) -> crate::Result<TraceEvent> {
        let status = waitpid(None, None)?;

        let event = match status {
            WaitStatus::Stopped(pid, signal) => TraceEvent::Signal {
                process_id: pid.as_raw() as u64,
                signal: signal as i32,
            },
            WaitStatus::PtraceEvent(pid, _, event) => TraceEvent::Lifecycle {
                process_id: pid.as_raw() as u64,
                event,
            },
            WaitStatus::Exited(pid, exit_code) => TraceEvent::Exit {
                process_id: pid.as_raw() as u64,
                status: ExitStatus::Code(exit_code),
            },
            WaitStatus::Signaled(pid, signal, _) => TraceEvent::Exit {
                process_id: pid.as_raw() as u64,
                status: ExitStatus::Signal(signal as i32),
            },
            status => return Err(crate::Error::BadChildWait(status)),
        };

        Ok(event)
    }
}
