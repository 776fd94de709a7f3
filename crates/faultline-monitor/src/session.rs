use indexmap::IndexMap;

use crate::error::{HandlerError, SessionError, TracerError};
use crate::handler::EventHandler;
use crate::tracer::{TraceEvent, TracedProcess, Tracer};

/// A debug session over one or more traced target processes.
///
/// The session owns the set of currently-traced processes and a running
/// flag. It is long-lived state: constructed once per proxy run and torn
/// down on [stop](Self::stop) or when no processes remain.
pub struct DebugSession<T: Tracer> {
    tracer: T,

    /// Tracked processes, keyed by process ID.
    processes: IndexMap<u64, T::Process>,

    running: bool,
}

impl<T: Tracer> DebugSession<T> {
    /// Creates a session with no traced process yet.
    pub fn new(tracer: T) -> Self {
        Self {
            tracer,
            processes: IndexMap::new(),
            running: false,
        }
    }

    /// Puts the tracer's next target under trace and resumes it.
    ///
    /// A failure here is fatal to the caller: a session without its target
    /// must not start serving.
    pub fn spawn_traced_process(&mut self) -> Result<u64, SessionError<T::Error>> {
        let mut process = self.tracer.spawn().map_err(SessionError::Tracer)?;
        process.resume(None).map_err(SessionError::Tracer)?;

        let process_id = process.id();
        tracing::info!(process_id, "traced process running");

        self.processes.insert(process_id, process);

        Ok(process_id)
    }

    /// Runs the blocking wait-loop until the session is stopped or no traced
    /// process remains.
    ///
    /// Each kernel-delivered event is classified and dispatched to the
    /// matching handler callback; a process that is no longer attached after
    /// a dispatch is removed from the tracked set.
    pub fn watch<H: EventHandler<T>>(
        &mut self,
        handler: &mut H,
    ) -> crate::Result<(), T::Error, H::Error> {
        self.running = true;
        tracing::info!(processes = self.processes.len(), "watching traced processes");

        while self.running && !self.processes.is_empty() {
            let event = self.tracer.wait_event().map_err(TracerError)?;
            tracing::debug!(?event, "process event");

            match event {
                TraceEvent::Signal { process_id, signal } => {
                    handler.signal(self, process_id, signal).map_err(HandlerError)?;
                }
                TraceEvent::Lifecycle { process_id, event } => {
                    handler
                        .lifecycle(self, process_id, event)
                        .map_err(HandlerError)?;
                }
                TraceEvent::Exit { process_id, status } => {
                    handler
                        .exited(self, process_id, status)
                        .map_err(HandlerError)?;
                    self.processes.shift_remove(&process_id);
                }
            }

            self.processes.retain(|_, process| process.is_attached());
        }

        self.running = false;

        Ok(())
    }

    /// Resumes a stopped process, optionally delivering a signal.
    pub fn resume(
        &mut self,
        process_id: u64,
        signal: Option<i32>,
    ) -> Result<(), SessionError<T::Error>> {
        let process = self
            .processes
            .get_mut(&process_id)
            .ok_or(SessionError::UntrackedProcess(process_id))?;

        process.resume(signal).map_err(SessionError::Tracer)
    }

    /// Returns a tracked process by ID.
    pub fn process_mut(&mut self, process_id: u64) -> Option<&mut T::Process> {
        self.processes.get_mut(&process_id)
    }

    /// Detaches from every tracked process and clears the running flag.
    ///
    /// Idempotent: stopping an already-stopped session is a no-op.
    pub fn stop(&mut self) {
        for (process_id, process) in self.processes.iter_mut() {
            if let Err(e) = process.detach() {
                tracing::warn!(process_id, error = %e, "detach failed");
            }
        }

        self.processes.clear();
        self.running = false;
    }

    /// Whether the wait-loop is currently running.
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Number of processes currently tracked.
    pub fn tracked_processes(&self) -> usize {
        self.processes.len()
    }
}
