use crate::session::DebugSession;
use crate::tracer::{ExitStatus, Tracer};

/// Trait for implementing a process event handler.
///
/// Handler methods run on the debug thread, invoked by
/// [DebugSession::watch](crate::session::DebugSession::watch). A handler
/// receives the session itself so it can resume the stopped process, respawn
/// a fresh target, or stop the session altogether.
pub trait EventHandler<T: Tracer> {
    /// Error returned by this event handler.
    type Error: std::error::Error;

    /// Function called when a signal was delivered to a traced process.
    ///
    /// The process is stopped; the handler is responsible for resuming it
    /// (normally with the original signal, so the default disposition
    /// proceeds).
    fn signal(
        &mut self,
        session: &mut DebugSession<T>,
        process_id: u64,
        signal: i32,
    ) -> Result<(), Self::Error>;

    /// Function called on a generic lifecycle stop.
    ///
    /// The default implementation does nothing; implementations that enable
    /// extra tracing options should resume the stopped process here.
    fn lifecycle(
        &mut self,
        _session: &mut DebugSession<T>,
        _process_id: u64,
        _event: i32,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Function called when a traced process exited.
    ///
    /// The session removes the process from its tracked set after this
    /// returns.
    fn exited(
        &mut self,
        session: &mut DebugSession<T>,
        process_id: u64,
        status: ExitStatus,
    ) -> Result<(), Self::Error>;
}
