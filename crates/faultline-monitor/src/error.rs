/// Tracer error.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct TracerError<E>(pub E);

/// Event handler error.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct HandlerError<E>(pub E);

/// Error type returned by the debug session wait-loop.
#[derive(thiserror::Error, Debug)]
pub enum Error<E1, E2> {
    /// A tracer error occurred.
    #[error(transparent)]
    Tracer(#[from] TracerError<E1>),

    /// An event handler error occurred.
    #[error(transparent)]
    Handler(#[from] HandlerError<E2>),
}

/// Error type returned by debug session operations outside the wait-loop.
#[derive(thiserror::Error, Debug)]
pub enum SessionError<E> {
    /// The given process is not tracked by the session.
    #[error("process {0} is not being traced")]
    UntrackedProcess(u64),

    /// A tracer error occurred.
    #[error(transparent)]
    Tracer(E),
}

/// Result type of this crate.
pub type Result<T, E1, E2> = core::result::Result<T, Error<E1, E2>>;
