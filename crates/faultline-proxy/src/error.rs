use faultline_monitor::SessionError;

/// Error type of the crash-report persistence step.
#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    /// The report file could not be created or written.
    #[error("{0}: {1}")]
    File(std::path::PathBuf, std::io::Error),

    /// The report could not be serialized.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Error type of the debug-thread half of the crash correlator.
#[derive(thiserror::Error, Debug)]
pub enum MonitorError<E> {
    /// A debug session operation failed.
    #[error(transparent)]
    Session(#[from] SessionError<E>),

    /// The crash queue consumer is gone.
    #[error("crash queue disconnected")]
    QueueClosed,
}
