use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("input stream error: {0}")]
    Input(#[from] std::io::Error),
    #[error("malformed landmark record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },
    #[error("report error: {0}")]
    Report(#[from] crate::report::ReportError),
    #[error("command channel closed")]
    CommandChannelClosed,
    #[error("state lock poisoned")]
    StateLock,
}
