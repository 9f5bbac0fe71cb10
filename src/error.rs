use std::io;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Encode precondition violated (blank or multi-line base title).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A remote task-service call failed.
    #[error("{operation} failed: {message}")]
    RemoteUnavailable {
        operation: &'static str,
        message: String,
    },

    #[error("{0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// One logical list could not be scraped.
    #[error("scraping '{list}' failed: {message}")]
    Scrape { list: String, message: String },
}

impl SyncError {
    pub fn remote(operation: &'static str, message: impl Into<String>) -> Self {
        SyncError::RemoteUnavailable {
            operation,
            message: message.into(),
        }
    }
}
