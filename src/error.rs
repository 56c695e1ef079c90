use thiserror::Error;

/// Result type for receiver operations
pub type Result<T> = std::result::Result<T, DenonError>;

/// Errors that can occur when talking to a Denon receiver
#[derive(Error, Debug)]
pub enum DenonError {
    /// Underlying TCP connection error (refused, reset, broken pipe, ...)
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// Operation attempted without an open connection
    #[error("not connected")]
    NotConnected,

    /// Session exceeded its time bound
    #[error("session timeout")]
    Timeout,
}
