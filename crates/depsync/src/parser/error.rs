use thiserror::Error;

use crate::http::HttpError;

/// Errors from the parse-service client.
///
/// All variants are non-fatal to the repository's row: the caller leaves
/// persisted state unchanged and the repository becomes eligible for selection
/// again on a later tick.
#[derive(Debug, Error)]
pub enum ParserError {
    /// Transport-level failure (connection, timeout).
    #[error("Parse service unreachable: {0}")]
    Http(#[from] HttpError),

    /// The service answered with a non-success status code.
    #[error("Parse service returned HTTP {status}")]
    Status { status: u16 },

    /// The response body could not be interpreted. Non-terminal: the stored
    /// job handle is preserved for another poll attempt.
    #[error("Malformed parse service payload: {0}")]
    MalformedPayload(String),
}

/// Result type alias for parse-service operations.
pub type Result<T> = std::result::Result<T, ParserError>;
