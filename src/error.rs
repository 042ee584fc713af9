//! Error types for chat submission.

use thiserror::Error;

/// Errors raised while submitting a message or consuming its reply.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed (connect, send, or a body read mid-stream).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid endpoint URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The server answered with a non-success status.
    #[error("API error ({status})")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The server answered with success but no readable body.
    #[error("No stream found")]
    MissingStream,

    /// A stream produced by a non-HTTP transport failed.
    #[error("Stream error: {0}")]
    Stream(String),
}

/// Result type alias for chat operations.
pub type Result<T> = std::result::Result<T, Error>;
