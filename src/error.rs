/* src/error.rs */

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Result type alias for operations that may fail with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Failures talking to an outbound lookup service.
#[derive(Error, Debug)]
pub enum LookupError {
    /// The request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON.
    #[error("failed to parse JSON: {0}")]
    Decode(#[from] serde_json::Error),

    /// The service answered but reported that the lookup failed.
    #[error("lookup rejected: {0}")]
    Rejected(String),
}

/// Errors surfaced by the service.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
