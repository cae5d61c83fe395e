//! Error types for the completion transport

use thiserror::Error;

/// Failure talking to the completion endpoint
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid completion response: {0}")]
    Decode(String),

    #[error("Completion endpoint unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for CompletionError {
    fn from(e: serde_json::Error) -> Self {
        CompletionError::Decode(e.to_string())
    }
}
