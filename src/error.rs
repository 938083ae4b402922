use std::io;

use reqwest::StatusCode;
use thiserror::Error;

/// Failures while opening or draining a streaming completion.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error(
        "Connection refused by model API at '{url}'. \
         Ensure the service is reachable and MODEL_BASE_URL is correct."
    )]
    ConnectionRefused { url: String },

    #[error(
        "Failed to connect to model API at '{url}'. \
         Check MODEL_BASE_URL and network connectivity."
    )]
    Connect { url: String },

    #[error(
        "Model request timed out after {timeout_secs}s while calling '{url}'. \
         Increase MODEL_CONNECT_TIMEOUT_SECS or check network connectivity."
    )]
    Timeout { url: String, timeout_secs: u64 },

    #[error("Failed to call model API at '{url}': {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Model request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Model stream was interrupted: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Malformed stream chunk ({reason}): {payload}")]
    MalformedChunk { payload: String, reason: String },

    #[error("Model service reported an error: {message}")]
    Service { message: String },
}

impl StreamError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Status { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }
}

/// Failures of a single turn. Any of these leaves the just-submitted user
/// message at the tail of the transcript without an assistant reply.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("Transcript is inconsistent: {0}")]
    TranscriptInconsistency(String),

    #[error("Response cancelled")]
    Cancelled,

    #[error("Failed to write reply to the terminal")]
    Output(#[from] io::Error),
}
