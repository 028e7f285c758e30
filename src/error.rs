//! Error kinds of the display pipeline. None of them is fatal to a running
//! session: decode failures drop the event, store failures are logged and
//! forgotten, transport failures flip the indicator and wait for a reconnect.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("event payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event payload is not a JSON object (got {0})")]
    NotAnObject(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stored history is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("stored history has unsupported version {0}")]
    UnsupportedVersion(u32),

    #[error("invalid store key: {0:?}")]
    InvalidKey(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),

    #[error("server asked the client to stop reconnecting (204 No Content)")]
    NoContent,

    #[error("unexpected content type {0:?}, expected text/event-stream")]
    ContentType(String),

    #[error("stream ended")]
    Eof,
}

impl TransportError {
    /// Whether the transport should try again after this failure.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::NoContent)
    }
}
