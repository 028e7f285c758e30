use std::fmt;

use serde::{Deserialize, Serialize};

/// Device identifier -> device data, exactly as it arrived on the stream.
pub type ScanResult = serde_json::Map<String, serde_json::Value>;

/// Server-assigned label of a stream event. Display only; never used for ordering.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SequenceId(pub String);

impl SequenceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Label shown in the history list, e.g. `#5`.
    pub fn label(&self) -> String {
        format!("#{}", self.0)
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SequenceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One rendered stream message. Created once, never updated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub sequence_id: SequenceId,
    pub device_count: usize,
    pub serialized_result: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Connecting,
    Ok,
    Error,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ok => "ok",
            ConnectionState::Error => "error",
        }
    }
}

/// What the connectivity sink shows: state, message and whether the
/// "stream active" bar is lit.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StatusView {
    pub state: ConnectionState,
    pub message: String,
    pub stream_active: bool,
}

impl Default for StatusView {
    fn default() -> Self {
        Self {
            state: ConnectionState::Connecting,
            message: crate::indicator::CONNECTING_MESSAGE.to_string(),
            stream_active: false,
        }
    }
}
