use std::time::Duration;
use thiserror::Error;

/// Error type covering every failure the client surfaces to callers.
///
/// All failures are values carried on the relevant `Result`; nothing in this
/// crate aborts the process. Gateway-reported errors (`janus: "error"`
/// replies) arrive as [`JanusError::Gateway`] on the pending call they
/// correlate to, never as a global condition.
#[derive(Error, Debug)]
pub enum JanusError {
    #[error("Transport is not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Transport closed while request was outstanding")]
    TransportClosed,

    #[error("Gateway returned an error: {reason}")]
    Gateway { reason: String },

    #[error("Transaction '{transaction}' timed out after {elapsed:?}")]
    Timeout {
        transaction: String,
        elapsed: Duration,
    },

    #[error("Missing or mistyped field '{field}' in event payload")]
    Decode { field: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Too many pending transactions: maximum {max} allowed")]
    PendingLimit { max: usize },

    #[error("Transaction '{0}' is already registered")]
    DuplicateTransaction(String),

    #[error("Session or client has been shut down")]
    SessionClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl JanusError {
    /// Shorthand used by the event decoders when a matched shape is missing
    /// an expected field.
    pub fn decode(field: &str) -> Self {
        JanusError::Decode {
            field: field.to_string(),
        }
    }
}

impl From<serde_json::Error> for JanusError {
    fn from(error: serde_json::Error) -> Self {
        JanusError::Serialization(error.to_string())
    }
}
