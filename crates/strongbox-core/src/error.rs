use thiserror::Error;

use crate::provider::Status;

/// Failures surfaced by the gateway and the store facades.
///
/// "Not found" is never one of them: missing items come back as `None` and
/// deleting a missing item succeeds.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Provider reported a status other than success or item-not-found.
    #[error("secure store returned status {status}")]
    Status { status: Status },
    /// Value could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    InvalidKey(#[from] InvalidKeyError),
    /// Provider answered with a result shape the query did not ask for.
    #[error("unexpected result from secure store: expected {expected}")]
    UnexpectedResult { expected: &'static str },
    /// The store worker could not run the operation.
    #[error("store worker unavailable: {reason}")]
    WorkerUnavailable { reason: String },
}

impl StoreError {
    /// Provider status carried by this error, if any.
    pub fn status(&self) -> Option<Status> {
        match self {
            StoreError::Status { status } => Some(*status),
            _ => None,
        }
    }
}

impl From<Status> for StoreError {
    fn from(status: Status) -> Self {
        StoreError::Status { status }
    }
}

/// Encoding and decoding failures for stored payloads.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode failed: {reason}")]
    Encode { reason: String },
    #[error("decode failed: {reason}")]
    Decode { reason: String },
    #[error("stored value is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Rejected key identities.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidKeyError {
    #[error("key must not be empty")]
    Empty,
}
