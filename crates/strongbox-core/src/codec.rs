use serde::{de::DeserializeOwned, Serialize};

use crate::error::CodecError;

/// Turns structured values into stored bytes and back.
pub trait ValueCodec: Send + Sync + 'static {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// Default codec storing values as JSON documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode {
            reason: e.to_string(),
        })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode {
            reason: e.to_string(),
        })
    }
}

/// Strict UTF-8 decoding for string payloads.
pub fn decode_utf8(bytes: Vec<u8>) -> Result<String, CodecError> {
    Ok(String::from_utf8(bytes)?)
}
