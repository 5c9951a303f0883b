//! JSON codec and canonical hashing
//!
//! Platform bodies are plain JSON, size-capped before they leave the process.
//! Hashes are computed over RFC 8785 canonical JSON so that object key order
//! never changes a digest:
//! ```text
//! command_hash = hex(sha256(jcs({ deviceId, commandName, params })))
//! ```

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::model::CommandParams;

/// Maximum body size (10 MB) to prevent memory exhaustion
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Message too large: {0} bytes (max: {MAX_MESSAGE_SIZE})")]
    MessageTooLarge(usize),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a value into a JSON body
pub fn encode_json<T: Serialize>(value: &T) -> Result<Bytes, CodecError> {
    let body = serde_json::to_vec(value)?;

    if body.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(body.len()));
    }

    Ok(Bytes::from(body))
}

/// Decode a JSON body
pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, CodecError> {
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(body.len()));
    }

    Ok(serde_json::from_slice(body)?)
}

/// Serialize a value as canonical JSON
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    Ok(serde_jcs::to_vec(value)?)
}

/// Lowercase hex SHA-256 of the canonical JSON of `value`
pub fn canonical_sha256<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Deterministic commitment over the parts of a command that must not change
pub fn command_hash(
    device_id: &str,
    command_name: &str,
    params: &CommandParams,
) -> Result<String, CodecError> {
    canonical_sha256(&json!({
        "deviceId": device_id,
        "commandName": command_name,
        "params": params,
    }))
}

/// Digest over an ordered batch of records
pub fn batch_hash<T: Serialize>(records: &[T]) -> Result<String, CodecError> {
    canonical_sha256(records)
}
