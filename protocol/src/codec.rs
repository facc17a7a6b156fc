/*!
Wire encodings of [`SignalMessage`]. Text frames carry `JSON`,
binary frames carry `MessagePack` with named fields.
 */

use serde::{Deserialize, Serialize};

use crate::one_to_one::SignalMessage;

/// Encoding a peer asks the signaling server to use for outgoing messages.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum Encoding {
    /// `JSON` in text frames
    #[default]
    #[serde(rename = "json")]
    Json,
    /// `MessagePack` in binary frames
    #[serde(rename = "msgpack")]
    MessagePack,
}

/// Failure to turn a frame into a [`SignalMessage`] or back.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Text frame was not a valid message
    #[error("malformed json signal: {0}")]
    Json(#[from] serde_json::Error),
    /// Binary frame was not a valid message
    #[error("malformed msgpack signal: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    /// Message could not be written as `MessagePack`
    #[error("failed to encode msgpack signal: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

impl SignalMessage {
    /// Serialize into a `JSON` text frame
    ///
    /// # Errors
    /// Fails only if serialization of one of the fields fails.
    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a `JSON` text frame
    ///
    /// # Errors
    /// Fails when the text is not a well formed message.
    pub fn from_json(text: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize into a `MessagePack` binary frame
    ///
    /// # Errors
    /// Fails only if serialization of one of the fields fails.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, CodecError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Parse a `MessagePack` binary frame
    ///
    /// # Errors
    /// Fails when the bytes are not a well formed message.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
