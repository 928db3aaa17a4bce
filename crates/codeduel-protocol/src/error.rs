//! Error types for the protocol layer.
//!
//! Each crate in codeduel defines its own error enum. When you see a
//! `ProtocolError`, the problem is in serialization or message shape,
//! not in room state or code execution.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, an unknown action `type`,
    /// missing required fields.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded fine but breaks a protocol rule, e.g. an
    /// empty user name or room id.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
