//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The protocol layer doesn't care HOW messages are serialized. It just
//! needs something that implements the [`Codec`] trait. Adapters pick
//! the implementation; the room engine never sees bytes.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// ## Trait bounds
///
/// - `Send + Sync`: adapters share one codec between the task reading
///   input and the task writing output, and Tokio may run either on any
///   worker thread.
/// - `'static`: the codec owns everything it needs, so it can be moved
///   into a spawned task (the console's writer holds it in an `Arc`).
///
/// ## Generic methods
///
/// `encode` and `decode` are generic over the message type, so one codec
/// handles [`Inbound`](crate::Inbound), [`Delivery`](crate::Delivery) and
/// anything else with serde impls. `decode` asks for `DeserializeOwned`
/// rather than `Deserialize<'de>`: the decoded value must not borrow from
/// the input line, which is dropped right after decoding.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// JSON keeps every action and notification readable in logs and
/// browser dev tools. This is behind the `json` feature flag (enabled
/// by default).
///
/// ## Example
///
/// ```rust
/// use codeduel_protocol::{Codec, ConnectionId, Delivery, JsonCodec, Notification};
///
/// let codec = JsonCodec;
///
/// let delivery = Delivery {
///     connection: ConnectionId(7),
///     notification: Notification::TimerUpdate(42),
/// };
///
/// let bytes = codec.encode(&delivery).unwrap();
/// let decoded: Delivery = codec.decode(&bytes).unwrap();
/// assert_eq!(delivery, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
