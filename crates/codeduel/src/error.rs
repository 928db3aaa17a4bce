//! Unified error type for codeduel.

use codeduel_protocol::ProtocolError;
use codeduel_room::RoomError;
use codeduel_tasks::TaskError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum CodeduelError {
    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (not found, duplicate, already in a room).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A task catalog error (empty, malformed).
    #[error(transparent)]
    Task(#[from] TaskError),

    /// Reading input or writing output failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A setting is missing or unusable.
    #[error("configuration error: {0}")]
    Config(String),
}
