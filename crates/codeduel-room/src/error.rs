//! Error types for the room layer.

use codeduel_protocol::{ConnectionId, RoomId};

/// Errors that can occur during room operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist, or has already been deleted.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// A room with this id already exists.
    #[error("room {0} already exists")]
    DuplicateRoom(RoomId),

    /// The connection already belongs to a room.
    #[error("{0} is already in room {1}")]
    AlreadyInRoom(ConnectionId, RoomId),

    /// The connection is not a member of this room.
    #[error("{0} is not in room {1}")]
    NotInRoom(ConnectionId, RoomId),
}
