//! Room registry: which rooms exist, and which room each connection is in.

use std::collections::HashMap;
use std::sync::Arc;

use codeduel_protocol::{ConnectionId, RoomId};
use tokio::sync::RwLock;
use tracing::info;

use crate::{RoomError, RoomHandle};

#[derive(Default)]
struct Inner {
    /// Live rooms, keyed by id.
    rooms: HashMap<RoomId, RoomHandle>,

    /// Maps each connection to the room it's currently in.
    /// A connection is in at most ONE room at a time.
    connections: HashMap<ConnectionId, RoomId>,
}

/// Tracks live rooms and routes connections to them.
///
/// Holds no game rules. Cloning is cheap and every clone sees the same
/// rooms; the engine and each room actor share one registry. The lock is
/// only held for map updates, never across a call into a room.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl RoomRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new room and binds its creator to it.
    ///
    /// # Errors
    /// [`RoomError::DuplicateRoom`] if the id is taken, or
    /// [`RoomError::AlreadyInRoom`] if the creator is in another room.
    /// Nothing is changed on error.
    pub async fn create(
        &self,
        handle: RoomHandle,
        creator: ConnectionId,
    ) -> Result<(), RoomError> {
        let room_id = handle.room_id().clone();
        let mut inner = self.inner.write().await;

        if inner.rooms.contains_key(&room_id) {
            return Err(RoomError::DuplicateRoom(room_id));
        }
        if let Some(current) = inner.connections.get(&creator) {
            return Err(RoomError::AlreadyInRoom(creator, current.clone()));
        }

        inner.rooms.insert(room_id.clone(), handle);
        inner.connections.insert(creator, room_id.clone());
        info!(%room_id, %creator, "room created");
        Ok(())
    }

    /// Returns a handle to a live room.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] if no such room is registered.
    pub async fn get(&self, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
        self.inner
            .read()
            .await
            .rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))
    }

    /// Removes a room and unbinds every connection in it.
    ///
    /// Idempotent. Returns `true` if the room was registered.
    pub async fn delete(&self, room_id: &RoomId) -> bool {
        let mut inner = self.inner.write().await;
        let removed = inner.rooms.remove(room_id).is_some();
        inner.connections.retain(|_, rid| rid != room_id);
        if removed {
            info!(%room_id, "room deleted");
        }
        removed
    }

    /// Binds `connection` to a live room and returns the room's handle.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] if the room isn't registered, or
    /// [`RoomError::AlreadyInRoom`] if the connection is bound elsewhere.
    pub async fn bind(
        &self,
        connection: ConnectionId,
        room_id: &RoomId,
    ) -> Result<RoomHandle, RoomError> {
        let mut inner = self.inner.write().await;
        let handle = inner
            .rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        if let Some(current) = inner.connections.get(&connection) {
            return Err(RoomError::AlreadyInRoom(connection, current.clone()));
        }
        inner.connections.insert(connection, room_id.clone());
        Ok(handle)
    }

    /// Forgets which room `connection` is in, returning it.
    pub async fn unbind(&self, connection: ConnectionId) -> Option<RoomId> {
        self.inner.write().await.connections.remove(&connection)
    }

    /// The room `connection` is currently in, if any.
    pub async fn room_of(&self, connection: ConnectionId) -> Option<RoomId> {
        self.inner.read().await.connections.get(&connection).cloned()
    }

    pub async fn contains(&self, room_id: &RoomId) -> bool {
        self.inner.read().await.rooms.contains_key(room_id)
    }

    /// Returns the number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    /// Lists all live room ids.
    pub async fn room_ids(&self) -> Vec<RoomId> {
        self.inner.read().await.rooms.keys().cloned().collect()
    }
}
