//! The round engine: the public entry point for game operations.

use std::sync::Arc;

use codeduel_protocol::{ConnectionId, RoomId};
use codeduel_tasks::{Catalog, Executor};
use tracing::debug;

use crate::actor::{RoomContext, RoomInbox, room_channel, spawn_room};
use crate::{
    Player, PlayerSender, Room, RoomConfig, RoomError, RoomHandle, RoomInfo, RoomRegistry,
};

/// Attempts at picking an unused generated room id.
const GENERATE_ATTEMPTS: usize = 5;

/// Runs games: creates rooms, admits players, routes submissions and
/// handles departures.
///
/// Every room runs as its own actor; the engine only finds the right one
/// through the [`RoomRegistry`] and forwards the request. Cloning is
/// cheap and all clones share the same rooms.
pub struct RoundEngine<E: Executor> {
    executor: Arc<E>,
    catalog: Arc<Catalog>,
    config: RoomConfig,
    registry: RoomRegistry,
}

impl<E: Executor> Clone for RoundEngine<E> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            catalog: Arc::clone(&self.catalog),
            config: self.config.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<E: Executor> RoundEngine<E> {
    /// Creates an engine with its own empty registry.
    pub fn new(executor: E, catalog: Catalog, config: RoomConfig) -> Self {
        Self::with_registry(executor, catalog, config, RoomRegistry::new())
    }

    /// Creates an engine over an existing registry.
    pub fn with_registry(
        executor: E,
        catalog: Catalog,
        config: RoomConfig,
        registry: RoomRegistry,
    ) -> Self {
        Self {
            executor: Arc::new(executor),
            catalog: Arc::new(catalog),
            config: config.validated(),
            registry,
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Creates a room with `connection` as its first player.
    ///
    /// With no `room_id` a random one is generated. The room announces
    /// itself with `roomCreated` and `currentPlayers`.
    ///
    /// # Errors
    /// [`RoomError::DuplicateRoom`] if the id is taken (the existing room
    /// is untouched), or [`RoomError::AlreadyInRoom`].
    pub async fn create_room(
        &self,
        room_id: Option<RoomId>,
        name: String,
        connection: ConnectionId,
        sender: PlayerSender,
    ) -> Result<RoomId, RoomError> {
        let (handle, receiver) = match room_id {
            Some(room_id) => {
                let (handle, receiver) = room_channel(room_id, self.config.channel_size);
                self.registry.create(handle.clone(), connection).await?;
                (handle, receiver)
            }
            None => self.create_generated(connection).await?,
        };

        let room_id = handle.room_id().clone();
        let room = Room::new(room_id.clone(), Player::new(connection, name));
        spawn_room(room, sender, self.context(), &handle, receiver);
        Ok(room_id)
    }

    async fn create_generated(
        &self,
        connection: ConnectionId,
    ) -> Result<(RoomHandle, RoomInbox), RoomError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let (handle, receiver) = room_channel(RoomId::generate(), self.config.channel_size);
            match self.registry.create(handle.clone(), connection).await {
                Ok(()) => return Ok((handle, receiver)),
                Err(RoomError::DuplicateRoom(id)) if attempt < GENERATE_ATTEMPTS => {
                    debug!(room_id = %id, "generated room id taken, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Adds a player to an existing room.
    ///
    /// Starts the game once the room reaches `min_players`.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] or [`RoomError::AlreadyInRoom`].
    pub async fn join(
        &self,
        room_id: &RoomId,
        name: String,
        connection: ConnectionId,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let handle = self.registry.bind(connection, room_id).await?;
        if let Err(e) = handle.join(connection, name, sender).await {
            self.registry.unbind(connection).await;
            return Err(e);
        }
        Ok(())
    }

    /// Submits code for the room's open round.
    ///
    /// Evaluation happens in the background; the outcome arrives as
    /// notifications. Submissions with no open round, or from a
    /// connection that isn't in the room, are dropped without a reply.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] if the room doesn't exist.
    pub async fn submit(
        &self,
        room_id: &RoomId,
        connection: ConnectionId,
        code: String,
    ) -> Result<(), RoomError> {
        self.registry.get(room_id).await?.submit(connection, code).await
    }

    /// Removes `connection` from whatever room it is in.
    ///
    /// Returns the room it left, if any. A room left empty is deleted.
    pub async fn disconnect(&self, connection: ConnectionId) -> Option<RoomId> {
        let room_id = self.registry.unbind(connection).await?;
        // The room may have ended between the unbind and here.
        if let Ok(handle) = self.registry.get(&room_id).await {
            if let Err(e) = handle.leave(connection).await {
                debug!(%room_id, %connection, error = %e, "leave after room closed");
            }
        }
        Some(room_id)
    }

    /// Returns a snapshot of a room.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] if the room doesn't exist.
    pub async fn room_info(&self, room_id: &RoomId) -> Result<RoomInfo, RoomError> {
        self.registry.get(room_id).await?.info().await
    }

    fn context(&self) -> RoomContext<E> {
        RoomContext {
            executor: Arc::clone(&self.executor),
            catalog: Arc::clone(&self.catalog),
            config: self.config.clone(),
            registry: self.registry.clone(),
        }
    }
}
