//! Routes client actions to the round engine.
//!
//! Adapters decode an action, then call [`Dispatcher::dispatch`] with the
//! connection's outbound channel. Failures are reported back to that
//! connection as an `error` notification; they never end the connection.

use codeduel_protocol::{ClientAction, ConnectionId, Notification};
use codeduel_room::{PlayerSender, RoundEngine};
use codeduel_tasks::Executor;
use tracing::{debug, info};

use crate::CodeduelError;

/// Turns client actions into engine calls.
pub struct Dispatcher<E: Executor> {
    engine: RoundEngine<E>,
}

impl<E: Executor> Clone for Dispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<E: Executor> Dispatcher<E> {
    pub fn new(engine: RoundEngine<E>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &RoundEngine<E> {
        &self.engine
    }

    /// Handles one action from `connection`.
    ///
    /// Errors go to `sender` as [`Notification::Error`] and are also
    /// returned, so callers can log or count them.
    pub async fn dispatch(
        &self,
        connection: ConnectionId,
        action: ClientAction,
        sender: &PlayerSender,
    ) -> Result<(), CodeduelError> {
        let result = self.handle(connection, action, sender).await;
        if let Err(e) = &result {
            debug!(%connection, error = %e, "action failed");
            send_error(sender, e);
        }
        result
    }

    async fn handle(
        &self,
        connection: ConnectionId,
        action: ClientAction,
        sender: &PlayerSender,
    ) -> Result<(), CodeduelError> {
        action.validate()?;

        match action {
            ClientAction::CreateRoom { room_id, user_name } => {
                let room_id = self
                    .engine
                    .create_room(room_id, user_name, connection, sender.clone())
                    .await?;
                info!(%connection, %room_id, "created room");
            }
            ClientAction::JoinRoom { room_id, user_name } => {
                self.engine
                    .join(&room_id, user_name, connection, sender.clone())
                    .await?;
            }
            ClientAction::SubmitCode { room_id, code } => {
                self.engine.submit(&room_id, connection, code).await?;
            }
            ClientAction::Disconnect => {
                if let Some(room_id) = self.engine.disconnect(connection).await {
                    info!(%connection, %room_id, "left room");
                }
            }
        }
        Ok(())
    }
}

/// Sends an `error` notification to one connection.
fn send_error(sender: &PlayerSender, error: &CodeduelError) {
    let _ = sender.send(Notification::Error(error.to_string()));
}
