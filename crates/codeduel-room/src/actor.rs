//! Room actor: an isolated Tokio task that owns one room's game.
//!
//! ## Why an actor per room?
//!
//! A room's state changes from three directions at once: players send
//! commands, the round clock ticks, and the post-solve pause runs out.
//! Instead of guarding a shared `Room` with a mutex, each room gets its
//! own Tokio task (the "actor") that owns:
//!
//! - the [`Room`] (players, scores, phase, current task),
//! - its [`RoundClock`] and its advance [`Deadline`],
//! - every player's outbound [`PlayerSender`].
//!
//! The actor runs a `tokio::select!` loop over its command inbox, the
//! clock and the deadline, and handles exactly one event per iteration.
//! Nothing else touches a room's state, so no locks are needed and a
//! round can never be ended twice by racing timers.
//!
//! ```text
//! RoundEngine ──RoomHandle (mpsc)──► RoomActor ──PlayerSender──► clients
//!                                     │    ▲
//!                        spawn eval   │    │ Verdict (loopback)
//!                                     ▼    │
//!                                  evaluation task
//! ```
//!
//! ## Evaluations run off the loop
//!
//! Running a submission can take as long as the sandbox's time limit, so
//! the actor never awaits it. `Submit` spawns an evaluation task and the
//! outcome comes back later as a `Verdict` command through the actor's
//! own inbox. By then the round may have been solved, timed out or
//! advanced; the verdict is checked against the room's state at that
//! moment, not at submission time.
//!
//! Each connection has at most one evaluation in flight. Further
//! submissions from it are dropped until its verdict is handled, so one
//! player can't fan out sandbox processes by spamming submissions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use codeduel_clock::{ClockTick, Deadline, RoundClock};
use codeduel_protocol::{
    ConnectionId, Notification, PlayerInfo, Recipient, RoomId, TaskPayload,
};
use codeduel_tasks::{Catalog, Executor, Verdict, evaluate};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::{Player, Room, RoomConfig, RoomError, RoomPhase, RoomRegistry};

/// Channel sender for delivering notifications to one player.
pub type PlayerSender = mpsc::UnboundedSender<Notification>;

/// Receiving end of a room's command channel.
pub(crate) type RoomInbox = mpsc::Receiver<RoomCommand>;

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    /// Add a player to the room.
    Join {
        connection: ConnectionId,
        name: String,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Remove a player from the room.
    Leave {
        connection: ConnectionId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// A candidate solution for the open round.
    Submit { connection: ConnectionId, code: String },

    /// Result of an evaluation spawned by `Submit`.
    Verdict {
        connection: ConnectionId,
        task_index: usize,
        code: String,
        verdict: Verdict,
    },

    /// Request a snapshot of the room.
    GetInfo { reply: oneshot::Sender<RoomInfo> },
}

/// A snapshot of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub phase: RoomPhase,
    /// Roster in join order, with scores.
    pub players: Vec<PlayerInfo>,
    /// 1-based round number (1 while still in the lobby).
    pub round: usize,
    pub total_rounds: usize,
    /// Ticks left in the current round.
    pub time_left: u64,
    /// Whether the round clock is armed.
    pub clock_running: bool,
}

/// Handle to a running room actor. Used to send commands to it.
///
/// Cheap to clone. Once the actor has stopped every call fails with
/// [`RoomError::NotFound`].
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl std::fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHandle")
            .field("room_id", &self.room_id)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl RoomHandle {
    pub(crate) fn new(room_id: RoomId, sender: mpsc::Sender<RoomCommand>) -> Self {
        Self { room_id, sender }
    }

    /// Returns the room's id.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Whether the actor behind this handle has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn gone(&self) -> RoomError {
        RoomError::NotFound(self.room_id.clone())
    }

    /// Sends a join request to the room.
    pub async fn join(
        &self,
        connection: ConnectionId,
        name: String,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                connection,
                name,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.gone())?;
        reply_rx.await.map_err(|_| self.gone())?
    }

    /// Sends a leave request to the room.
    pub async fn leave(&self, connection: ConnectionId) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Leave {
                connection,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.gone())?;
        reply_rx.await.map_err(|_| self.gone())?
    }

    /// Hands a submission to the room (fire-and-forget).
    pub async fn submit(
        &self,
        connection: ConnectionId,
        code: String,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Submit { connection, code })
            .await
            .map_err(|_| self.gone())
    }

    /// Requests a snapshot of the room.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| self.gone())?;
        reply_rx.await.map_err(|_| self.gone())
    }
}

/// Everything a room actor needs from its engine.
pub(crate) struct RoomContext<E: Executor> {
    pub executor: Arc<E>,
    pub catalog: Arc<Catalog>,
    pub config: RoomConfig,
    pub registry: RoomRegistry,
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<E: Executor> {
    room: Room,
    ctx: RoomContext<E>,
    /// Per-player outbound channels.
    senders: HashMap<ConnectionId, PlayerSender>,
    clock: RoundClock,
    advance: Deadline,
    receiver: RoomInbox,
    /// For evaluation tasks to report back.
    ///
    /// A channel stays open while any strong sender exists. If the actor
    /// held a strong sender to its own inbox, `recv()` could never return
    /// `None` and the actor would outlive every handle. The weak sender is
    /// upgraded only for the lifetime of one evaluation task.
    loopback: mpsc::WeakSender<RoomCommand>,
    /// Connections with an evaluation in flight.
    evaluating: HashSet<ConnectionId>,
    closed: bool,
}

impl<E: Executor> RoomActor<E> {
    /// Runs the actor loop until the game ends or the room empties.
    async fn run(mut self) {
        info!(room_id = %self.room.id(), "room actor started");

        self.broadcast(Notification::RoomCreated(self.room.id().clone()));
        self.broadcast(Notification::CurrentPlayers(self.room.roster()));
        if self.room.ready_to_start(self.ctx.config.min_players) {
            self.start_game();
        }

        while !self.closed {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                tick = self.clock.wait_for_tick() => self.on_tick(tick).await,
                () = self.advance.wait() => self.on_advance().await,
            }
        }

        info!(room_id = %self.room.id(), "room actor stopped");
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                connection,
                name,
                sender,
                reply,
            } => {
                let result = self.handle_join(connection, name, sender);
                let _ = reply.send(result);
            }
            RoomCommand::Leave { connection, reply } => {
                let result = self.handle_leave(connection).await;
                let _ = reply.send(result);
            }
            RoomCommand::Submit { connection, code } => {
                self.handle_submit(connection, code);
            }
            RoomCommand::Verdict {
                connection,
                task_index,
                code,
                verdict,
            } => {
                self.handle_verdict(connection, task_index, code, verdict)
                    .await;
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    fn handle_join(
        &mut self,
        connection: ConnectionId,
        name: String,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        self.room.add_player(Player::new(connection, name.clone()))?;
        self.senders.insert(connection, sender);
        info!(
            room_id = %self.room.id(),
            %connection,
            players = self.room.len(),
            "player joined"
        );

        self.broadcast(Notification::PlayerJoined {
            id: connection,
            name,
        });
        self.broadcast(Notification::CurrentPlayers(self.room.roster()));

        if self.room.ready_to_start(self.ctx.config.min_players) {
            self.start_game();
        } else if self.room.game_active() {
            self.catch_up(connection);
        }
        Ok(())
    }

    /// Brings a player who joined mid-game up to date.
    ///
    /// During the pause after a solve only `gameStarted` is sent; the
    /// next `newRound` reaches them with everyone else.
    fn catch_up(&self, connection: ConnectionId) {
        self.send_to(
            connection,
            Notification::GameStarted {
                total_rounds: self.ctx.catalog.len(),
            },
        );
        if self.room.phase().accepts_submissions() {
            self.send_to(
                connection,
                Notification::NewRound {
                    round: self.room.round(),
                },
            );
            self.send_to(connection, Notification::Task(self.current_task()));
        }
    }

    async fn handle_leave(&mut self, connection: ConnectionId) -> Result<(), RoomError> {
        self.room.remove_player(connection)?;
        self.senders.remove(&connection);
        info!(
            room_id = %self.room.id(),
            %connection,
            players = self.room.len(),
            "player left"
        );

        self.broadcast(Notification::PlayerLeft(connection));
        self.broadcast(Notification::CurrentPlayers(self.room.roster()));

        if self.room.is_empty() {
            self.clock.cancel();
            self.advance.clear();
            self.close().await;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Submissions
    // -----------------------------------------------------------------------

    fn handle_submit(&mut self, connection: ConnectionId, code: String) {
        if !self.room.is_member(connection) {
            debug!(room_id = %self.room.id(), %connection, "submission from non-member, ignoring");
            return;
        }
        if !self.room.phase().accepts_submissions() {
            debug!(
                room_id = %self.room.id(),
                %connection,
                phase = %self.room.phase(),
                "submission while no round is open, ignoring"
            );
            return;
        }
        let Some(loopback) = self.loopback.upgrade() else {
            return;
        };
        if !self.evaluating.insert(connection) {
            debug!(
                room_id = %self.room.id(),
                %connection,
                "submission while another is being evaluated, ignoring"
            );
            return;
        }

        let task_index = self.room.current_task_index();
        let executor = Arc::clone(&self.ctx.executor);
        let catalog = Arc::clone(&self.ctx.catalog);
        debug!(room_id = %self.room.id(), %connection, task_index, "evaluating submission");

        tokio::spawn(async move {
            let task = &catalog[task_index];
            let verdict = evaluate(executor.as_ref(), task_index, task, &code).await;
            let _ = loopback
                .send(RoomCommand::Verdict {
                    connection,
                    task_index,
                    code,
                    verdict,
                })
                .await;
        });
    }

    async fn handle_verdict(
        &mut self,
        connection: ConnectionId,
        task_index: usize,
        code: String,
        verdict: Verdict,
    ) {
        self.evaluating.remove(&connection);

        if let Some(feedback) = verdict.feedback() {
            // Submitter only, even if the round closed meanwhile.
            self.dispatch(
                Recipient::Connection(connection),
                Notification::IncorrectSolution(feedback.into()),
            );
            return;
        }

        if task_index != self.room.current_task_index() {
            debug!(
                room_id = %self.room.id(),
                %connection,
                task_index,
                "verdict for an old task, ignoring"
            );
            return;
        }
        let Some(score) = self.room.record_solve(connection) else {
            debug!(
                room_id = %self.room.id(),
                %connection,
                "round already closed, ignoring verdict"
            );
            return;
        };

        self.clock.cancel();
        let solver = self
            .room
            .player(connection)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        info!(
            room_id = %self.room.id(),
            %connection,
            round = self.room.round(),
            score,
            "task solved"
        );

        self.broadcast(Notification::ScoreUpdate(self.room.scores()));
        self.broadcast(Notification::TaskSolved { solver, code });

        if score >= self.ctx.config.win_score {
            self.end_game().await;
        } else {
            self.advance.set(self.ctx.config.advance_delay);
        }
    }

    // -----------------------------------------------------------------------
    // Rounds
    // -----------------------------------------------------------------------

    fn start_game(&mut self) {
        let ticks = self.ctx.config.round_ticks();
        self.room.start_game(ticks);
        info!(
            room_id = %self.room.id(),
            players = self.room.len(),
            total_rounds = self.ctx.catalog.len(),
            "game started"
        );

        self.broadcast(Notification::GameStarted {
            total_rounds: self.ctx.catalog.len(),
        });
        self.open_round();
    }

    /// Announces the current task and starts its countdown.
    fn open_round(&mut self) {
        self.broadcast(Notification::NewRound {
            round: self.room.round(),
        });
        self.broadcast(Notification::Task(self.current_task()));
        self.clock.start(self.ctx.config.round_ticks());
    }

    async fn on_tick(&mut self, tick: ClockTick) {
        self.room.set_time_left(tick.remaining);
        self.broadcast(Notification::TimerUpdate(tick.remaining));
        if tick.expired {
            debug!(room_id = %self.room.id(), round = self.room.round(), "round timed out");
            self.end_round().await;
        }
    }

    async fn on_advance(&mut self) {
        if self.room.current_task_index() < self.ctx.catalog.last_index() {
            self.end_round().await;
        } else {
            self.end_game().await;
        }
    }

    async fn end_round(&mut self) {
        self.clock.cancel();
        info!(room_id = %self.room.id(), round = self.room.round(), "round ended");
        self.broadcast(Notification::RoundEnded {
            scores: self.room.scores(),
        });

        let ticks = self.ctx.config.round_ticks();
        if self.room.advance(self.ctx.catalog.last_index(), ticks) {
            self.open_round();
        } else {
            self.end_game().await;
        }
    }

    async fn end_game(&mut self) {
        self.clock.cancel();
        self.advance.clear();
        let winner = self.room.winner().map(|p| p.name.clone());
        self.room.finish();
        info!(room_id = %self.room.id(), winner = ?winner, "game ended");

        self.broadcast(Notification::GameEnded {
            winner,
            scores: self.room.scores(),
        });
        self.close().await;
    }

    /// Removes the room from the registry and stops the loop.
    async fn close(&mut self) {
        self.ctx.registry.delete(self.room.id()).await;
        self.receiver.close();
        self.closed = true;
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    fn current_task(&self) -> TaskPayload {
        let task = &self.ctx.catalog[self.room.current_task_index()];
        TaskPayload {
            prompt: task.prompt.clone(),
            entry_point: task.entry_point.clone(),
        }
    }

    fn broadcast(&self, notification: Notification) {
        self.dispatch(Recipient::Room, notification);
    }

    /// Delivers a notification to its recipients.
    fn dispatch(&self, recipient: Recipient, notification: Notification) {
        match recipient {
            Recipient::Room => {
                for player in self.room.players() {
                    self.send_to(player.id, notification.clone());
                }
            }
            Recipient::Connection(connection) => self.send_to(connection, notification),
        }
    }

    /// Sends to a single player. Silently drops if the receiver is gone.
    fn send_to(&self, connection: ConnectionId, notification: Notification) {
        if let Some(sender) = self.senders.get(&connection) {
            let _ = sender.send(notification);
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room.id().clone(),
            phase: self.room.phase(),
            players: self.room.roster(),
            round: self.room.round(),
            total_rounds: self.ctx.catalog.len(),
            time_left: self.room.time_left(),
            clock_running: self.clock.is_running(),
        }
    }
}

/// Creates the command channel for a new room.
///
/// The handle can be registered before the actor exists; commands queue
/// until [`spawn_room`] starts it.
pub(crate) fn room_channel(
    room_id: RoomId,
    channel_size: usize,
) -> (RoomHandle, RoomInbox) {
    let (tx, rx) = mpsc::channel(channel_size);
    (RoomHandle::new(room_id, tx), rx)
}

/// Spawns the actor for `room`, whose creator is its only player.
pub(crate) fn spawn_room<E: Executor>(
    room: Room,
    creator_sender: PlayerSender,
    ctx: RoomContext<E>,
    handle: &RoomHandle,
    receiver: RoomInbox,
) {
    let mut senders = HashMap::new();
    if let Some(creator) = room.players().first() {
        senders.insert(creator.id, creator_sender);
    }

    let actor = RoomActor {
        clock: RoundClock::new(ctx.config.tick_period),
        room,
        ctx,
        senders,
        advance: Deadline::new(),
        receiver,
        loopback: handle.sender.downgrade(),
        evaluating: HashSet::new(),
        closed: false,
    };

    tokio::spawn(actor.run());
}
