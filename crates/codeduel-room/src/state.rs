//! A room's game state, with no I/O.
//!
//! [`Room`] holds the roster, scores, task index and phase, and exposes
//! the transitions of a game as plain methods. The room actor drives it
//! and turns the results into notifications and timer changes.

use codeduel_protocol::{ConnectionId, PlayerInfo, PlayerScore, RoomId};

use crate::{RoomError, RoomPhase};

/// A participant in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: ConnectionId,
    /// Display name. Not unique.
    pub name: String,
    /// Rounds won this game. Never decreases.
    pub score: u32,
}

impl Player {
    pub fn new(id: ConnectionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            score: 0,
        }
    }
}

/// One room's game.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    /// Join order. The winner tie-break depends on it.
    players: Vec<Player>,
    current_task_index: usize,
    phase: RoomPhase,
    /// Ticks left in the current round.
    time_left: u64,
}

impl Room {
    /// Creates a room in the lobby with its creator as the only player.
    pub fn new(id: RoomId, creator: Player) -> Self {
        Self {
            id,
            players: vec![creator],
            current_task_index: 0,
            phase: RoomPhase::Lobby,
            time_left: 0,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn game_active(&self) -> bool {
        self.phase.is_active()
    }

    pub fn task_solved(&self) -> bool {
        self.phase == RoomPhase::RoundSolved
    }

    pub fn current_task_index(&self) -> usize {
        self.current_task_index
    }

    /// The 1-based round number.
    pub fn round(&self) -> usize {
        self.current_task_index + 1
    }

    pub fn time_left(&self) -> u64 {
        self.time_left
    }

    pub fn set_time_left(&mut self, ticks: u64) {
        self.time_left = ticks;
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: ConnectionId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn is_member(&self, id: ConnectionId) -> bool {
        self.player(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Appends a player with score 0.
    ///
    /// # Errors
    /// [`RoomError::AlreadyInRoom`] if the connection is already a member.
    pub fn add_player(&mut self, player: Player) -> Result<(), RoomError> {
        if self.is_member(player.id) {
            return Err(RoomError::AlreadyInRoom(player.id, self.id.clone()));
        }
        self.players.push(player);
        Ok(())
    }

    /// Removes a player, keeping everyone else's order and score.
    ///
    /// # Errors
    /// [`RoomError::NotInRoom`] if the connection isn't a member.
    pub fn remove_player(&mut self, id: ConnectionId) -> Result<Player, RoomError> {
        let index = self
            .players
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| RoomError::NotInRoom(id, self.id.clone()))?;
        Ok(self.players.remove(index))
    }

    /// Whether the lobby has filled up enough to start.
    pub fn ready_to_start(&self, min_players: usize) -> bool {
        self.phase == RoomPhase::Lobby && self.players.len() >= min_players
    }

    // -----------------------------------------------------------------------
    // Game transitions
    // -----------------------------------------------------------------------

    /// Opens round 1 on task 0.
    pub fn start_game(&mut self, round_ticks: u64) {
        debug_assert!(self.phase.can_transition_to(RoomPhase::RoundInProgress));
        self.current_task_index = 0;
        self.time_left = round_ticks;
        self.phase = RoomPhase::RoundInProgress;
    }

    /// Credits `solver` with the open round and closes it.
    ///
    /// Returns the solver's new score, or `None` if no round is open or
    /// the connection isn't a member. Only the first call per round can
    /// succeed.
    pub fn record_solve(&mut self, solver: ConnectionId) -> Option<u32> {
        if !self.phase.accepts_submissions() {
            return None;
        }
        let player = self.players.iter_mut().find(|p| p.id == solver)?;
        player.score += 1;
        self.phase = RoomPhase::RoundSolved;
        Some(player.score)
    }

    /// Moves to the next task if there is one.
    ///
    /// Returns `false` (and changes nothing) when already on the last
    /// task; the caller ends the game instead.
    pub fn advance(&mut self, last_index: usize, round_ticks: u64) -> bool {
        if !self.phase.is_active() || self.current_task_index >= last_index {
            return false;
        }
        self.current_task_index += 1;
        self.time_left = round_ticks;
        self.phase = RoomPhase::RoundInProgress;
        true
    }

    pub fn finish(&mut self) {
        self.phase = RoomPhase::Finished;
        self.time_left = 0;
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// The first player, in join order, with the highest score.
    pub fn winner(&self) -> Option<&Player> {
        self.players.iter().fold(None, |best: Option<&Player>, p| match best {
            Some(b) if b.score >= p.score => Some(b),
            _ => Some(p),
        })
    }

    pub fn scores(&self) -> Vec<PlayerScore> {
        self.players
            .iter()
            .map(|p| PlayerScore {
                name: p.name.clone(),
                score: p.score,
            })
            .collect()
    }

    pub fn roster(&self) -> Vec<PlayerInfo> {
        self.players
            .iter()
            .map(|p| PlayerInfo {
                id: p.id,
                name: p.name.clone(),
                score: p.score,
            })
            .collect()
    }
}
