//! Room configuration and round phases.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room an engine creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// How long a round lasts before it times out.
    pub round_duration: Duration,

    /// Countdown granularity. One `timerUpdate` is sent per tick.
    pub tick_period: Duration,

    /// Players needed before the game starts.
    pub min_players: usize,

    /// Score that ends the game immediately.
    pub win_score: u32,

    /// Pause between a solved round and the next one.
    pub advance_delay: Duration,

    /// Budget for running one submission's test cases. Enforced by the
    /// executor, not by the room.
    pub execution_time_limit: Duration,

    /// Capacity of each room's command channel.
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            round_duration: Duration::from_secs(60),
            tick_period: Duration::from_secs(1),
            min_players: 2,
            win_score: 3,
            advance_delay: Duration::from_secs(3),
            execution_time_limit: Duration::from_secs(1),
            channel_size: 64,
        }
    }
}

impl RoomConfig {
    /// Returns a copy with unusable values replaced.
    ///
    /// A zero tick period, zero min players, zero win score or a zero
    /// channel size would stall or break a room, so each is raised to
    /// the smallest working value.
    pub fn validated(mut self) -> Self {
        if self.tick_period.is_zero() {
            warn!("tick_period is zero, using 1ms");
            self.tick_period = Duration::from_millis(1);
        }
        if self.min_players == 0 {
            warn!("min_players is zero, using 1");
            self.min_players = 1;
        }
        if self.win_score == 0 {
            warn!("win_score is zero, using 1");
            self.win_score = 1;
        }
        if self.channel_size == 0 {
            warn!("channel_size is zero, using 1");
            self.channel_size = 1;
        }
        self
    }

    /// Number of clock ticks in one round, rounded up.
    ///
    /// With the default one-second period this is the round length in
    /// seconds, which is what `timerUpdate` reports.
    pub fn round_ticks(&self) -> u64 {
        let period = self.tick_period.as_millis().max(1);
        let ticks = self.round_duration.as_millis().div_ceil(period);
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// Where a room is in its game.
///
/// ```text
/// Lobby → RoundInProgress ⇄ RoundSolved
///              │                 │
///              └──→ Finished ←───┘
/// ```
///
/// - **Lobby**: waiting for enough players.
/// - **RoundInProgress**: a task is open and submissions are evaluated.
/// - **RoundSolved**: someone solved the task; the room is pausing
///   before the next round. Further submissions are ignored.
/// - **Finished**: the game ended. The room is removed right after.
///
/// A timed-out round moves `RoundInProgress → RoundInProgress` (next
/// task) without passing through `RoundSolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomPhase {
    Lobby,
    RoundInProgress,
    RoundSolved,
    Finished,
}

impl RoomPhase {
    /// Whether a game is running (the `gameActive` flag).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::RoundInProgress | Self::RoundSolved)
    }

    /// Whether submissions are currently evaluated.
    pub fn accepts_submissions(&self) -> bool {
        matches!(self, Self::RoundInProgress)
    }

    /// Returns `true` if moving to `target` is a legal step.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Lobby, Self::RoundInProgress)
                | (Self::RoundInProgress, Self::RoundInProgress)
                | (Self::RoundInProgress, Self::RoundSolved)
                | (Self::RoundInProgress, Self::Finished)
                | (Self::RoundSolved, Self::RoundInProgress)
                | (Self::RoundSolved, Self::Finished)
        )
    }
}

impl std::fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lobby => write!(f, "Lobby"),
            Self::RoundInProgress => write!(f, "RoundInProgress"),
            Self::RoundSolved => write!(f, "RoundSolved"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}
