//! Core protocol types for codeduel.
//!
//! Everything in this module travels "on the wire": inbound actions a
//! player's client sends ([`ClientAction`]), and the notifications the
//! room engine emits back ([`Notification`]).

use std::fmt;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Length of a generated room id.
const GENERATED_ROOM_ID_LEN: usize = 6;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier of one client connection.
///
/// A connection is a player's identity for the lifetime of their session:
/// it is unique within a room and stays the same until the connection
/// drops. `#[serde(transparent)]` makes `ConnectionId(42)` travel as `42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Identifier of a room, chosen by its creator or generated.
///
/// Unlike connection ids, room ids are human-facing (players share them
/// to invite each other), so they are strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps an existing id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random alphanumeric room id.
    pub fn generate() -> Self {
        let id: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(GENERATED_ROOM_ID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Recipient: who should receive a notification?
// ---------------------------------------------------------------------------

/// Who a notification is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every player currently in the room.
    Room,

    /// A single connection, e.g. the submitter of a wrong solution.
    Connection(ConnectionId),
}

// ---------------------------------------------------------------------------
// Payload shapes
// ---------------------------------------------------------------------------

/// A roster entry as sent in `currentPlayers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: ConnectionId,
    pub name: String,
    pub score: u32,
}

/// A `{name, score}` pair as sent in score tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerScore {
    pub name: String,
    pub score: u32,
}

/// The task a round is played on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    /// Human-readable statement of the challenge.
    pub prompt: String,
    /// Name of the function or class the submission must define.
    pub entry_point: String,
}

// ---------------------------------------------------------------------------
// ClientAction: what players send
// ---------------------------------------------------------------------------

/// An action sent by a player's client.
///
/// Internally tagged by `type`, camelCase on the wire:
/// `{ "type": "joinRoom", "roomId": "R1", "userName": "Bob" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientAction {
    /// Create a room and become its first player. A missing `roomId`
    /// asks the server to generate one.
    CreateRoom {
        #[serde(default)]
        room_id: Option<RoomId>,
        user_name: String,
    },

    /// Join an existing room.
    JoinRoom { room_id: RoomId, user_name: String },

    /// Submit a candidate solution for the current round.
    SubmitCode { room_id: RoomId, code: String },

    /// The connection is going away.
    Disconnect,
}

impl ClientAction {
    /// Checks rules that serde can't express.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` for blank user names or
    /// room ids.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let (room_id, user_name) = match self {
            Self::CreateRoom { room_id, user_name } => {
                (room_id.as_ref(), Some(user_name))
            }
            Self::JoinRoom { room_id, user_name } => {
                (Some(room_id), Some(user_name))
            }
            Self::SubmitCode { room_id, .. } => (Some(room_id), None),
            Self::Disconnect => (None, None),
        };
        if room_id.is_some_and(|id| id.as_str().trim().is_empty()) {
            return Err(ProtocolError::InvalidMessage(
                "room id must not be empty".into(),
            ));
        }
        if user_name.is_some_and(|name| name.trim().is_empty()) {
            return Err(ProtocolError::InvalidMessage(
                "user name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// An action tagged with the connection it arrived on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbound {
    pub connection: ConnectionId,
    pub action: ClientAction,
}

// ---------------------------------------------------------------------------
// Notification: what the room engine sends
// ---------------------------------------------------------------------------

/// An event emitted by the room engine.
///
/// Adjacently tagged so clients can switch on one field:
/// `{ "event": "newRound", "data": { "round": 2 } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Notification {
    /// A room was created (sent to the creator).
    RoomCreated(RoomId),

    /// The full roster, after any membership change.
    CurrentPlayers(Vec<PlayerInfo>),

    /// Someone joined.
    PlayerJoined { id: ConnectionId, name: String },

    /// Someone left; carries their connection id.
    PlayerLeft(ConnectionId),

    /// The game began with this many rounds (= catalog length).
    GameStarted { total_rounds: usize },

    /// A round began. Round numbers are 1-based.
    NewRound { round: usize },

    /// The task for the round that just began.
    Task(TaskPayload),

    /// Seconds remaining in the current round.
    TimerUpdate(u64),

    /// All players' scores, after a solve.
    ScoreUpdate(Vec<PlayerScore>),

    /// The round was won.
    TaskSolved { solver: String, code: String },

    /// The submitter's code failed to run or produced a wrong answer.
    IncorrectSolution(String),

    /// A round closed (solved or timed out).
    RoundEnded { scores: Vec<PlayerScore> },

    /// The game is over; the room is gone after this.
    GameEnded {
        winner: Option<String>,
        scores: Vec<PlayerScore>,
    },

    /// The acting client's request could not be honoured.
    Error(String),
}

/// A notification addressed to one connection, as written by adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub connection: ConnectionId,
    pub notification: Notification,
}

// =========================================================================
// Tests
// =========================================================================
