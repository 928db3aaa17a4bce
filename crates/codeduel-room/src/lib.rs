//! Rooms and rounds for codeduel.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! players, scores, round clock and advance deadline. The engine finds
//! rooms through a shared registry and forwards requests to them.
//!
//! # Key types
//!
//! - [`RoundEngine`]: create rooms, join, submit, disconnect
//! - [`RoomRegistry`]: room id → room, connection → room
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`Room`] / [`Player`]: a room's game state, without I/O
//! - [`RoomPhase`]: lobby, round open, round solved, finished
//! - [`RoomConfig`]: round length, tick period, win score, etc.

mod actor;
mod config;
mod engine;
mod error;
mod registry;
mod state;

pub use actor::{PlayerSender, RoomHandle, RoomInfo};
pub use config::{RoomConfig, RoomPhase};
pub use engine::RoundEngine;
pub use error::RoomError;
pub use registry::RoomRegistry;
pub use state::{Player, Room};
