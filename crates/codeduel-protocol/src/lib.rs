//! Wire protocol for codeduel.
//!
//! This crate defines what clients and the game core say to each other:
//!
//! - **Types** ([`ClientAction`], [`Notification`], [`Recipient`], etc.):
//!   inbound player actions and the room-scoped events sent back.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between whatever carries the bytes (a socket,
//! a pipe, a test harness) and the room engine. It knows nothing about
//! rooms or timers, only how messages are shaped.
//!
//! ```text
//! Adapter (bytes) → Protocol (Inbound / Delivery) → Room engine
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientAction, ConnectionId, Delivery, Inbound, Notification, PlayerInfo,
    PlayerScore, Recipient, RoomId, TaskPayload,
};
