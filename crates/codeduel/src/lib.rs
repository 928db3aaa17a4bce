//! # Codeduel
//!
//! Game core for multiplayer coding duels: players share a room, race to
//! solve the same task each round, and the first correct submission wins
//! the round.
//!
//! The pieces live in sub-crates; this crate wires them together and adds
//! what a running process needs:
//!
//! - [`GameConfig`]: settings from `CODEDUEL_*` environment variables
//! - [`ProcessExecutor`]: runs submissions in an external sandbox program
//! - [`Dispatcher`]: turns [`ClientAction`](protocol::ClientAction)s
//!   into [`RoundEngine`] calls
//! - [`Console`]: a line-delimited adapter over any async reader/writer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use codeduel::prelude::*;
//!
//! # async fn run() -> Result<(), CodeduelError> {
//! let config = GameConfig::from_env();
//! let executor = ProcessExecutor::new(config.sandbox.clone(), config.room.execution_time_limit)?;
//! let engine = RoundEngine::new(executor, config.load_catalog()?, config.room);
//! let console = Console::new(Dispatcher::new(engine));
//! console
//!     .run(tokio::io::BufReader::new(tokio::io::stdin()), tokio::io::stdout())
//!     .await
//! # }
//! ```

mod config;
mod console;
mod dispatch;
mod error;
mod sandbox;

pub use config::GameConfig;
pub use console::Console;
pub use dispatch::Dispatcher;
pub use error::CodeduelError;
pub use sandbox::{ProcessCallable, ProcessExecutor};

pub use codeduel_protocol as protocol;
pub use codeduel_room::{RoomConfig, RoomRegistry, RoundEngine};
pub use codeduel_tasks as tasks;

/// Convenience re-exports for embedding the game core.
pub mod prelude {
    pub use crate::{CodeduelError, Console, Dispatcher, GameConfig, ProcessExecutor};
    pub use codeduel_protocol::{
        ClientAction, Codec, ConnectionId, Delivery, Inbound, JsonCodec, Notification,
        RoomId,
    };
    pub use codeduel_room::{
        PlayerSender, RoomConfig, RoomError, RoomInfo, RoomPhase, RoomRegistry, RoundEngine,
    };
    pub use codeduel_tasks::{
        Callable, CallKind, Catalog, Equality, ExecutionError, Executor, Task, TestCase,
        Value, Verdict,
    };
}
