//! Game configuration loaded from environment variables.
//!
//! Variables come from the process environment, or from a `.env` file in
//! the working directory via `dotenvy` (real environment variables win).
//! Every setting has a default, and a variable that is set but can't be
//! parsed falls back to that default. Keys:
//!
//! | variable | default |
//! |---|---|
//! | `CODEDUEL_ROUND_SECS` | 60 |
//! | `CODEDUEL_TICK_MS` | 1000 |
//! | `CODEDUEL_MIN_PLAYERS` | 2 |
//! | `CODEDUEL_WIN_SCORE` | 3 |
//! | `CODEDUEL_ADVANCE_DELAY_SECS` | 3 |
//! | `CODEDUEL_EXEC_LIMIT_MS` | 1000 |
//! | `CODEDUEL_SANDBOX` | unset (sandbox command line, split on whitespace) |
//! | `CODEDUEL_CATALOG` | unset (JSON task file; builtin tasks otherwise) |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use codeduel_room::RoomConfig;
use codeduel_tasks::Catalog;

use crate::CodeduelError;

/// Top-level configuration for the `codeduel` binary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameConfig {
    /// Settings applied to every room.
    pub room: RoomConfig,

    /// Sandbox program followed by its arguments.
    pub sandbox: Vec<String>,

    /// Task catalog file. `None` plays the builtin tasks.
    pub catalog_path: Option<PathBuf>,
}

impl GameConfig {
    /// Loads configuration from the process environment.
    ///
    /// Calls `dotenvy::dotenv().ok()` first, so a `.env` file is optional.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = RoomConfig::default();

        let room = RoomConfig {
            round_duration: Duration::from_secs(parse_env(
                &lookup,
                "CODEDUEL_ROUND_SECS",
                defaults.round_duration.as_secs(),
            )),
            tick_period: Duration::from_millis(parse_env(
                &lookup,
                "CODEDUEL_TICK_MS",
                duration_millis(defaults.tick_period),
            )),
            min_players: parse_env(&lookup, "CODEDUEL_MIN_PLAYERS", defaults.min_players),
            win_score: parse_env(&lookup, "CODEDUEL_WIN_SCORE", defaults.win_score),
            advance_delay: Duration::from_secs(parse_env(
                &lookup,
                "CODEDUEL_ADVANCE_DELAY_SECS",
                defaults.advance_delay.as_secs(),
            )),
            execution_time_limit: Duration::from_millis(parse_env(
                &lookup,
                "CODEDUEL_EXEC_LIMIT_MS",
                duration_millis(defaults.execution_time_limit),
            )),
            channel_size: defaults.channel_size,
        }
        .validated();

        let sandbox = lookup("CODEDUEL_SANDBOX")
            .map(|line| line.split_whitespace().map(String::from).collect())
            .unwrap_or_default();

        let catalog_path = lookup("CODEDUEL_CATALOG")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Self {
            room,
            sandbox,
            catalog_path,
        }
    }

    /// Reads the configured catalog, or returns the builtin one.
    ///
    /// # Errors
    /// Returns `CodeduelError::Io` if the file can't be read, or
    /// `CodeduelError::Task` if it isn't a valid catalog.
    pub fn load_catalog(&self) -> Result<Catalog, CodeduelError> {
        match &self.catalog_path {
            Some(path) => {
                let data = std::fs::read(path)?;
                Ok(Catalog::from_json(&data)?)
            }
            None => Ok(Catalog::builtin()),
        }
    }
}

/// Parses `key` as `T`, returning `default` on missing or invalid values.
fn parse_env<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
