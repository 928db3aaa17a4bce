//! `codeduel` binary: runs the game core over stdin/stdout.
//!
//! Reads one JSON [`Inbound`](codeduel::protocol::Inbound) per line on
//! stdin and writes one JSON delivery per line on stdout. Logs go to
//! stderr, filtered by `RUST_LOG` (default `info`).

use codeduel::{Console, Dispatcher, GameConfig, ProcessExecutor, RoundEngine};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), codeduel::CodeduelError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = GameConfig::from_env();
    let catalog = config.load_catalog()?;
    let executor = ProcessExecutor::new(config.sandbox, config.room.execution_time_limit)?;
    tracing::info!(
        tasks = catalog.len(),
        min_players = config.room.min_players,
        win_score = config.room.win_score,
        "starting codeduel"
    );

    let engine = RoundEngine::new(executor, catalog, config.room);
    let console = Console::new(Dispatcher::new(engine));
    console
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;

    tracing::info!("input closed, shutting down");
    Ok(())
}
