use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use sporkfish_engine::{Clock, Engine, EngineConfig};

/// Search a position from the command line and print the chosen move.
///
/// Usage: `sporkfish [FEN] [budget-ms]`. Defaults to the starting position
/// with a one second budget.
fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    info!("sporkfish starting");

    let mut args = std::env::args().skip(1);
    let fen = args
        .next()
        .unwrap_or_else(|| "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1".to_string());
    let budget_ms: u64 = match args.next() {
        Some(text) => text.parse().context("budget must be milliseconds")?,
        None => 1_000,
    };

    let mut engine = Engine::new(EngineConfig::default())?;
    engine.set_position(&fen, &[])?;

    // The driver hands over the full budget as remaining clock time; the
    // default time weight then spends a tenth of it, so scale up front.
    let clock = Clock {
        remaining: Duration::from_millis(budget_ms * 10),
        increment: Duration::ZERO,
    };

    let outcome = engine.search(clock)?;
    info!(
        depth = outcome.depth,
        score = outcome.score,
        nodes = outcome.nodes,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "search finished"
    );
    println!("bestmove {}", outcome.best_move);
    Ok(())
}
