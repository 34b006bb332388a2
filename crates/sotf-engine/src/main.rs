//! Session binary for Survival of the Fittest.
//!
//! Wires the session core to NATS and to a line-based console, then runs
//! one session until the turn limit, channel loss, or Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `sotf-config.yaml`
//! 3. Load the trait catalog
//! 4. Connect to NATS on the session's subjects
//! 5. Build the game handler and register the logging listener
//! 6. Start the console reader
//! 7. Run the session
//! 8. Log the summary and flush outbound actions

mod console;
mod error;
mod log_listener;
mod nats_channel;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sotf_core::{GameConfig, GameHandler, Session, load_catalog, log_session_end, session_rng};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::log_listener::LogListener;

/// How long outbound actions get to reach NATS after the session ends.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any startup step fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("sotf-engine starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        session = %config.session.name,
        role = ?config.participant.role,
        player = %config.participant.player,
        seed = config.session.seed,
        max_turns = config.session.max_turns,
        board_size = config.board.size,
        "Configuration loaded"
    );

    // 3. Load the trait catalog.
    let catalog = Arc::new(load_catalog(&config.session).map_err(EngineError::from)?);

    // 4. Connect to NATS.
    let nats_url = &config.infrastructure.nats_url;
    info!(nats_url = %nats_url, "Connecting to NATS");
    let nats_channel::NatsTransport {
        link,
        inbound,
        publisher,
    } = nats_channel::connect(nats_url, &config.session.name, config.participant.role).await?;

    // 5. Build the handler.
    let mut handler = GameHandler::new(
        &config,
        catalog,
        Box::new(link),
        session_rng(config.session.seed),
    );
    handler.add_listener(Box::new(LogListener::new(config.participant.player.clone())));

    // 6. Console intents.
    let intents = console::spawn_reader();
    info!("Type `move <piece> <cell>` or `pass` during your turn");

    // 7. Run the session.
    let mut session = Session::new(&config, handler, inbound, intents);
    let summary = session.run(shutdown_signal()).await;

    // 8. Log results and let the publisher drain.
    log_session_end(&summary);
    drop(session);
    if tokio::time::timeout(FLUSH_TIMEOUT, publisher).await.is_err() {
        warn!("Timed out flushing outbound actions");
    }

    info!(
        end_reason = ?summary.end_reason,
        turns = summary.turns_started,
        "sotf-engine shutdown complete"
    );
    Ok(())
}

/// Load `sotf-config.yaml` from the working directory, or defaults.
fn load_config() -> Result<GameConfig, EngineError> {
    Ok(GameConfig::load_or_default(Path::new("sotf-config.yaml"))?)
}

/// Resolves on Ctrl-C. If the signal cannot be installed, never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
