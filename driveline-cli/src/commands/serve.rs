//! Serve command - drive an out-of-process renderer over WebSocket.
//!
//! Waits for one renderer to connect, then runs a tracking session against
//! it. Inputs come from an optional trace; renderer frames (taps, drags,
//! readiness) come from the live connection. Runs until Ctrl+C.

use std::path::PathBuf;

use driveline::bridge::{WebSocketBridge, DEFAULT_BRIDGE_CAPACITY};
use driveline::session::trace::{load_trace, play_trace};
use driveline::session::{session_channels, TrackingSession};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::common::{build_router, print_session_output};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:9321";

/// Arguments for the serve command.
pub struct ServeArgs {
    pub listen: String,
    pub trace: Option<PathBuf>,
    pub routes: Option<PathBuf>,
}

/// Run the serve command.
pub fn run(runner: &CliRunner, args: ServeArgs) -> Result<(), CliError> {
    runner.log_startup("serve");
    let config = runner.config();

    let entries = match &args.trace {
        Some(path) => load_trace(path)?,
        None => Vec::new(),
    };
    let router = build_router(config, args.routes.as_deref())?;
    let session = TrackingSession::new(config.session_config(), router)
        .map_err(|e| CliError::Session(e.to_string()))?;

    let runtime = runner.runtime()?;
    let cancel = CancellationToken::new();
    runner.install_shutdown_handler(&cancel)?;

    let summary = runtime.block_on(async {
        let bridge = WebSocketBridge::bind(args.listen.as_str()).await?;
        println!("Listening on ws://{}", bridge.local_addr()?);
        println!("Waiting for renderer... (Ctrl+C to stop)");
        println!();

        let transport = tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            accepted = bridge.accept(DEFAULT_BRIDGE_CAPACITY) => accepted?,
        };
        println!("Renderer connected from {}", transport.peer());

        let (feeds, inputs) =
            session_channels(session.config().position.clone(), DEFAULT_BRIDGE_CAPACITY);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(session.run(inputs, transport, events_tx, cancel.clone()));
        let printer = tokio::spawn(print_session_output(None, events_rx));

        if !entries.is_empty() {
            let stats = play_trace(&entries, &feeds, None, &cancel).await;
            info!(
                delivered = stats.delivered,
                skipped = stats.skipped,
                "Trace playback finished"
            );
        }

        // Keep inputs open so the renderer can still request routes
        cancel.cancelled().await;
        drop(feeds);

        let summary = handle
            .await
            .map_err(|e| CliError::Session(e.to_string()))?;
        printer
            .await
            .map_err(|e| CliError::Session(e.to_string()))?;
        Ok::<_, CliError>(Some(summary))
    })?;

    if let Some(summary) = summary {
        println!();
        println!("Session Summary");
        println!("───────────────");
        println!("  Position fixes:    {}", summary.fixes);
        println!("  Route requests:    {}", summary.route_requests);
        println!(
            "  Renderer commands: {} sent, {} dropped",
            summary.commands_sent, summary.commands_dropped
        );
    }

    Ok(())
}
