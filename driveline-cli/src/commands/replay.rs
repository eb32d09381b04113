//! Replay command - run a recorded trace through a tracking session.
//!
//! The renderer side is the console: every command the session would send
//! to the map is printed, followed by the host events. A `MAP_READY` frame
//! is injected first unless the trace carries its own.

use std::path::PathBuf;

use driveline::bridge::{ChannelTransport, RendererEnd, DEFAULT_BRIDGE_CAPACITY};
use driveline::session::trace::{load_trace, play_trace, TraceEntry, TraceEvent};
use driveline::session::{session_channels, TrackingSession};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::common::{build_router, print_session_output};
use crate::error::CliError;
use crate::runner::CliRunner;

const MAP_READY_FRAME: &str = r#"{"type":"MAP_READY"}"#;

/// Arguments for the replay command.
pub struct ReplayArgs {
    pub trace: PathBuf,
    pub routes: Option<PathBuf>,
}

/// Run the replay command.
pub fn run(runner: &CliRunner, args: ReplayArgs) -> Result<(), CliError> {
    runner.log_startup("replay");
    let config = runner.config();

    let entries = load_trace(&args.trace)?;
    let router = build_router(config, args.routes.as_deref())?;
    let session = TrackingSession::new(config.session_config(), router)
        .map_err(|e| CliError::Session(e.to_string()))?;

    let runtime = runner.runtime()?;
    let cancel = CancellationToken::new();
    runner.install_shutdown_handler(&cancel)?;

    println!("Replaying {} ({} entries)", args.trace.display(), entries.len());
    println!();

    let (stats, summary) = runtime.block_on(async {
        let (feeds, inputs) =
            session_channels(session.config().position.clone(), DEFAULT_BRIDGE_CAPACITY);
        let (transport, renderer) = ChannelTransport::pair(DEFAULT_BRIDGE_CAPACITY);
        let RendererEnd { commands, messages } = renderer;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(session.run(inputs, transport, events_tx, cancel.clone()));
        let printer = tokio::spawn(print_session_output(Some(commands), events_rx));

        if !announces_map_ready(&entries) {
            // Closed only if the session already ended; the run result says why
            let _ = messages.send(MAP_READY_FRAME.to_string()).await;
        }

        let stats = play_trace(&entries, &feeds, Some(&messages), &cancel).await;
        drop(feeds);

        let summary = handle
            .await
            .map_err(|e| CliError::Session(e.to_string()))?;
        printer
            .await
            .map_err(|e| CliError::Session(e.to_string()))?;
        Ok::<_, CliError>((stats, summary))
    })?;

    println!();
    println!("Session Summary");
    println!("───────────────");
    println!("  Trace entries:     {} delivered", stats.delivered);
    println!("  Sensor samples:    {}", summary.sensor_samples);
    println!("  Position fixes:    {}", summary.fixes);
    println!("  Route requests:    {}", summary.route_requests);
    println!(
        "  Renderer commands: {} sent, {} dropped",
        summary.commands_sent, summary.commands_dropped
    );
    if summary.frames_discarded > 0 {
        println!("  Discarded frames:  {}", summary.frames_discarded);
    }

    Ok(())
}

/// Whether the trace sends its own `MAP_READY`.
fn announces_map_ready(entries: &[TraceEntry]) -> bool {
    entries.iter().any(|entry| match &entry.event {
        TraceEvent::Renderer { message } => serde_json::from_str::<serde_json::Value>(message)
            .map(|value| value["type"] == "MAP_READY")
            .unwrap_or(false),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use driveline::session::trace::parse_trace;

    #[test]
    fn test_announces_map_ready() {
        let with = parse_trace(
            r#"{"at_ms":0,"event":"renderer","message":"{\"type\":\"MAP_READY\"}"}"#,
        )
        .unwrap();
        assert!(announces_map_ready(&with));

        let without = parse_trace(
            r#"{"at_ms":0,"event":"renderer","message":"{\"type\":\"DRAG_START\"}"}
{"at_ms":5,"event":"fix","latitude":0.0,"longitude":0.0}"#,
        )
        .unwrap();
        assert!(!announces_map_ready(&without));
    }
}
