//! Recorded session traces.
//!
//! A trace is a JSON-lines file of timed inputs. Playing it feeds a running
//! [`TrackingSession`](super::TrackingSession) exactly as live sensors, the
//! location service, the host and the renderer would.
//!
//! ```text
//! {"at_ms":0,"event":"renderer","message":"{\"type\":\"MAP_READY\"}"}
//! {"at_ms":100,"event":"sensor","kind":"inertial","x":0.0,"y":0.0,"z":9.81}
//! {"at_ms":120,"event":"sensor","kind":"magnetic","x":0.0,"y":22.0,"z":-40.0}
//! {"at_ms":500,"event":"fix","latitude":0.0,"longitude":0.0,"accuracy_m":5.0}
//! {"at_ms":900,"event":"host","command":"request_route","destination":{"latitude":0.0,"longitude":0.01}}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Fixes are stamped
//! with the playback time, so old recordings are not dropped as stale.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{HostCommand, SessionFeeds};
use crate::heading::SensorReading;
use crate::position::{GeoPosition, PositionError, DEFAULT_ACCURACY_M};

/// Errors reading a trace.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Failed to read trace: {0}")]
    Io(#[from] std::io::Error),

    #[error("Trace line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// One timed input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TraceEntry {
    /// Offset from playback start.
    #[serde(default)]
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: TraceEvent,
}

/// Recorded input kinds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    Fix {
        latitude: f64,
        longitude: f64,
        #[serde(default = "default_accuracy")]
        accuracy_m: f64,
    },
    /// Location service became unavailable.
    PositionLost { message: String },
    PermissionDenied,
    Sensor(SensorReading),
    /// Raw frame as the renderer would send it.
    Renderer { message: String },
    Host(HostCommand),
}

fn default_accuracy() -> f64 {
    DEFAULT_ACCURACY_M
}

/// Parse a JSON-lines trace.
pub fn parse_trace(text: &str) -> Result<Vec<TraceEntry>, TraceError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| TraceError::Parse {
                line: i + 1,
                message: e.to_string(),
            })
        })
        .collect()
}

/// Read and parse a trace file.
pub fn load_trace(path: &std::path::Path) -> Result<Vec<TraceEntry>, TraceError> {
    let text = std::fs::read_to_string(path)?;
    parse_trace(&text)
}

/// Playback counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub delivered: usize,
    /// Renderer frames with nowhere to go.
    pub skipped: usize,
}

/// Feed `entries` into a session, honoring their timing.
///
/// Renderer frames go to `renderer` when given and are skipped otherwise
/// (a real renderer is attached). Stops early when cancelled or when the
/// session stops accepting input.
pub async fn play_trace(
    entries: &[TraceEntry],
    feeds: &SessionFeeds,
    renderer: Option<&mpsc::Sender<String>>,
    cancel: &CancellationToken,
) -> PlaybackStats {
    let start = Instant::now();
    let mut stats = PlaybackStats::default();

    for entry in entries {
        let due = start + Duration::from_millis(entry.at_ms);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep_until(due) => {}
        }

        let delivered = match &entry.event {
            TraceEvent::Fix {
                latitude,
                longitude,
                accuracy_m,
            } => feeds
                .positions
                .send(Ok(GeoPosition::new(*latitude, *longitude, *accuracy_m)))
                .await
                .is_ok(),
            TraceEvent::PositionLost { message } => feeds
                .positions
                .send(Err(PositionError::Unavailable(message.clone())))
                .await
                .is_ok(),
            TraceEvent::PermissionDenied => feeds
                .positions
                .send(Err(PositionError::PermissionDenied))
                .await
                .is_ok(),
            TraceEvent::Sensor(reading) => feeds.sensors.send(*reading).await.is_ok(),
            TraceEvent::Host(command) => feeds.commands.send(command.clone()).await.is_ok(),
            TraceEvent::Renderer { message } => match renderer {
                Some(tx) => tx.send(message.clone()).await.is_ok(),
                None => {
                    debug!(at_ms = entry.at_ms, "Renderer frame skipped");
                    stats.skipped += 1;
                    continue;
                }
            },
        };

        if !delivered {
            warn!(at_ms = entry.at_ms, "Session stopped accepting trace input");
            break;
        }
        stats.delivered += 1;
    }

    stats
}
