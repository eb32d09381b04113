//! Live position fixes from the platform location service.
//!
//! The location service itself is external: it pushes
//! `Result<GeoPosition, PositionError>` reports into a channel. This module
//! only consumes them, applying the same watch options the host app uses:
//!
//! - fixes older than `max_age` are dropped
//! - fixes closer than `distance_filter_m` to the last delivered fix are dropped
//! - silence longer than `timeout` yields a non-fatal [`PositionError::Timeout`]
//! - permission denial and hardware failure are reported once, then the stream ends
//!
//! Retrying or re-requesting permissions is the caller's job.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::geo::{haversine_m, GeoPoint};

/// Default maximum fix age (1 second).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(1);

/// Default silence before a timeout is reported (20 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default minimum movement between delivered fixes, in meters.
pub const DEFAULT_DISTANCE_FILTER_M: f64 = 1.0;

/// Accuracy assumed when the location service does not report one.
pub const DEFAULT_ACCURACY_M: f64 = 10.0;

/// A single position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in meters.
    #[serde(default = "default_accuracy")]
    pub accuracy_m: f64,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn default_accuracy() -> f64 {
    DEFAULT_ACCURACY_M
}

impl GeoPosition {
    /// Create a fix stamped with the current time.
    pub fn new(latitude: f64, longitude: f64, accuracy_m: f64) -> Self {
        Self::with_timestamp(latitude, longitude, accuracy_m, Utc::now())
    }

    /// Create a fix with an explicit timestamp.
    pub fn with_timestamp(latitude: f64, longitude: f64, accuracy_m: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m,
            timestamp,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Location service failures, phrased for display to the user.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositionError {
    /// The user refused location access.
    #[error("Location permission denied")]
    PermissionDenied,

    /// The receiver failed or location services are off.
    #[error("Location unavailable: {0}")]
    Unavailable(String),

    /// No fix arrived within the configured timeout.
    #[error("No position fix for {}s", .0.as_secs())]
    Timeout(Duration),
}

impl PositionError {
    /// Fatal errors end the stream.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PositionError::PermissionDenied | PositionError::Unavailable(_)
        )
    }
}

/// What the location service pushes into the stream.
pub type PositionReport = Result<GeoPosition, PositionError>;

/// Sending half handed to the location service adapter.
pub type PositionSender = mpsc::Sender<PositionReport>;

/// Filtered output of a [`PositionStream`].
#[derive(Debug, Clone, PartialEq)]
pub enum PositionEvent {
    Fix(GeoPosition),
    Error(PositionError),
}

/// Watch options for the position stream.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionStreamConfig {
    pub max_age: Duration,
    pub timeout: Duration,
    pub distance_filter_m: f64,
}

impl Default for PositionStreamConfig {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            timeout: DEFAULT_TIMEOUT,
            distance_filter_m: DEFAULT_DISTANCE_FILTER_M,
        }
    }
}

/// Consumer side of the location service subscription.
#[derive(Debug)]
pub struct PositionStream {
    rx: mpsc::Receiver<PositionReport>,
    config: PositionStreamConfig,
    last_delivered: Option<GeoPoint>,
    deadline: Instant,
    finished: bool,
}

impl PositionStream {
    /// Wrap an existing receiver.
    pub fn new(rx: mpsc::Receiver<PositionReport>, config: PositionStreamConfig) -> Self {
        let deadline = Instant::now() + config.timeout;
        Self {
            rx,
            config,
            last_delivered: None,
            deadline,
            finished: false,
        }
    }

    /// Create a bounded channel and the stream reading from it.
    pub fn channel(config: PositionStreamConfig, capacity: usize) -> (PositionSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx, config))
    }

    /// Whether the stream has ended (fatal error, closed, or source dropped).
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Wait for the next fix or error.
    ///
    /// Returns `None` once the stream has ended. Cancel-safe: the timeout
    /// deadline survives the future being dropped inside `select!`.
    pub async fn next_event(&mut self) -> Option<PositionEvent> {
        loop {
            if self.finished {
                return None;
            }

            let report = match tokio::time::timeout_at(self.deadline, self.rx.recv()).await {
                Err(_) => {
                    self.deadline = Instant::now() + self.config.timeout;
                    tracing::warn!(
                        timeout_secs = self.config.timeout.as_secs(),
                        "Position stream: no fix within timeout"
                    );
                    return Some(PositionEvent::Error(PositionError::Timeout(self.config.timeout)));
                }
                Ok(None) => {
                    self.finished = true;
                    tracing::debug!("Position stream: source closed");
                    return None;
                }
                Ok(Some(report)) => report,
            };

            self.deadline = Instant::now() + self.config.timeout;

            match report {
                Ok(fix) => {
                    if let Some(fix) = self.accept(fix, Utc::now()) {
                        return Some(PositionEvent::Fix(fix));
                    }
                }
                Err(error) => {
                    if error.is_fatal() {
                        tracing::warn!(%error, "Position stream: fatal error, stopping");
                        self.close();
                    } else {
                        tracing::debug!(%error, "Position stream: transient error");
                    }
                    return Some(PositionEvent::Error(error));
                }
            }
        }
    }

    /// Release the subscription. Pending and future reports are discarded.
    pub fn close(&mut self) {
        self.rx.close();
        self.finished = true;
    }

    fn accept(&mut self, fix: GeoPosition, now: DateTime<Utc>) -> Option<GeoPosition> {
        let point = fix.point();
        if !point.is_valid() {
            tracing::debug!(lat = fix.latitude, lon = fix.longitude, "Position stream: invalid coordinate dropped");
            return None;
        }

        if let Ok(age) = (now - fix.timestamp).to_std() {
            if age > self.config.max_age {
                tracing::debug!(age_ms = age.as_millis() as u64, "Position stream: stale fix dropped");
                return None;
            }
        }

        if let Some(last) = self.last_delivered {
            if haversine_m(&last, &point) < self.config.distance_filter_m {
                return None;
            }
        }

        self.last_delivered = Some(point);
        Some(fix)
    }
}
