//! Compass heading estimation from accelerometer + magnetometer samples.
//!
//! The estimator turns raw device-frame readings into a smoothed compass
//! bearing (0° = north, clockwise positive). There is no gyroscope fusion and
//! no declination correction: the output is a magnetic bearing, which is all
//! the marker rotation needs.
//!
//! # Pipeline
//!
//! ```text
//! inertial ──► normalize ──┐
//!                          ├──► raw azimuth ──► platform mirror ──► [median] ──► EMA ──► heading
//! magnetic ────────────────┘    (flat / tilt-compensated)
//! ```
//!
//! Magnetic samples drive the computation; inertial samples only replace the
//! stored gravity vector. Rejected samples leave the previous heading intact.
//!
//! # Example
//!
//! ```ignore
//! let mut estimator = HeadingEstimator::new(HeadingConfig::default());
//! estimator.ingest_inertial(SensorSample::new(0.0, 0.0, 9.81));
//! if let Some(heading) = estimator.ingest_magnetic(SensorSample::new(0.0, 22.0, -40.0)) {
//!     println!("heading {:.1}°", heading);
//! }
//! ```

mod angle;
mod sample;

pub use angle::{angular_distance, normalize_degrees, shortest_delta};
pub use sample::{SensorError, SensorKind, SensorReading, SensorSample};

use std::collections::VecDeque;

use crate::platform::DevicePlatform;

/// Exponential smoothing factor applied to each new raw azimuth.
pub const DEFAULT_ALPHA: f64 = 0.25;

/// `|azNorm|` above which the device is considered to be lying flat.
pub const DEFAULT_FLAT_THRESHOLD: f64 = 0.9;

/// Raw azimuths retained for diagnostics and the median pre-filter.
pub const DEFAULT_HISTORY_SIZE: usize = 8;

/// Optional filter run over the raw history before exponential smoothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeadingPrefilter {
    /// Feed each raw azimuth straight into the smoother.
    #[default]
    None,
    /// Feed the circular median of the raw history into the smoother.
    CircularMedian,
}

impl std::str::FromStr for HeadingPrefilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(HeadingPrefilter::None),
            "median" | "circular_median" => Ok(HeadingPrefilter::CircularMedian),
            other => Err(format!("unknown heading prefilter '{}'", other)),
        }
    }
}

impl std::fmt::Display for HeadingPrefilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeadingPrefilter::None => write!(f, "none"),
            HeadingPrefilter::CircularMedian => write!(f, "median"),
        }
    }
}

/// Heading estimator tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadingConfig {
    /// Smoothing factor in (0, 1].
    pub alpha: f64,
    /// Flat-device threshold on the normalized vertical gravity component.
    pub flat_threshold: f64,
    /// Raw history length.
    pub history_size: usize,
    /// Axis convention of the device.
    pub platform: DevicePlatform,
    /// Pre-filter applied before smoothing.
    pub prefilter: HeadingPrefilter,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            flat_threshold: DEFAULT_FLAT_THRESHOLD,
            history_size: DEFAULT_HISTORY_SIZE,
            platform: DevicePlatform::default(),
            prefilter: HeadingPrefilter::default(),
        }
    }
}

impl HeadingConfig {
    /// Set the device platform.
    pub fn with_platform(mut self, platform: DevicePlatform) -> Self {
        self.platform = platform;
        self
    }

    /// Set the pre-filter.
    pub fn with_prefilter(mut self, prefilter: HeadingPrefilter) -> Self {
        self.prefilter = prefilter;
        self
    }
}

/// Smoothed heading plus the recent raw azimuths that produced it.
#[derive(Debug, Clone, Default)]
pub struct HeadingState {
    smoothed: Option<f64>,
    raw_history: VecDeque<f64>,
}

impl HeadingState {
    /// The smoothed heading in [0, 360), once at least one sample was accepted.
    pub fn smoothed(&self) -> Option<f64> {
        self.smoothed
    }

    /// Recent raw azimuths, oldest first.
    pub fn raw_history(&self) -> impl Iterator<Item = f64> + '_ {
        self.raw_history.iter().copied()
    }

    pub fn history_len(&self) -> usize {
        self.raw_history.len()
    }
}

/// Converts sensor samples into a smoothed compass heading.
#[derive(Debug, Clone)]
pub struct HeadingEstimator {
    config: HeadingConfig,
    inertial: Option<SensorSample>,
    state: HeadingState,
    rejected: u64,
}

impl Default for HeadingEstimator {
    fn default() -> Self {
        Self::new(HeadingConfig::default())
    }
}

impl HeadingEstimator {
    /// Create an estimator with the given configuration.
    pub fn new(config: HeadingConfig) -> Self {
        let capacity = config.history_size.max(1);
        Self {
            config,
            inertial: None,
            state: HeadingState {
                smoothed: None,
                raw_history: VecDeque::with_capacity(capacity),
            },
            rejected: 0,
        }
    }

    pub fn config(&self) -> &HeadingConfig {
        &self.config
    }

    /// Latest smoothed heading, if any sample has been accepted.
    pub fn heading(&self) -> Option<f64> {
        self.state.smoothed
    }

    pub fn state(&self) -> &HeadingState {
        &self.state
    }

    /// Samples dropped because they were non-finite or degenerate.
    pub fn rejected_samples(&self) -> u64 {
        self.rejected
    }

    /// Store the latest gravity vector. Never produces a heading on its own.
    pub fn ingest_inertial(&mut self, sample: SensorSample) {
        if !sample.is_finite() {
            self.rejected += 1;
            tracing::trace!(?sample, "Heading: non-finite inertial sample ignored");
            return;
        }
        self.inertial = Some(sample);
    }

    /// Store a magnetic reading and recompute the heading.
    ///
    /// Returns the new smoothed heading, or `None` when the sample could not be
    /// used (the previous heading is kept).
    pub fn ingest_magnetic(&mut self, sample: SensorSample) -> Option<f64> {
        if !sample.is_finite() {
            self.rejected += 1;
            tracing::trace!(?sample, "Heading: non-finite magnetic sample ignored");
            return None;
        }
        let inertial = self.inertial.unwrap_or_default();
        let Some(raw) = raw_azimuth(&sample, &inertial, self.config.flat_threshold) else {
            self.rejected += 1;
            tracing::trace!(?inertial, "Heading: degenerate inertial vector, no update");
            return None;
        };

        Some(self.apply_raw(self.config.platform.correct_azimuth(raw)))
    }

    /// Route a reading to the matching ingest method.
    pub fn ingest(&mut self, reading: SensorReading) -> Option<f64> {
        match reading.kind {
            SensorKind::Magnetic => self.ingest_magnetic(reading.sample),
            SensorKind::Inertial => {
                self.ingest_inertial(reading.sample);
                None
            }
        }
    }

    /// Feed an already platform-corrected raw azimuth through the filters.
    pub fn apply_raw(&mut self, raw: f64) -> f64 {
        let raw = normalize_degrees(raw);

        self.state.raw_history.push_back(raw);
        while self.state.raw_history.len() > self.config.history_size.max(1) {
            self.state.raw_history.pop_front();
        }

        let input = match self.config.prefilter {
            HeadingPrefilter::None => raw,
            HeadingPrefilter::CircularMedian => {
                circular_median(self.state.raw_history.iter().copied()).unwrap_or(raw)
            }
        };

        let smoothed = match self.state.smoothed {
            None => input,
            Some(current) => {
                let delta = shortest_delta(current, input);
                normalize_degrees(current + self.config.alpha * delta)
            }
        };

        self.state.smoothed = Some(smoothed);
        smoothed
    }

    /// Forget all samples and the smoothed heading.
    pub fn reset(&mut self) {
        self.inertial = None;
        self.state.smoothed = None;
        self.state.raw_history.clear();
        tracing::debug!("Heading estimator reset");
    }
}

/// Raw magnetic azimuth in [0, 360) before any platform correction.
///
/// Returns `None` for a zero-magnitude inertial vector or when the tilt
/// compensation degenerates to a non-finite value.
pub fn raw_azimuth(magnetic: &SensorSample, inertial: &SensorSample, flat_threshold: f64) -> Option<f64> {
    let norm = inertial.magnitude();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }

    let ax = inertial.x / norm;
    let ay = inertial.y / norm;
    let az = inertial.z / norm;

    let (mx, my, mz) = (magnetic.x, magnetic.y, magnetic.z);

    let azimuth = if az.abs() > flat_threshold {
        mx.atan2(my).to_degrees()
    } else {
        let pitch = ax.clamp(-1.0, 1.0).asin();
        let roll = (-ay / pitch.cos()).clamp(-1.0, 1.0).asin();

        let xh = mx * pitch.cos() + mz * pitch.sin();
        let yh = mx * roll.sin() * pitch.sin() + my * roll.cos() - mz * roll.sin() * pitch.cos();

        yh.atan2(xh).to_degrees()
    };

    azimuth.is_finite().then(|| normalize_degrees(azimuth))
}

/// The sample minimizing the summed angular distance to all others.
fn circular_median(values: impl Iterator<Item = f64> + Clone) -> Option<f64> {
    values
        .clone()
        .map(|candidate| {
            let cost: f64 = values
                .clone()
                .map(|other| angular_distance(candidate, other))
                .sum();
            (candidate, cost)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(candidate, _)| candidate)
}
