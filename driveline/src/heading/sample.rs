//! Fixed-shape sensor readings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when building a [`SensorSample`] from untrusted input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    /// The payload did not contain exactly three axes.
    #[error("expected 3 axes, got {0}")]
    WrongAxisCount(usize),

    /// One of the axes was NaN or infinite.
    #[error("non-finite sensor axis: {0:?}")]
    NonFinite([f64; 3]),
}

/// A single 3-axis reading from the magnetometer or accelerometer, device frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl SensorSample {
    /// Create a new sample.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Build a sample, rejecting NaN or infinite axes.
    pub fn checked(x: f64, y: f64, z: f64) -> Result<Self, SensorError> {
        let sample = Self::new(x, y, z);
        if sample.is_finite() {
            Ok(sample)
        } else {
            Err(SensorError::NonFinite([x, y, z]))
        }
    }

    /// Whether all three axes are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Euclidean norm of the vector.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

impl TryFrom<&[f64]> for SensorSample {
    type Error = SensorError;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        match values {
            [x, y, z] => Self::checked(*x, *y, *z),
            other => Err(SensorError::WrongAxisCount(other.len())),
        }
    }
}

/// Which physical sensor produced a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Magnetic,
    Inertial,
}

/// A tagged reading as delivered by the sensor subscription.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub kind: SensorKind,
    #[serde(flatten)]
    pub sample: SensorSample,
}

impl SensorReading {
    pub fn magnetic(sample: SensorSample) -> Self {
        Self {
            kind: SensorKind::Magnetic,
            sample,
        }
    }

    pub fn inertial(sample: SensorSample) -> Self {
        Self {
            kind: SensorKind::Inertial,
            sample,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from_slice() {
        let sample = SensorSample::try_from(&[1.0, 2.0, 3.0][..]).unwrap();
        assert_eq!(sample, SensorSample::new(1.0, 2.0, 3.0));

        assert_eq!(
            SensorSample::try_from(&[1.0, 2.0][..]),
            Err(SensorError::WrongAxisCount(2))
        );
        assert_eq!(
            SensorSample::try_from(&[1.0, 2.0, 3.0, 4.0][..]),
            Err(SensorError::WrongAxisCount(4))
        );
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(SensorSample::checked(f64::NAN, 0.0, 0.0).is_err());
        assert!(SensorSample::checked(0.0, f64::INFINITY, 0.0).is_err());
        assert!(SensorSample::checked(0.0, 0.0, 9.81).is_ok());
    }

    #[test]
    fn test_magnitude() {
        assert!((SensorSample::new(3.0, 4.0, 0.0).magnitude() - 5.0).abs() < 1e-12);
        assert_eq!(SensorSample::default().magnitude(), 0.0);
    }

    #[test]
    fn test_reading_deserializes_flat() {
        let reading: SensorReading =
            serde_json::from_str(r#"{"kind":"magnetic","x":1.0,"y":2.0,"z":3.0}"#).unwrap();
        assert_eq!(reading.kind, SensorKind::Magnetic);
        assert_eq!(reading.sample, SensorSample::new(1.0, 2.0, 3.0));

        let bad = serde_json::from_str::<SensorReading>(r#"{"kind":"magnetic","x":1.0}"#);
        assert!(bad.is_err());
    }
}
