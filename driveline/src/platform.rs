//! Host device platform.
//!
//! The platform decides two things: the magnetometer axis convention used by
//! the heading estimator, and which deep-link scheme external navigation apps
//! understand.

use serde::{Deserialize, Serialize};

/// Mobile platform family the core is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePlatform {
    /// Azimuth must be mirrored: `(360 - azimuth) mod 360`.
    Android,
    Ios,
    #[default]
    Other,
}

impl DevicePlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            DevicePlatform::Android => "android",
            DevicePlatform::Ios => "ios",
            DevicePlatform::Other => "other",
        }
    }

    /// Apply this platform's sensor axis convention to a raw azimuth.
    pub fn correct_azimuth(&self, azimuth: f64) -> f64 {
        match self {
            DevicePlatform::Android => crate::heading::normalize_degrees(360.0 - azimuth),
            DevicePlatform::Ios | DevicePlatform::Other => azimuth,
        }
    }
}

impl std::fmt::Display for DevicePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DevicePlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "android" => Ok(DevicePlatform::Android),
            "ios" => Ok(DevicePlatform::Ios),
            "other" | "" => Ok(DevicePlatform::Other),
            other => Err(format!("unknown platform '{}'", other)),
        }
    }
}
