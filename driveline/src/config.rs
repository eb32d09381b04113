//! INI configuration file.
//!
//! Every key is optional; anything missing falls back to the built-in
//! default. Values that are present but unparseable are errors rather than
//! silently ignored.
//!
//! # Example Configuration (INI)
//!
//! ```ini
//! [heading]
//! alpha = 0.25
//! flat_threshold = 0.9
//! history_size = 8
//! platform = android
//! prefilter = none
//!
//! [position]
//! max_age_ms = 1000
//! timeout_secs = 20
//! distance_filter_m = 1
//!
//! [routing]
//! base_url = https://router.project-osrm.org
//! timeout_secs = 15
//! scan_slack_m = 50
//! advance_threshold_m = 10
//!
//! [viewport]
//! default_zoom = 17
//! jitter_threshold_m = 5
//! recenter_duration_ms = 250
//! grace_period_ms = 2000
//! marker_offset_deg = 0
//! frame_interval_ms = 16
//! fit_padding_px = 50
//!
//! [logging]
//! level = info
//! directory = /var/log/driveline
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::heading::{HeadingConfig, HeadingPrefilter};
use crate::platform::DevicePlatform;
use crate::position::PositionStreamConfig;
use crate::routing::{RouteEngineConfig, OSRM_PUBLIC_URL};
use crate::session::SessionConfig;
use crate::viewport::ViewportConfig;

/// Default routing request timeout in seconds.
pub const DEFAULT_ROUTING_TIMEOUT_SECS: u64 = 15;

/// Errors loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to write config file {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("Invalid value '{value}' for {section}.{key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("Could not determine the user config directory")]
    NoConfigDir,
}

/// Directory holding `config.ini`.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("driveline"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Default config file location.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.ini"))
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Rolling log file directory. Console only when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// `[routing]` service settings not covered by [`RouteEngineConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub engine: RouteEngineConfig,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            base_url: OSRM_PUBLIC_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_ROUTING_TIMEOUT_SECS),
            engine: RouteEngineConfig::default(),
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default)]
pub struct DrivelineConfig {
    pub heading: HeadingConfig,
    pub position: PositionStreamConfig,
    pub routing: RoutingSettings,
    pub viewport: ViewportConfig,
    pub logging: LoggingSettings,
}

/// Every key `get`/`set` understand, as `section.key`.
pub const CONFIG_KEYS: &[&str] = &[
    "heading.alpha",
    "heading.flat_threshold",
    "heading.history_size",
    "heading.platform",
    "heading.prefilter",
    "position.max_age_ms",
    "position.timeout_secs",
    "position.distance_filter_m",
    "routing.base_url",
    "routing.timeout_secs",
    "routing.scan_slack_m",
    "routing.advance_threshold_m",
    "viewport.default_zoom",
    "viewport.jitter_threshold_m",
    "viewport.recenter_duration_ms",
    "viewport.grace_period_ms",
    "viewport.marker_offset_deg",
    "viewport.frame_interval_ms",
    "viewport.fit_padding_px",
    "logging.level",
    "logging.directory",
];

impl DrivelineConfig {
    /// Load from the default location, or defaults when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Write to the default location, creating the directory if needed.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |message: String| ConfigError::Write {
            path: path.to_path_buf(),
            message,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|e| write_err(e.to_string()))
    }

    /// Build from parsed INI, applying defaults for missing keys.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let reader = SectionReader { ini };

        let heading = HeadingConfig {
            alpha: reader.get("heading", "alpha", defaults.heading.alpha)?,
            flat_threshold: reader.get(
                "heading",
                "flat_threshold",
                defaults.heading.flat_threshold,
            )?,
            history_size: reader.get("heading", "history_size", defaults.heading.history_size)?,
            platform: reader.get("heading", "platform", defaults.heading.platform)?,
            prefilter: reader.get("heading", "prefilter", defaults.heading.prefilter)?,
        };
        if !(heading.alpha > 0.0 && heading.alpha <= 1.0) {
            return Err(invalid("heading", "alpha", heading.alpha, "must be in (0, 1]"));
        }
        if heading.history_size == 0 {
            return Err(invalid("heading", "history_size", 0, "must be at least 1"));
        }

        let position = PositionStreamConfig {
            max_age: Duration::from_millis(reader.get(
                "position",
                "max_age_ms",
                defaults.position.max_age.as_millis() as u64,
            )?),
            timeout: Duration::from_secs(reader.get(
                "position",
                "timeout_secs",
                defaults.position.timeout.as_secs(),
            )?),
            distance_filter_m: reader.get(
                "position",
                "distance_filter_m",
                defaults.position.distance_filter_m,
            )?,
        };
        if position.timeout.is_zero() {
            return Err(invalid("position", "timeout_secs", 0, "must be positive"));
        }

        let routing = RoutingSettings {
            base_url: reader.get("routing", "base_url", defaults.routing.base_url.clone())?,
            timeout: Duration::from_secs(reader.get(
                "routing",
                "timeout_secs",
                defaults.routing.timeout.as_secs(),
            )?),
            engine: RouteEngineConfig {
                scan_slack_m: reader.get(
                    "routing",
                    "scan_slack_m",
                    defaults.routing.engine.scan_slack_m,
                )?,
                advance_threshold_m: reader.get(
                    "routing",
                    "advance_threshold_m",
                    defaults.routing.engine.advance_threshold_m,
                )?,
            },
        };

        let viewport = ViewportConfig {
            default_zoom: reader.get("viewport", "default_zoom", defaults.viewport.default_zoom)?,
            jitter_threshold_m: reader.get(
                "viewport",
                "jitter_threshold_m",
                defaults.viewport.jitter_threshold_m,
            )?,
            recenter_duration: Duration::from_millis(reader.get(
                "viewport",
                "recenter_duration_ms",
                defaults.viewport.recenter_duration.as_millis() as u64,
            )?),
            grace_period: Duration::from_millis(reader.get(
                "viewport",
                "grace_period_ms",
                defaults.viewport.grace_period.as_millis() as u64,
            )?),
            marker_offset_deg: reader.get(
                "viewport",
                "marker_offset_deg",
                defaults.viewport.marker_offset_deg,
            )?,
            frame_interval: Duration::from_millis(reader.get(
                "viewport",
                "frame_interval_ms",
                defaults.viewport.frame_interval.as_millis() as u64,
            )?),
            fit_padding_px: reader.get(
                "viewport",
                "fit_padding_px",
                defaults.viewport.fit_padding_px,
            )?,
        };
        if viewport.frame_interval.is_zero() {
            return Err(invalid("viewport", "frame_interval_ms", 0, "must be positive"));
        }

        let logging = LoggingSettings {
            level: reader.get("logging", "level", defaults.logging.level)?,
            directory: reader
                .raw("logging", "directory")
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
        };

        Ok(Self {
            heading,
            position,
            routing,
            viewport,
            logging,
        })
    }

    /// Serialize every setting, defaults included.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("heading"))
            .set("alpha", self.heading.alpha.to_string())
            .set("flat_threshold", self.heading.flat_threshold.to_string())
            .set("history_size", self.heading.history_size.to_string())
            .set("platform", self.heading.platform.to_string())
            .set("prefilter", self.heading.prefilter.to_string());

        ini.with_section(Some("position"))
            .set("max_age_ms", self.position.max_age.as_millis().to_string())
            .set("timeout_secs", self.position.timeout.as_secs().to_string())
            .set(
                "distance_filter_m",
                self.position.distance_filter_m.to_string(),
            );

        ini.with_section(Some("routing"))
            .set("base_url", self.routing.base_url.clone())
            .set("timeout_secs", self.routing.timeout.as_secs().to_string())
            .set("scan_slack_m", self.routing.engine.scan_slack_m.to_string())
            .set(
                "advance_threshold_m",
                self.routing.engine.advance_threshold_m.to_string(),
            );

        ini.with_section(Some("viewport"))
            .set("default_zoom", self.viewport.default_zoom.to_string())
            .set(
                "jitter_threshold_m",
                self.viewport.jitter_threshold_m.to_string(),
            )
            .set(
                "recenter_duration_ms",
                self.viewport.recenter_duration.as_millis().to_string(),
            )
            .set(
                "grace_period_ms",
                self.viewport.grace_period.as_millis().to_string(),
            )
            .set(
                "marker_offset_deg",
                self.viewport.marker_offset_deg.to_string(),
            )
            .set(
                "frame_interval_ms",
                self.viewport.frame_interval.as_millis().to_string(),
            )
            .set("fit_padding_px", self.viewport.fit_padding_px.to_string());

        let directory = self
            .logging
            .directory
            .as_ref()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default();
        ini.with_section(Some("logging"))
            .set("level", self.logging.level.clone())
            .set("directory", directory);

        ini
    }

    /// Current value of `section.key` as it would be written.
    pub fn get(&self, key: &str) -> Result<String, ConfigError> {
        let (section, name) = split_key(key)?;
        Ok(self
            .to_ini()
            .get_from(Some(section), name)
            .unwrap_or_default()
            .to_string())
    }

    /// Set `section.key`, validating the result.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let (section, name) = split_key(key)?;
        let mut ini = self.to_ini();
        ini.set_to(Some(section), name.to_string(), value.to_string());
        *self = Self::from_ini(&ini)?;
        Ok(())
    }

    /// Component configuration for a tracking session.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            heading: self.heading.clone(),
            position: self.position.clone(),
            routing: self.routing.engine.clone(),
            viewport: self.viewport.clone(),
        }
    }
}

fn split_key(key: &str) -> Result<(&str, &str), ConfigError> {
    if !CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey(key.to_string()));
    }
    key.split_once('.')
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
}

fn invalid(section: &str, key: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

struct SectionReader<'a> {
    ini: &'a Ini,
}

impl SectionReader<'_> {
    fn raw(&self, section: &str, key: &str) -> Option<String> {
        self.ini
            .get_from(Some(section), key)
            .map(|value| value.trim().to_string())
    }

    fn get<T>(&self, section: &str, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.raw(section, key) {
            None => Ok(default),
            Some(value) if value.is_empty() => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|e: T::Err| invalid(section, key, &value, &e.to_string())),
        }
    }
}
