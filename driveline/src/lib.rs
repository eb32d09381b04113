//! Driveline - navigation core for vehicle tracking
//!
//! This library fuses accelerometer and magnetometer readings into a stable
//! compass heading, follows a live position stream along a driving route,
//! and drives an embedded map renderer over an asynchronous, lossy message
//! bridge.
//!
//! # Modules
//!
//! - [`heading`]: raw azimuth, platform correction and circular smoothing
//! - [`position`]: filtered position fixes with timeout and fatal errors
//! - [`routing`]: OSRM routes, progress tracking, switching and hand-off links
//! - [`viewport`]: follow/drag state, camera moves and marker rotation
//! - [`bridge`]: renderer protocol, readiness gate and transports
//! - [`session`]: the event loop tying everything together

pub mod bridge;
pub mod config;
pub mod geo;
pub mod heading;
pub mod logging;
pub mod platform;
pub mod position;
pub mod routing;
pub mod session;
pub mod viewport;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
