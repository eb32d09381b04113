//! Route data types and errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::{GeoBounds, GeoPoint};

/// Where the user asked to go. Fixed for the lifetime of a route set.
pub type Destination = GeoPoint;

/// Errors from route requests and route state operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The routing service answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The response body could not be understood.
    #[error("Malformed routing response: {0}")]
    Malformed(String),

    /// The routing service reported an error code.
    #[error("Routing service error {code}: {message}")]
    Service { code: String, message: String },

    /// The service returned an empty route list.
    #[error("No route found")]
    NoRoute,

    /// A newer request was issued before this one completed.
    #[error("Route request {seq} superseded by request {latest}")]
    Superseded { seq: u64, latest: u64 },

    /// Operation needs an active route.
    #[error("No active route")]
    NoActiveRoute,

    /// Switching requested but the active route has no alternative.
    #[error("Active route has no alternative")]
    NoAlternative,
}

/// An immutable route returned by the routing service.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteGeometry {
    /// Path vertices, start to end.
    pub coordinates: Vec<GeoPoint>,
    /// Total length in meters.
    pub distance_m: f64,
    /// Expected travel time in seconds.
    pub duration_s: f64,
}

impl RouteGeometry {
    pub fn new(coordinates: Vec<GeoPoint>, distance_m: f64, duration_s: f64) -> Self {
        Self {
            coordinates,
            distance_m,
            duration_s,
        }
    }

    /// Host-facing distance/duration strings.
    pub fn summary(&self) -> RouteSummary {
        RouteSummary::new(self.distance_m, self.duration_s)
    }

    /// Bounding box of the path, `None` for an empty path.
    pub fn bounds(&self) -> Option<GeoBounds> {
        GeoBounds::from_points(&self.coordinates)
    }

    /// `[lat, lon]` pairs for the renderer.
    pub fn lat_lon_pairs(&self) -> Vec<[f64; 2]> {
        self.coordinates.iter().map(|p| p.to_lat_lon()).collect()
    }
}

/// Distance and duration formatted the way the host displays them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSummary {
    /// e.g. `"12.34 km"`.
    pub distance: String,
    /// e.g. `"17 min"`.
    pub duration: String,
}

impl RouteSummary {
    pub fn new(distance_m: f64, duration_s: f64) -> Self {
        Self {
            distance: format!("{:.2} km", distance_m / 1000.0),
            duration: format!("{} min", (duration_s / 60.0).round() as i64),
        }
    }
}

/// Route metadata handed to the host after a successful request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub main: RouteSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative: Option<RouteSummary>,
    pub destination: Destination,
}
