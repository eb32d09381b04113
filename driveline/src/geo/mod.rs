//! Geographic primitives shared by every navigation component.
//!
//! All distances in the crate go through [`haversine_m`]. Route progress,
//! recenter jitter checks and the position distance filter must agree on what
//! "10 meters" means, so there is exactly one distance formula and one Earth
//! radius.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Create a point from a GeoJSON `[lon, lat]` pair.
    pub fn from_lon_lat(pair: [f64; 2]) -> Self {
        Self::new(pair[1], pair[0])
    }

    /// The `[lat, lon]` pair used by renderer commands.
    pub fn to_lat_lon(self) -> [f64; 2] {
        [self.latitude, self.longitude]
    }

    /// Whether the coordinate is finite and inside the valid lat/lon ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance to `other` in meters.
    #[inline]
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_m(self, other)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

impl std::str::FromStr for GeoPoint {
    type Err = String;

    /// Parse `"lat,lon"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| format!("expected LAT,LON but got '{}'", s))?;
        let latitude: f64 = lat
            .trim()
            .parse()
            .map_err(|_| format!("invalid latitude '{}'", lat.trim()))?;
        let longitude: f64 = lon
            .trim()
            .parse()
            .map_err(|_| format!("invalid longitude '{}'", lon.trim()))?;

        let point = GeoPoint::new(latitude, longitude);
        if !point.is_valid() {
            return Err(format!("coordinate out of range: {}", s));
        }
        Ok(point)
    }
}

/// Haversine great-circle distance in meters.
pub fn haversine_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();

    let h = (d_lat * 0.5).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon * 0.5).sin().powi(2);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    /// Southernmost latitude.
    pub south: f64,
    /// Westernmost longitude.
    pub west: f64,
    /// Northernmost latitude.
    pub north: f64,
    /// Easternmost longitude.
    pub east: f64,
}

impl GeoBounds {
    /// Create a bounding box from a single point.
    pub fn from_point(point: GeoPoint) -> Self {
        Self {
            south: point.latitude,
            west: point.longitude,
            north: point.latitude,
            east: point.longitude,
        }
    }

    /// Bounding box of a set of points, or `None` when empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a GeoPoint>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self::from_point(*first);
        for point in iter {
            bounds.expand(point);
        }
        Some(bounds)
    }

    /// Expand this bounding box to include a point.
    pub fn expand(&mut self, point: &GeoPoint) {
        self.south = self.south.min(point.latitude);
        self.north = self.north.max(point.latitude);
        self.west = self.west.min(point.longitude);
        self.east = self.east.max(point.longitude);
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(mut self, other: &GeoBounds) -> Self {
        self.south = self.south.min(other.south);
        self.north = self.north.max(other.north);
        self.west = self.west.min(other.west);
        self.east = self.east.max(other.east);
        self
    }
}
