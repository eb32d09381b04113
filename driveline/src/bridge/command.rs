//! Outbound traffic: renderer commands and host notifications.

use serde::{Deserialize, Serialize};

use super::BridgeError;
use crate::geo::{GeoBounds, GeoPoint};
use crate::routing::{ClearReason, RouteGeometry, RouteInfo};

/// Command sent to the rendering surface.
///
/// Serialized as a JSON object tagged by `command`:
///
/// ```text
/// {"command":"updateState","lat":-23.5,"lon":-46.6,"heading":87.2,"isFollowing":true,"accuracy":6.0}
/// {"command":"clearRoute"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RendererCommand {
    /// Move the vehicle marker and report follow mode.
    UpdateState {
        lat: f64,
        lon: f64,
        /// `null` until a heading is known.
        heading: Option<f64>,
        is_following: bool,
        accuracy: f64,
    },

    /// Remove every route layer and the destination marker.
    ClearRoute,

    /// Move the camera. `zoom` absent keeps the current zoom.
    SetView {
        lat: f64,
        lon: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        zoom: Option<f64>,
        animate: bool,
        duration_ms: u64,
    },

    /// Draw the active route, the tappable alternative and the destination.
    /// Coordinates are `[lat, lon]` pairs.
    ShowRoute {
        primary: Vec<[f64; 2]>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alternative: Option<Vec<[f64; 2]>>,
        destination: [f64; 2],
    },

    /// Replace the drawn active route with its unconsumed suffix.
    TrimRoute { remaining: Vec<[f64; 2]> },

    /// Fit the camera to a bounding box.
    FitBounds {
        south: f64,
        west: f64,
        north: f64,
        east: f64,
        padding_px: u32,
    },

    /// Rotate the vehicle marker icon (degrees clockwise from north).
    RotateMarker { degrees: f64 },
}

impl RendererCommand {
    /// Command name as seen on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            RendererCommand::UpdateState { .. } => "updateState",
            RendererCommand::ClearRoute => "clearRoute",
            RendererCommand::SetView { .. } => "setView",
            RendererCommand::ShowRoute { .. } => "showRoute",
            RendererCommand::TrimRoute { .. } => "trimRoute",
            RendererCommand::FitBounds { .. } => "fitBounds",
            RendererCommand::RotateMarker { .. } => "rotateMarker",
        }
    }

    /// `showRoute` for a primary/alternative pair.
    pub fn show_route(
        primary: &[GeoPoint],
        alternative: Option<&RouteGeometry>,
        destination: GeoPoint,
    ) -> Self {
        RendererCommand::ShowRoute {
            primary: primary.iter().map(|p| p.to_lat_lon()).collect(),
            alternative: alternative.map(RouteGeometry::lat_lon_pairs),
            destination: destination.to_lat_lon(),
        }
    }

    pub fn trim_route(remaining: &[GeoPoint]) -> Self {
        RendererCommand::TrimRoute {
            remaining: remaining.iter().map(|p| p.to_lat_lon()).collect(),
        }
    }

    pub fn fit_bounds(bounds: &GeoBounds, padding_px: u32) -> Self {
        RendererCommand::FitBounds {
            south: bounds.south,
            west: bounds.west,
            north: bounds.north,
            east: bounds.east,
            padding_px,
        }
    }

    /// Encode as a wire frame.
    pub fn to_json(&self) -> Result<String, BridgeError> {
        serde_json::to_string(self).map_err(|e| BridgeError::Encode(e.to_string()))
    }
}

/// Notification for the host UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// A route set was installed (ETA display, hand-off buttons).
    RouteReady { info: RouteInfo },
    RouteCleared { reason: ClearKind },
    RouteSwitched { active_index: u8 },
    /// A route request failed; the previous route, if any, is unchanged.
    RouteFailed { message: String },
    /// Follow mode flipped. `false` means the host may offer "recenter".
    FollowChanged { is_following: bool },
    PositionError { message: String, fatal: bool },
}

/// Serializable mirror of [`ClearReason`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearKind {
    UserRequested,
    Completed,
    /// The renderer reported the route gone.
    Renderer,
}

impl From<ClearReason> for ClearKind {
    fn from(reason: ClearReason) -> Self {
        match reason {
            ClearReason::UserRequested => ClearKind::UserRequested,
            ClearReason::Completed => ClearKind::Completed,
        }
    }
}
