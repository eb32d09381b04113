//! Inbound renderer messages.

use serde::Deserialize;

use super::BridgeError;
use crate::geo::GeoPoint;
use crate::routing::RouteInfo;

/// Literal frame older renderers send when the user drags the map.
pub const USER_DRAGGED_MAP: &str = "USER_DRAGGED_MAP";

/// Message sent by the rendering surface.
///
/// Everything except the legacy drag literal is a JSON object tagged by
/// `type`:
///
/// ```text
/// USER_DRAGGED_MAP
/// {"type":"ROUTE_INFO","data":{"main":{...},"alternative":{...},"destination":{...}}}
/// {"type":"ROUTE_CLEARED"}
/// {"type":"ROUTE_SWITCHED","activeIndex":1}
/// {"type":"MAP_READY"}
/// {"type":"MAP_TAPPED","latitude":-23.5,"longitude":-46.6}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeMessage {
    /// Legacy gesture notification, sent for drags and zooms alike.
    #[serde(rename = "USER_DRAGGED_MAP")]
    UserDragged,
    /// Route metadata computed by the renderer.
    RouteInfo { data: RouteInfo },
    RouteCleared,
    RouteSwitched {
        #[serde(rename = "activeIndex")]
        active_index: u8,
    },
    /// The renderer finished initializing and accepts commands.
    MapReady,
    DragStart,
    DragEnd,
    ZoomStart,
    /// The user picked a destination on the map.
    MapTapped { latitude: f64, longitude: f64 },
    /// The user tapped the alternative route line.
    AlternativeTapped,
}

impl BridgeMessage {
    /// Parse one inbound frame.
    ///
    /// # Errors
    ///
    /// `BridgeError::Decode` for anything that is not the drag literal or a
    /// known, well-formed JSON message. Callers drop these without touching
    /// state.
    pub fn parse(frame: &str) -> Result<Self, BridgeError> {
        let frame = frame.trim();
        if frame == USER_DRAGGED_MAP {
            return Ok(BridgeMessage::UserDragged);
        }

        let message: BridgeMessage =
            serde_json::from_str(frame).map_err(|e| BridgeError::Decode(e.to_string()))?;

        match &message {
            BridgeMessage::RouteSwitched { active_index } if *active_index > 1 => Err(
                BridgeError::Decode(format!("activeIndex {} out of range", active_index)),
            ),
            BridgeMessage::MapTapped {
                latitude,
                longitude,
            } if !GeoPoint::new(*latitude, *longitude).is_valid() => Err(BridgeError::Decode(
                format!("tap at invalid coordinate {},{}", latitude, longitude),
            )),
            _ => Ok(message),
        }
    }

    /// Wire name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeMessage::UserDragged => "USER_DRAGGED_MAP",
            BridgeMessage::RouteInfo { .. } => "ROUTE_INFO",
            BridgeMessage::RouteCleared => "ROUTE_CLEARED",
            BridgeMessage::RouteSwitched { .. } => "ROUTE_SWITCHED",
            BridgeMessage::MapReady => "MAP_READY",
            BridgeMessage::DragStart => "DRAG_START",
            BridgeMessage::DragEnd => "DRAG_END",
            BridgeMessage::ZoomStart => "ZOOM_START",
            BridgeMessage::MapTapped { .. } => "MAP_TAPPED",
            BridgeMessage::AlternativeTapped => "ALTERNATIVE_TAPPED",
        }
    }
}
