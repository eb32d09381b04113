//! Camera and marker control.
//!
//! Decides when the renderer's view should move and how the vehicle marker
//! rotates. The controller never draws anything itself; every decision comes
//! out as [`RendererCommand`]s.
//!
//! # Follow Logic
//!
//! ```text
//! renderer ready ──► first fix ──► snap (zoom 17, no animation)
//!                        │
//!                        ▼
//!   later fix: following && !dragging && moved > 5 m ──► animated recenter
//!
//!   drag start  (after grace) ──► following = false, dragging = true
//!   zoom start  (after grace) ──► following = false
//!   drag end                  ──► dragging = false
//!   recenter()                ──► following = true, animated recenter
//! ```
//!
//! Gesture events inside the grace window after the renderer became ready are
//! ignored: they come from the renderer positioning itself, not from the user.

mod marker;

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::bridge::RendererCommand;
use crate::geo::{GeoBounds, GeoPoint};
use crate::heading::normalize_degrees;
use crate::position::GeoPosition;

pub use marker::{MarkerRotation, DEFAULT_STEP_FRACTION, SNAP_EPSILON_DEG};

/// Zoom used for the initial snap.
pub const DEFAULT_ZOOM: f64 = 17.0;

/// View center movement below this is treated as GPS jitter.
pub const DEFAULT_JITTER_THRESHOLD_M: f64 = 5.0;

pub const DEFAULT_RECENTER_DURATION: Duration = Duration::from_millis(250);

/// Gestures this soon after renderer readiness are ignored.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Marker animation cadence.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

pub const DEFAULT_FIT_PADDING_PX: u32 = 50;

/// Viewport tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportConfig {
    pub default_zoom: f64,
    pub jitter_threshold_m: f64,
    pub recenter_duration: Duration,
    pub grace_period: Duration,
    /// Added to every heading before it becomes a marker rotation target.
    /// Icon sets drawn pointing east need -90.
    pub marker_offset_deg: f64,
    pub frame_interval: Duration,
    pub fit_padding_px: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            default_zoom: DEFAULT_ZOOM,
            jitter_threshold_m: DEFAULT_JITTER_THRESHOLD_M,
            recenter_duration: DEFAULT_RECENTER_DURATION,
            grace_period: DEFAULT_GRACE_PERIOD,
            marker_offset_deg: 0.0,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            fit_padding_px: DEFAULT_FIT_PADDING_PX,
        }
    }
}

/// Follow and gesture state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowState {
    pub is_following: bool,
    /// True only while a drag gesture is in flight.
    pub is_dragging: bool,
    /// When the renderer became ready. `None` before the handshake.
    pub initialized_at: Option<Instant>,
}

impl Default for FollowState {
    fn default() -> Self {
        Self {
            is_following: true,
            is_dragging: false,
            initialized_at: None,
        }
    }
}

/// Camera and marker decisions for one renderer.
#[derive(Debug)]
pub struct ViewportController {
    config: ViewportConfig,
    follow: FollowState,
    ready: bool,
    /// Whether the initial snap has been issued to the current renderer.
    snapped: bool,
    /// Where the camera was last sent. Unknown after user gestures.
    view_center: Option<GeoPoint>,
    last_fix: Option<GeoPosition>,
    heading: Option<f64>,
    marker: MarkerRotation,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(ViewportConfig::default())
    }
}

impl ViewportController {
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            config,
            follow: FollowState::default(),
            ready: false,
            snapped: false,
            view_center: None,
            last_fix: None,
            heading: None,
            marker: MarkerRotation::new(),
        }
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn follow(&self) -> FollowState {
        self.follow
    }

    pub fn is_following(&self) -> bool {
        self.follow.is_following
    }

    pub fn view_center(&self) -> Option<GeoPoint> {
        self.view_center
    }

    pub fn last_fix(&self) -> Option<&GeoPosition> {
        self.last_fix.as_ref()
    }

    pub fn heading(&self) -> Option<f64> {
        self.heading
    }

    pub fn marker(&self) -> &MarkerRotation {
        &self.marker
    }

    /// The renderer completed its handshake.
    ///
    /// Starts the grace window. A fix received before readiness is snapped to
    /// right away. A repeated handshake means the renderer reloaded and lost
    /// its view, so the snap is issued again.
    pub fn renderer_ready(&mut self, now: Instant) -> Vec<RendererCommand> {
        self.ready = true;
        self.snapped = false;
        self.view_center = None;
        self.follow.initialized_at = Some(now);
        self.follow.is_dragging = false;
        self.marker.invalidate();
        info!("Renderer ready");

        match self.last_fix {
            Some(fix) => self.snap(&fix),
            None => Vec::new(),
        }
    }

    /// The renderer disconnected. Commands stop until the next handshake.
    pub fn renderer_lost(&mut self) {
        self.ready = false;
        self.snapped = false;
        self.view_center = None;
        self.follow.initialized_at = None;
        self.follow.is_dragging = false;
    }

    /// New smoothed heading from the estimator.
    pub fn set_heading(&mut self, heading: f64) {
        if !heading.is_finite() {
            return;
        }
        self.heading = Some(heading);
        self.marker
            .set_target(normalize_degrees(heading + self.config.marker_offset_deg));
    }

    /// New position fix.
    ///
    /// The first fix after readiness snaps unconditionally, whatever the
    /// follow state. Later fixes update the marker and recenter only when
    /// following, not dragging, and farther than the jitter threshold from
    /// the view center.
    pub fn on_position(&mut self, fix: &GeoPosition) -> Vec<RendererCommand> {
        self.last_fix = Some(*fix);
        if !self.ready {
            debug!("Fix held until renderer is ready");
            return Vec::new();
        }
        if !self.snapped {
            return self.snap(fix);
        }

        let mut commands = vec![self.update_state(fix)];
        if self.follow.is_following && !self.follow.is_dragging {
            let point = fix.point();
            let moved = self
                .view_center
                .map(|center| center.distance_to(&point))
                .unwrap_or(f64::INFINITY);
            if moved > self.config.jitter_threshold_m {
                commands.push(self.recenter_on(point));
            }
        }
        commands
    }

    /// Drag gesture began. Returns `true` when it counted as user input.
    pub fn on_drag_start(&mut self, now: Instant) -> bool {
        if self.in_grace(now) {
            debug!("Drag start inside grace window ignored");
            return false;
        }
        self.follow.is_following = false;
        self.follow.is_dragging = true;
        self.view_center = None;
        info!("User drag, follow mode off");
        true
    }

    /// Zoom gesture began. Returns `true` when it counted as user input.
    pub fn on_zoom_start(&mut self, now: Instant) -> bool {
        if self.in_grace(now) {
            debug!("Zoom start inside grace window ignored");
            return false;
        }
        self.follow.is_following = false;
        self.view_center = None;
        info!("User zoom, follow mode off");
        true
    }

    pub fn on_drag_end(&mut self) {
        self.follow.is_dragging = false;
    }

    /// Re-enable following and move the camera back to the vehicle.
    pub fn recenter(&mut self) -> Vec<RendererCommand> {
        self.follow.is_following = true;
        self.follow.is_dragging = false;
        info!("Follow mode on");

        match self.last_fix {
            Some(fix) if self.ready => {
                let point = fix.point();
                vec![self.update_state(&fix), self.recenter_on(point)]
            }
            _ => Vec::new(),
        }
    }

    /// A new route was drawn: show all of it and stop following so the next
    /// fix doesn't pull the camera away.
    pub fn on_route_shown(&mut self, bounds: Option<GeoBounds>) -> Vec<RendererCommand> {
        let Some(bounds) = bounds else {
            return Vec::new();
        };
        self.follow.is_following = false;
        self.view_center = None;
        vec![RendererCommand::fit_bounds(&bounds, self.config.fit_padding_px)]
    }

    /// One animation frame. Returns a rotation command when the marker moved.
    pub fn tick(&mut self) -> Option<RendererCommand> {
        if !self.ready {
            return None;
        }
        self.marker
            .step()
            .map(|degrees| RendererCommand::RotateMarker { degrees })
    }

    fn in_grace(&self, now: Instant) -> bool {
        match self.follow.initialized_at {
            Some(at) => now.saturating_duration_since(at) < self.config.grace_period,
            None => true,
        }
    }

    fn snap(&mut self, fix: &GeoPosition) -> Vec<RendererCommand> {
        let point = fix.point();
        self.snapped = true;
        self.view_center = Some(point);
        debug!(lat = point.latitude, lon = point.longitude, "Initial snap");
        vec![
            self.update_state(fix),
            RendererCommand::SetView {
                lat: point.latitude,
                lon: point.longitude,
                zoom: Some(self.config.default_zoom),
                animate: false,
                duration_ms: 0,
            },
        ]
    }

    fn recenter_on(&mut self, point: GeoPoint) -> RendererCommand {
        self.view_center = Some(point);
        RendererCommand::SetView {
            lat: point.latitude,
            lon: point.longitude,
            zoom: None,
            animate: true,
            duration_ms: self.config.recenter_duration.as_millis() as u64,
        }
    }

    fn update_state(&self, fix: &GeoPosition) -> RendererCommand {
        RendererCommand::UpdateState {
            lat: fix.latitude,
            lon: fix.longitude,
            heading: self.heading,
            is_following: self.follow.is_following,
            accuracy: fix.accuracy_m,
        }
    }
}
