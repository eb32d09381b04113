//! Route state machine.
//!
//! Owns the live [`RouteSet`] and decides when progress advances, when the
//! route completes, and which request is allowed to install a route.

use tracing::{debug, info, warn};

use super::service::RoutingService;
use super::types::{Destination, RouteError, RouteGeometry, RouteInfo};
use crate::geo::{haversine_m, GeoBounds, GeoPoint};

/// Closest-point scan stops at the first point worse than `best + slack`.
pub const DEFAULT_SCAN_SLACK_M: f64 = 50.0;

/// Progress advances only once the vehicle is farther than this from the
/// current progress point.
pub const DEFAULT_ADVANCE_THRESHOLD_M: f64 = 10.0;

/// Tunables for progress tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteEngineConfig {
    pub scan_slack_m: f64,
    pub advance_threshold_m: f64,
}

impl Default for RouteEngineConfig {
    fn default() -> Self {
        Self {
            scan_slack_m: DEFAULT_SCAN_SLACK_M,
            advance_threshold_m: DEFAULT_ADVANCE_THRESHOLD_M,
        }
    }
}

/// Engine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePhase {
    /// No route and no request in flight.
    Idle,
    /// A request is in flight and no route is active.
    Requested,
    /// Following the route the service ranked first.
    Active,
    /// Following the alternative.
    Switched,
}

impl RoutePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutePhase::Idle => "idle",
            RoutePhase::Requested => "requested",
            RoutePhase::Active => "active",
            RoutePhase::Switched => "switched",
        }
    }
}

impl std::fmt::Display for RoutePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a route went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    UserRequested,
    /// Progress reached the end of the path.
    Completed,
}

/// State changes the rest of the session reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteEvent {
    /// A fresh route set was installed.
    Ready(RouteInfo),
    /// Progress moved forward; the path before `progress_index` is consumed.
    Advanced { progress_index: usize },
    /// Primary and alternative were swapped.
    Switched { active_index: u8 },
    Cleared(ClearReason),
}

/// Handle for one issued route request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteTicket {
    pub seq: u64,
    pub origin: GeoPoint,
    pub destination: Destination,
}

/// The live routing state.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSet {
    pub primary: RouteGeometry,
    pub alternative: Option<RouteGeometry>,
    /// Index into `primary.coordinates` of the most recently passed point.
    pub progress_index: usize,
    /// 0 while on the first-ranked route, 1 after a switch.
    pub active_index: u8,
    pub destination: Destination,
}

impl RouteSet {
    /// The part of the primary path not yet passed.
    pub fn remaining(&self) -> &[GeoPoint] {
        let start = self.progress_index.min(self.primary.coordinates.len());
        &self.primary.coordinates[start..]
    }

    /// Host metadata for this set.
    pub fn info(&self) -> RouteInfo {
        RouteInfo {
            main: self.primary.summary(),
            alternative: self.alternative.as_ref().map(RouteGeometry::summary),
            destination: self.destination,
        }
    }

    /// Bounds covering both geometries.
    pub fn bounds(&self) -> Option<GeoBounds> {
        let primary = self.primary.bounds();
        let alternative = self.alternative.as_ref().and_then(RouteGeometry::bounds);
        match (primary, alternative) {
            (Some(p), Some(a)) => Some(p.union(&a)),
            (p, a) => p.or(a),
        }
    }
}

/// Forward-bounded closest-point search.
///
/// Scans `coords` from `start`, tracking the nearest point to `position`, and
/// stops at the first point farther than `best + slack_m`. Returns `start`
/// when the slice is empty or `start` is out of range.
pub fn closest_forward_index(
    coords: &[GeoPoint],
    start: usize,
    position: &GeoPoint,
    slack_m: f64,
) -> usize {
    let mut best = f64::INFINITY;
    let mut closest = start;

    for (i, point) in coords.iter().enumerate().skip(start) {
        let dist = haversine_m(position, point);
        if dist < best {
            best = dist;
            closest = i;
        }
        if dist > best + slack_m {
            break;
        }
    }

    closest
}

/// Route request sequencing, progress tracking, switching and clearing.
#[derive(Debug)]
pub struct RouteEngine {
    config: RouteEngineConfig,
    route: Option<RouteSet>,
    /// Last issued request sequence number.
    latest_seq: u64,
    /// Sequence number of the request still awaiting a response.
    pending: Option<u64>,
}

impl Default for RouteEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl RouteEngine {
    pub fn new(config: RouteEngineConfig) -> Self {
        Self {
            config,
            route: None,
            latest_seq: 0,
            pending: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RouteEngineConfig::default())
    }

    pub fn config(&self) -> &RouteEngineConfig {
        &self.config
    }

    pub fn phase(&self) -> RoutePhase {
        match (&self.route, self.pending) {
            (Some(set), _) if set.active_index == 1 => RoutePhase::Switched,
            (Some(_), _) => RoutePhase::Active,
            (None, Some(_)) => RoutePhase::Requested,
            (None, None) => RoutePhase::Idle,
        }
    }

    /// The active route set, if any.
    pub fn route(&self) -> Option<&RouteSet> {
        self.route.as_ref()
    }

    /// Whether a request is awaiting its response.
    pub fn is_request_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Issue a new request ticket. Any earlier pending request becomes stale.
    pub fn begin_request(&mut self, origin: GeoPoint, destination: Destination) -> RouteTicket {
        self.latest_seq += 1;
        if let Some(stale) = self.pending.replace(self.latest_seq) {
            debug!(
                superseded = stale,
                seq = self.latest_seq,
                "Route request superseded"
            );
        }
        info!(
            seq = self.latest_seq,
            origin = %origin,
            destination = %destination,
            "Route requested"
        );
        RouteTicket {
            seq: self.latest_seq,
            origin,
            destination,
        }
    }

    /// Apply the outcome of the request identified by `ticket`.
    ///
    /// Stale responses (not the latest issued, or invalidated by `clear`) are
    /// discarded with `Ok(None)`. Failures leave any active route untouched.
    pub fn complete_request(
        &mut self,
        ticket: &RouteTicket,
        outcome: Result<Vec<RouteGeometry>, RouteError>,
    ) -> Result<Option<RouteEvent>, RouteError> {
        if self.pending != Some(ticket.seq) {
            debug!(
                seq = ticket.seq,
                latest = self.latest_seq,
                "Discarding stale route response"
            );
            return Ok(None);
        }
        self.pending = None;

        let mut routes = match outcome {
            Ok(routes) => routes.into_iter(),
            Err(e) => {
                warn!(seq = ticket.seq, error = %e, "Route request failed");
                return Err(e);
            }
        };

        let primary = routes.next().ok_or(RouteError::NoRoute)?;
        if primary.coordinates.len() < 2 {
            warn!(
                seq = ticket.seq,
                points = primary.coordinates.len(),
                "Route has too few coordinates"
            );
            return Err(RouteError::Malformed(format!(
                "route has {} coordinates, need at least 2",
                primary.coordinates.len()
            )));
        }
        let alternative = routes.next().filter(|alt| alt.coordinates.len() >= 2);

        let set = RouteSet {
            primary,
            alternative,
            progress_index: 0,
            active_index: 0,
            destination: ticket.destination,
        };
        let info = set.info();

        info!(
            seq = ticket.seq,
            distance = %info.main.distance,
            duration = %info.main.duration,
            has_alternative = set.alternative.is_some(),
            "Route ready"
        );

        self.route = Some(set);
        Ok(Some(RouteEvent::Ready(info)))
    }

    /// Request a route and apply the response in one call.
    ///
    /// A request superseded while awaiting is reported as
    /// `RouteError::Superseded`.
    pub async fn request_route<S>(
        &mut self,
        service: &S,
        origin: GeoPoint,
        destination: Destination,
    ) -> Result<RouteEvent, RouteError>
    where
        S: RoutingService + ?Sized,
    {
        let ticket = self.begin_request(origin, destination);
        let outcome = service.route(origin, destination).await;
        let latest = self.latest_seq;
        self.complete_request(&ticket, outcome)?
            .ok_or(RouteError::Superseded {
                seq: ticket.seq,
                latest,
            })
    }

    /// Advance progress for a new position. Returns `Advanced` when the
    /// consumed prefix grew, or `Cleared(Completed)` when fewer than two
    /// points remain.
    pub fn on_position_update(&mut self, position: &GeoPoint) -> Option<RouteEvent> {
        let set = self.route.as_mut()?;
        let coords = &set.primary.coordinates;
        let current = set.progress_index;
        let anchor = coords.get(current)?;

        let closest = closest_forward_index(coords, current, position, self.config.scan_slack_m);
        let from_anchor = haversine_m(position, anchor);

        if from_anchor <= self.config.advance_threshold_m || closest <= current {
            return None;
        }

        set.progress_index = closest;
        let remaining = coords.len() - closest;
        debug!(
            progress_index = closest,
            remaining, "Route progress advanced"
        );

        if remaining < 2 {
            info!("Route completed");
            self.route = None;
            return Some(RouteEvent::Cleared(ClearReason::Completed));
        }

        Some(RouteEvent::Advanced {
            progress_index: closest,
        })
    }

    /// Swap primary and alternative, restarting progress on the new primary.
    pub fn switch_to_alternative(&mut self) -> Result<RouteEvent, RouteError> {
        let set = self.route.as_mut().ok_or(RouteError::NoActiveRoute)?;
        let alternative = set.alternative.take().ok_or(RouteError::NoAlternative)?;

        let previous = std::mem::replace(&mut set.primary, alternative);
        set.alternative = Some(previous);
        set.progress_index = 0;
        set.active_index ^= 1;

        info!(active_index = set.active_index, "Switched route");
        Ok(RouteEvent::Switched {
            active_index: set.active_index,
        })
    }

    /// Drop all route state and invalidate any pending request.
    ///
    /// Returns `None` when there was nothing to clear.
    pub fn clear(&mut self) -> Option<RouteEvent> {
        let had_pending = self.pending.take().is_some();
        let had_route = self.route.take().is_some();

        if !(had_route || had_pending) {
            return None;
        }
        info!(had_route, had_pending, "Route cleared");
        Some(RouteEvent::Cleared(ClearReason::UserRequested))
    }
}
