//! Driving routes: fetching, progress tracking, switching and clearing.
//!
//! # State Machine
//!
//! ```text
//! Idle --[begin_request]--> Requested --[complete_request ok]--> Active
//! Active --[switch_to_alternative]--> Switched --[switch_to_alternative]--> Active
//! Active|Switched --[clear / progress reaches end]--> Idle
//! ```
//!
//! A failed request never touches the route that is already active. Requests
//! carry a sequence number and only the latest one may install a route, so a
//! slow response can't overwrite a fresher one.
//!
//! # Example
//!
//! ```ignore
//! use driveline::routing::{OsrmRouter, ReqwestClient, RouteEngine};
//!
//! let router = OsrmRouter::new(ReqwestClient::new()?, OSRM_PUBLIC_URL);
//! let mut engine = RouteEngine::with_defaults();
//!
//! let event = engine.request_route(&router, origin, destination).await?;
//! if let Some(update) = engine.on_position_update(&fix.point()) {
//!     // trim the drawn route
//! }
//! ```

mod engine;
pub mod handoff;
mod http;
mod osrm;
mod service;
mod types;

pub use engine::{
    closest_forward_index, ClearReason, RouteEngine, RouteEngineConfig, RouteEvent, RoutePhase,
    RouteSet, RouteTicket, DEFAULT_ADVANCE_THRESHOLD_M, DEFAULT_SCAN_SLACK_M,
};
pub use http::{AsyncHttpClient, ReqwestClient};
pub use osrm::{parse_osrm_response, OsrmRouter, MAX_ROUTES, OSRM_PUBLIC_URL};
pub use service::{BoxFuture, RoutingService, StaticRouter};
pub use types::{Destination, RouteError, RouteGeometry, RouteInfo, RouteSummary};

#[cfg(test)]
pub use http::tests::MockHttpClient;
