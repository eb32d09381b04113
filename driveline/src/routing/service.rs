//! Routing service abstraction.

use std::future::Future;
use std::pin::Pin;

use super::types::{RouteError, RouteGeometry};
use crate::geo::GeoPoint;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A provider of driving routes between two points.
///
/// Implementations return the primary route first, followed by at most one
/// alternative. The trait is dyn-compatible so sessions can hold an
/// `Arc<dyn RoutingService>`.
pub trait RoutingService: Send + Sync {
    /// Fetch routes from `origin` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns `RouteError` for transport failures, bad status codes and
    /// responses without a usable route. Implementations never retry.
    fn route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> BoxFuture<'_, Result<Vec<RouteGeometry>, RouteError>>;
}

/// Serves a fixed set of routes regardless of the endpoints.
///
/// Used for trace replay and tests where no routing service is reachable.
#[derive(Debug, Clone)]
pub struct StaticRouter {
    routes: Result<Vec<RouteGeometry>, RouteError>,
}

impl StaticRouter {
    pub fn new(routes: Vec<RouteGeometry>) -> Self {
        Self { routes: Ok(routes) }
    }

    /// A router whose every request fails with `error`.
    pub fn failing(error: RouteError) -> Self {
        Self { routes: Err(error) }
    }
}

impl RoutingService for StaticRouter {
    fn route(
        &self,
        _origin: GeoPoint,
        _destination: GeoPoint,
    ) -> BoxFuture<'_, Result<Vec<RouteGeometry>, RouteError>> {
        let routes = self.routes.clone();
        Box::pin(async move { routes })
    }
}
