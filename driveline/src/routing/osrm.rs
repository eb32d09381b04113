//! OSRM routing service client.
//!
//! Queries the OSRM `route` endpoint for a driving route with alternatives
//! and full GeoJSON geometry:
//!
//! ```text
//! GET {base}/route/v1/driving/{lon1},{lat1};{lon2},{lat2}
//!     ?overview=full&geometries=geojson&alternatives=true
//! ```
//!
//! Coordinates come back as `[lon, lat]` pairs and are flipped into
//! [`GeoPoint`]s. At most [`MAX_ROUTES`] routes are kept.

use serde::Deserialize;
use tracing::debug;

use super::http::AsyncHttpClient;
use super::service::{BoxFuture, RoutingService};
use super::types::{RouteError, RouteGeometry};
use crate::geo::GeoPoint;

/// Public OSRM demo server.
pub const OSRM_PUBLIC_URL: &str = "https://router.project-osrm.org";

/// Primary plus one alternative.
pub const MAX_ROUTES: usize = 2;

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: Option<String>,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: Option<OsrmGeometry>,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Option<Vec<Vec<f64>>>,
}

/// Parse an OSRM `route` response body.
///
/// # Errors
///
/// - `RouteError::Malformed` when the body is not JSON of the expected shape,
///   a route lacks coordinates, or a coordinate is not a `[lon, lat]` pair
/// - `RouteError::Service` when `code` is present and not `"Ok"`
/// - `RouteError::NoRoute` when the route list is empty
pub fn parse_osrm_response(body: &[u8]) -> Result<Vec<RouteGeometry>, RouteError> {
    let response: OsrmResponse =
        serde_json::from_slice(body).map_err(|e| RouteError::Malformed(e.to_string()))?;

    if let Some(code) = response.code {
        if code != "Ok" {
            return Err(RouteError::Service {
                message: response.message.unwrap_or_default(),
                code,
            });
        }
    }

    if response.routes.is_empty() {
        return Err(RouteError::NoRoute);
    }

    response
        .routes
        .into_iter()
        .take(MAX_ROUTES)
        .enumerate()
        .map(|(i, route)| {
            let raw = route
                .geometry
                .and_then(|g| g.coordinates)
                .ok_or_else(|| RouteError::Malformed(format!("route {} has no coordinates", i)))?;

            let coordinates = raw
                .iter()
                .map(|pair| match pair.as_slice() {
                    [lon, lat, ..] => Ok(GeoPoint::from_lon_lat([*lon, *lat])),
                    _ => Err(RouteError::Malformed(format!(
                        "route {} has a coordinate with {} components",
                        i,
                        pair.len()
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;

            Ok(RouteGeometry::new(coordinates, route.distance, route.duration))
        })
        .collect()
}

/// Routing service backed by an OSRM server.
pub struct OsrmRouter<C: AsyncHttpClient> {
    client: C,
    base_url: String,
}

impl<C: AsyncHttpClient> OsrmRouter<C> {
    /// Creates a router for `base_url` (no trailing `/route/...` path).
    pub fn new(client: C, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the request URL for a driving route.
    pub fn route_url(&self, origin: &GeoPoint, destination: &GeoPoint) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson&alternatives=true",
            self.base_url,
            origin.longitude,
            origin.latitude,
            destination.longitude,
            destination.latitude
        )
    }
}

impl<C: AsyncHttpClient> RoutingService for OsrmRouter<C> {
    fn route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> BoxFuture<'_, Result<Vec<RouteGeometry>, RouteError>> {
        Box::pin(async move {
            let url = self.route_url(&origin, &destination);
            debug!(url = %url, "Requesting route");
            let body = self.client.get(&url).await?;
            let routes = parse_osrm_response(&body)?;
            debug!(routes = routes.len(), "Route response parsed");
            Ok(routes)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::MockHttpClient;

    const TWO_ROUTES: &str = r#"{
        "code": "Ok",
        "routes": [
            {"geometry": {"coordinates": [[0.0, 0.0], [0.005, 0.0], [0.01, 0.0]], "type": "LineString"},
             "distance": 1113.2, "duration": 95.4},
            {"geometry": {"coordinates": [[0.0, 0.0], [0.01, 0.0]], "type": "LineString"},
             "distance": 1400.0, "duration": 130.0},
            {"geometry": {"coordinates": [[0.0, 0.0], [0.02, 0.0]], "type": "LineString"},
             "distance": 2000.0, "duration": 200.0}
        ],
        "waypoints": []
    }"#;

    #[test]
    fn test_parse_flips_lon_lat_and_caps_routes() {
        let routes = parse_osrm_response(TWO_ROUTES.as_bytes()).unwrap();

        assert_eq!(routes.len(), MAX_ROUTES);
        assert_eq!(routes[0].coordinates.len(), 3);
        assert_eq!(routes[0].coordinates[1], GeoPoint::new(0.0, 0.005));
        assert_eq!(routes[0].distance_m, 1113.2);
        assert_eq!(routes[1].duration_s, 130.0);
    }

    #[test]
    fn test_parse_error_code() {
        let body = br#"{"code": "NoRoute", "message": "Impossible route between points", "routes": []}"#;

        assert_eq!(
            parse_osrm_response(body),
            Err(RouteError::Service {
                code: "NoRoute".to_string(),
                message: "Impossible route between points".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_empty_routes() {
        assert_eq!(
            parse_osrm_response(br#"{"code": "Ok", "routes": []}"#),
            Err(RouteError::NoRoute)
        );
        assert_eq!(parse_osrm_response(br#"{}"#), Err(RouteError::NoRoute));
    }

    #[test]
    fn test_parse_missing_coordinates() {
        let body = br#"{"code": "Ok", "routes": [{"geometry": {}, "distance": 1.0, "duration": 1.0}]}"#;
        assert!(matches!(
            parse_osrm_response(body),
            Err(RouteError::Malformed(_))
        ));

        let body = br#"{"routes": [{"distance": 1.0}]}"#;
        assert!(matches!(
            parse_osrm_response(body),
            Err(RouteError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_short_coordinate_pair() {
        let body = br#"{"routes": [{"geometry": {"coordinates": [[1.0]]}}]}"#;
        assert!(matches!(
            parse_osrm_response(body),
            Err(RouteError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_not_json() {
        assert!(matches!(
            parse_osrm_response(b"<html>502</html>"),
            Err(RouteError::Malformed(_))
        ));
    }

    #[test]
    fn test_route_url() {
        let router = OsrmRouter::new(MockHttpClient::ok("{}"), "http://localhost:5000/");
        let url = router.route_url(&GeoPoint::new(-23.5, -46.6), &GeoPoint::new(-23.6, -46.7));

        assert_eq!(
            url,
            "http://localhost:5000/route/v1/driving/-46.6,-23.5;-46.7,-23.6\
             ?overview=full&geometries=geojson&alternatives=true"
        );
    }

    #[tokio::test]
    async fn test_router_fetches_and_parses() {
        let router = OsrmRouter::new(MockHttpClient::ok(TWO_ROUTES), OSRM_PUBLIC_URL);

        let routes = router
            .route(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.01))
            .await
            .unwrap();

        assert_eq!(routes.len(), 2);
        let requested = router.client.last_url().unwrap();
        assert!(requested.starts_with("https://router.project-osrm.org/route/v1/driving/0,0;0.01,0"));
    }

    #[tokio::test]
    async fn test_router_propagates_http_errors() {
        let router = OsrmRouter::new(
            MockHttpClient::err(RouteError::Status {
                status: 429,
                url: "x".to_string(),
            }),
            OSRM_PUBLIC_URL,
        );

        let result = router
            .route(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.01))
            .await;
        assert!(matches!(result, Err(RouteError::Status { status: 429, .. })));
    }
}
