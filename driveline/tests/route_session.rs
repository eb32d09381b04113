//! Integration tests for route following.
//!
//! These tests drive the public API end to end:
//! - Route request → progress along the route → automatic completion
//! - The same flow through a running session and the renderer bridge
//! - Late responses from superseded requests
//! - The renderer's echo of a clear arriving after a new route
//!
//! Run with: `cargo test --test route_session`

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use driveline::bridge::{ChannelTransport, ClearKind, HostEvent, RendererEnd};
use driveline::geo::GeoPoint;
use driveline::position::{GeoPosition, PositionStreamConfig};
use driveline::routing::{
    BoxFuture, ClearReason, RouteEngine, RouteError, RouteEvent, RouteGeometry, RoutingService,
};
use driveline::session::{
    session_channels, HostCommand, SessionConfig, SessionFeeds, SessionSummary, TrackingSession,
};

// ============================================================================
// Helper Functions
// ============================================================================

const ORIGIN: GeoPoint = GeoPoint::new(0.0, 0.0);
const DESTINATION: GeoPoint = GeoPoint::new(0.0, 0.01);

fn geometry(points: &[(f64, f64)], distance_m: f64, duration_s: f64) -> RouteGeometry {
    RouteGeometry::new(
        points
            .iter()
            .map(|&(lat, lon)| GeoPoint::new(lat, lon))
            .collect(),
        distance_m,
        duration_s,
    )
}

/// 3-point primary and 2-point alternative between ORIGIN and DESTINATION.
fn scenario_routes() -> Vec<RouteGeometry> {
    vec![
        geometry(&[(0.0, 0.0), (0.0, 0.005), (0.0, 0.01)], 1_112.0, 95.0),
        geometry(&[(0.0, 0.0), (0.0, 0.01)], 1_300.0, 140.0),
    ]
}

/// Routing service double that records requests and can delay per destination.
struct MockRouter {
    routes: Vec<RouteGeometry>,
    delays: Vec<(GeoPoint, Duration)>,
    calls: Mutex<Vec<(GeoPoint, GeoPoint)>>,
}

impl MockRouter {
    fn new(routes: Vec<RouteGeometry>) -> Self {
        Self {
            routes,
            delays: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_delay(mut self, destination: GeoPoint, delay: Duration) -> Self {
        self.delays.push((destination, delay));
        self
    }

    fn calls(&self) -> Vec<(GeoPoint, GeoPoint)> {
        self.calls.lock().unwrap().clone()
    }
}

impl RoutingService for MockRouter {
    fn route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> BoxFuture<'_, Result<Vec<RouteGeometry>, RouteError>> {
        self.calls.lock().unwrap().push((origin, destination));
        let delay = self
            .delays
            .iter()
            .find(|(dest, _)| *dest == destination)
            .map(|(_, delay)| *delay);
        // Tag the primary with the destination so tests can tell responses apart
        let mut routes = self.routes.clone();
        if let Some(primary) = routes.first_mut() {
            if let Some(last) = primary.coordinates.last_mut() {
                *last = destination;
            }
        }

        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(routes)
        })
    }
}

struct Running {
    feeds: SessionFeeds,
    renderer: RendererEnd,
    events: mpsc::UnboundedReceiver<HostEvent>,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<SessionSummary>,
}

fn spawn_session(router: Arc<MockRouter>) -> Running {
    let (feeds, inputs) = session_channels(PositionStreamConfig::default(), 64);
    let (transport, renderer) = ChannelTransport::pair(256);
    let (events_tx, events) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let session = TrackingSession::new(SessionConfig::default(), router).unwrap();
    let handle = tokio::spawn(session.run(inputs, transport, events_tx, cancel.clone()));

    Running {
        feeds,
        renderer,
        events,
        cancel,
        handle,
    }
}

async fn send_fix(running: &Running, point: GeoPoint) {
    running
        .feeds
        .positions
        .send(Ok(GeoPosition::new(point.latitude, point.longitude, 5.0)))
        .await
        .unwrap();
}

/// Wait for the next renderer command with the given name.
async fn expect_command(renderer: &mut RendererEnd, name: &str) -> serde_json::Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), renderer.commands.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {}", name))
            .expect("renderer channel closed");
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        if value["command"] == name {
            return value;
        }
    }
}

/// Wait for the first host event matching `pred`.
async fn expect_event(
    events: &mut mpsc::UnboundedReceiver<HostEvent>,
    pred: impl Fn(&HostEvent) -> bool,
) -> HostEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for host event")
            .expect("event channel closed");
        if pred(&event) {
            return event;
        }
    }
}

// ============================================================================
// Integration Tests
// ============================================================================

/// Request, advance past the midpoint, then complete at the destination.
#[tokio::test]
async fn test_route_progress_until_completion() {
    let router = MockRouter::new(scenario_routes());
    let mut engine = RouteEngine::with_defaults();

    let event = engine
        .request_route(&router, ORIGIN, DESTINATION)
        .await
        .unwrap();
    match event {
        RouteEvent::Ready(info) => {
            assert_eq!(info.main.distance, "1.11 km");
            assert_eq!(info.main.duration, "2 min");
            assert_eq!(info.alternative.unwrap().duration, "2 min");
            assert_eq!(info.destination, DESTINATION);
        }
        other => panic!("unexpected {:?}", other),
    }
    let set = engine.route().unwrap();
    assert_eq!(set.active_index, 0);
    assert_eq!(set.progress_index, 0);
    assert_eq!(router.calls(), vec![(ORIGIN, DESTINATION)]);

    // Pass point 0 and reach point 1
    assert_eq!(
        engine.on_position_update(&GeoPoint::new(0.0, 0.005)),
        Some(RouteEvent::Advanced { progress_index: 1 })
    );
    assert_eq!(engine.route().unwrap().remaining().len(), 2);

    // Reaching the final point leaves fewer than two coordinates
    assert_eq!(
        engine.on_position_update(&DESTINATION),
        Some(RouteEvent::Cleared(ClearReason::Completed))
    );
    assert!(engine.route().is_none());
    assert_eq!(engine.clear(), None);
}

/// The same scenario driven through a running session and the bridge.
#[tokio::test]
async fn test_session_follows_route_to_completion() {
    let router = Arc::new(MockRouter::new(scenario_routes()));
    let mut running = spawn_session(Arc::clone(&router));

    running
        .renderer
        .messages
        .send(r#"{"type":"MAP_READY"}"#.to_string())
        .await
        .unwrap();
    send_fix(&running, ORIGIN).await;
    expect_command(&mut running.renderer, "setView").await;

    running
        .feeds
        .commands
        .send(HostCommand::RequestRoute {
            destination: DESTINATION,
        })
        .await
        .unwrap();

    let shown = expect_command(&mut running.renderer, "showRoute").await;
    assert_eq!(shown["primary"].as_array().unwrap().len(), 3);
    assert_eq!(shown["destination"], serde_json::json!([0.0, 0.01]));
    expect_event(&mut running.events, |e| {
        matches!(e, HostEvent::RouteReady { .. })
    })
    .await;

    send_fix(&running, GeoPoint::new(0.0, 0.005)).await;
    let trimmed = expect_command(&mut running.renderer, "trimRoute").await;
    assert_eq!(trimmed["remaining"].as_array().unwrap().len(), 2);

    send_fix(&running, DESTINATION).await;
    expect_command(&mut running.renderer, "clearRoute").await;
    let cleared = expect_event(&mut running.events, |e| {
        matches!(e, HostEvent::RouteCleared { .. })
    })
    .await;
    assert_eq!(
        cleared,
        HostEvent::RouteCleared {
            reason: ClearKind::Completed
        }
    );

    running.cancel.cancel();
    let summary = running.handle.await.unwrap();
    assert_eq!(summary.fixes, 3);
    assert_eq!(summary.route_requests, 1);
}

/// Tapping the alternative swaps routes; the host hears about each switch.
#[tokio::test]
async fn test_session_switches_on_alternative_tap() {
    let router = Arc::new(MockRouter::new(scenario_routes()));
    let mut running = spawn_session(router);

    running
        .renderer
        .messages
        .send(r#"{"type":"MAP_READY"}"#.to_string())
        .await
        .unwrap();
    send_fix(&running, ORIGIN).await;
    expect_command(&mut running.renderer, "setView").await;

    running
        .renderer
        .messages
        .send(r#"{"type":"MAP_TAPPED","latitude":0.0,"longitude":0.01}"#.to_string())
        .await
        .unwrap();
    expect_command(&mut running.renderer, "showRoute").await;

    running
        .renderer
        .messages
        .send(r#"{"type":"ALTERNATIVE_TAPPED"}"#.to_string())
        .await
        .unwrap();
    let redrawn = expect_command(&mut running.renderer, "showRoute").await;
    assert_eq!(redrawn["primary"].as_array().unwrap().len(), 2);
    assert_eq!(
        expect_event(&mut running.events, |e| matches!(
            e,
            HostEvent::RouteSwitched { .. }
        ))
        .await,
        HostEvent::RouteSwitched { active_index: 1 }
    );

    running.feeds.commands.send(HostCommand::SwitchRoute).await.unwrap();
    assert_eq!(
        expect_event(&mut running.events, |e| matches!(
            e,
            HostEvent::RouteSwitched { .. }
        ))
        .await,
        HostEvent::RouteSwitched { active_index: 0 }
    );

    running.cancel.cancel();
    running.handle.await.unwrap();
}

/// A slow response to an earlier request must not replace a newer route.
#[tokio::test]
async fn test_stale_route_response_is_discarded() {
    let slow_destination = GeoPoint::new(0.0, 0.02);
    let router = Arc::new(
        MockRouter::new(scenario_routes()).with_delay(slow_destination, Duration::from_millis(300)),
    );
    let mut running = spawn_session(Arc::clone(&router));

    running
        .renderer
        .messages
        .send(r#"{"type":"MAP_READY"}"#.to_string())
        .await
        .unwrap();
    send_fix(&running, ORIGIN).await;
    expect_command(&mut running.renderer, "setView").await;

    for destination in [slow_destination, DESTINATION] {
        running
            .feeds
            .commands
            .send(HostCommand::RequestRoute { destination })
            .await
            .unwrap();
    }

    let ready = expect_event(&mut running.events, |e| {
        matches!(e, HostEvent::RouteReady { .. })
    })
    .await;
    match ready {
        HostEvent::RouteReady { info } => assert_eq!(info.destination, DESTINATION),
        other => panic!("unexpected {:?}", other),
    }

    // Give the slow request time to land, then make sure nothing replaced the route
    tokio::time::sleep(Duration::from_millis(500)).await;
    running.cancel.cancel();
    let summary = running.handle.await.unwrap();
    assert_eq!(summary.route_requests, 2);
    assert_eq!(router.calls().len(), 2);

    while let Ok(event) = running.events.try_recv() {
        assert!(
            !matches!(event, HostEvent::RouteReady { .. }),
            "stale response installed a route"
        );
    }
}

/// The renderer echoes every clearRoute with ROUTE_CLEARED. An echo that
/// lands after the next route was drawn must not remove that route.
#[tokio::test]
async fn test_clear_echo_does_not_remove_new_route() {
    let next_destination = GeoPoint::new(0.0, 0.02);
    let router = Arc::new(MockRouter::new(scenario_routes()));
    let mut running = spawn_session(router);

    running
        .renderer
        .messages
        .send(r#"{"type":"MAP_READY"}"#.to_string())
        .await
        .unwrap();
    send_fix(&running, ORIGIN).await;
    expect_command(&mut running.renderer, "setView").await;

    running
        .feeds
        .commands
        .send(HostCommand::RequestRoute {
            destination: DESTINATION,
        })
        .await
        .unwrap();
    expect_command(&mut running.renderer, "showRoute").await;

    running.feeds.commands.send(HostCommand::ClearRoute).await.unwrap();
    expect_command(&mut running.renderer, "clearRoute").await;
    assert_eq!(
        expect_event(&mut running.events, |e| matches!(
            e,
            HostEvent::RouteCleared { .. }
        ))
        .await,
        HostEvent::RouteCleared {
            reason: ClearKind::UserRequested
        }
    );

    running
        .feeds
        .commands
        .send(HostCommand::RequestRoute {
            destination: next_destination,
        })
        .await
        .unwrap();
    let shown = expect_command(&mut running.renderer, "showRoute").await;
    assert_eq!(shown["destination"], serde_json::json!([0.0, 0.02]));

    // The late echo of the first clear
    running
        .renderer
        .messages
        .send(r#"{"type":"ROUTE_CLEARED"}"#.to_string())
        .await
        .unwrap();

    // Frames are handled in order, so a switch redraw proves the route
    // outlived the echo
    running
        .renderer
        .messages
        .send(r#"{"type":"ALTERNATIVE_TAPPED"}"#.to_string())
        .await
        .unwrap();
    let redrawn = expect_command(&mut running.renderer, "showRoute").await;
    assert_eq!(redrawn["primary"].as_array().unwrap().len(), 2);
    assert_eq!(
        expect_event(&mut running.events, |e| matches!(
            e,
            HostEvent::RouteSwitched { .. }
        ))
        .await,
        HostEvent::RouteSwitched { active_index: 1 }
    );

    running.cancel.cancel();
    running.handle.await.unwrap();

    while let Ok(frame) = running.renderer.commands.try_recv() {
        assert!(!frame.contains("clearRoute"), "route cleared by echo: {}", frame);
    }
    while let Ok(event) = running.events.try_recv() {
        assert!(
            !matches!(
                event,
                HostEvent::RouteCleared {
                    reason: ClearKind::Renderer
                }
            ),
            "echo reported as renderer clear"
        );
    }
}

/// Closing every input ends the session and releases the subscriptions.
#[tokio::test]
async fn test_session_releases_inputs_on_exit() {
    let router = Arc::new(MockRouter::new(scenario_routes()));
    let running = spawn_session(router);
    let feeds = running.feeds.clone();

    running.cancel.cancel();
    running.handle.await.unwrap();

    assert!(feeds.positions.is_closed());
    assert!(feeds.sensors.is_closed());
    assert!(feeds.commands.is_closed());
}
