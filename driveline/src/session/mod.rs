//! Tracking session: the single event loop that drives everything.
//!
//! One task owns all navigation state (heading, route, viewport) and reacts
//! to its inputs one at a time, so no state is shared or locked:
//!
//! ```text
//!   sensors ───────┐
//!   position fixes ┤                         ┌──► renderer commands
//!   renderer frames┼──► TrackingSession::run ┤
//!   host commands ─┤        (select!)        └──► host events
//!   route results ─┤
//!   frame ticks ───┘
//! ```
//!
//! Route requests run as spawned tasks and report back over a channel tagged
//! with their request sequence, so a slow response can never overwrite a
//! newer route. When the session ends every input is closed, releasing the
//! sensor and location subscriptions, and in-flight requests are aborted.
//!
//! # Example
//!
//! ```ignore
//! let (feeds, inputs) = session_channels(PositionStreamConfig::default(), 64);
//! let (transport, renderer) = ChannelTransport::pair(64);
//! let (events_tx, mut events) = mpsc::unbounded_channel();
//!
//! let session = TrackingSession::new(SessionConfig::default(), router)?;
//! let summary = session.run(inputs, transport, events_tx, cancel).await;
//! ```

pub mod trace;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::{
    BridgeError, BridgeMessage, BridgeTransport, ClearKind, HostEvent, RendererCommand,
    RendererLink, WebSocketBridge,
};
use crate::geo::GeoPoint;
use crate::heading::{HeadingConfig, HeadingEstimator, SensorReading};
use crate::position::{PositionEvent, PositionSender, PositionStream, PositionStreamConfig};
use crate::routing::{
    OsrmRouter, ReqwestClient, RouteEngine, RouteEngineConfig, RouteError, RouteEvent,
    RouteGeometry, RouteTicket, RoutingService,
};
use crate::viewport::{ViewportConfig, ViewportController};

/// Route task result: the ticket it was issued for and the outcome.
type RouteResponse = (RouteTicket, Result<Vec<RouteGeometry>, RouteError>);

/// Errors setting up or attaching a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Routing setup failed: {0}")]
    Routing(#[from] RouteError),

    #[error("Renderer bridge failed: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),

    /// Cancelled before a renderer connected.
    #[error("Session cancelled")]
    Cancelled,
}

/// Commands from the host UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum HostCommand {
    /// The "recenter" affordance: follow the vehicle again.
    Recenter,
    ClearRoute,
    RequestRoute { destination: GeoPoint },
    SwitchRoute,
}

/// Configuration for every component of a session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub heading: HeadingConfig,
    pub position: PositionStreamConfig,
    pub routing: RouteEngineConfig,
    pub viewport: ViewportConfig,
}

/// Receiving ends consumed by [`TrackingSession::run`].
#[derive(Debug)]
pub struct SessionInputs {
    pub sensors: mpsc::Receiver<SensorReading>,
    pub positions: PositionStream,
    pub commands: mpsc::Receiver<HostCommand>,
}

/// Sending ends held by sensor drivers, the location service and the host.
#[derive(Debug, Clone)]
pub struct SessionFeeds {
    pub sensors: mpsc::Sender<SensorReading>,
    pub positions: PositionSender,
    pub commands: mpsc::Sender<HostCommand>,
}

/// Create connected feeds and inputs.
pub fn session_channels(
    position: PositionStreamConfig,
    capacity: usize,
) -> (SessionFeeds, SessionInputs) {
    let capacity = capacity.max(1);
    let (sensor_tx, sensor_rx) = mpsc::channel(capacity);
    let (command_tx, command_rx) = mpsc::channel(capacity);
    let (position_tx, positions) = PositionStream::channel(position, capacity);

    (
        SessionFeeds {
            sensors: sensor_tx,
            positions: position_tx,
            commands: command_tx,
        },
        SessionInputs {
            sensors: sensor_rx,
            positions,
            commands: command_rx,
        },
    )
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub sensor_samples: u64,
    pub fixes: u64,
    pub route_requests: u64,
    pub commands_sent: u64,
    pub commands_dropped: u64,
    /// Renderer frames that did not parse.
    pub frames_discarded: u64,
}

/// A navigation session, ready to run.
pub struct TrackingSession {
    config: SessionConfig,
    router: Arc<dyn RoutingService>,
}

impl TrackingSession {
    /// Fails when the viewport frame interval is zero.
    pub fn new(
        config: SessionConfig,
        router: Arc<dyn RoutingService>,
    ) -> Result<Self, SessionError> {
        if config.viewport.frame_interval.is_zero() {
            return Err(SessionError::InvalidConfig(
                "viewport frame interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self { config, router })
    }

    /// Session routed through an OSRM server.
    pub fn with_osrm(
        config: SessionConfig,
        base_url: &str,
        timeout: std::time::Duration,
    ) -> Result<Self, SessionError> {
        let client = ReqwestClient::with_timeout(timeout)?;
        Self::new(config, Arc::new(OsrmRouter::new(client, base_url)))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run until `cancel` fires or every input is exhausted.
    ///
    /// Inputs count as exhausted when sensors, positions and host commands
    /// have all closed and no route request is pending. A renderer
    /// disconnect alone does not end the session.
    pub async fn run<T: BridgeTransport>(
        self,
        inputs: SessionInputs,
        transport: T,
        events: mpsc::UnboundedSender<HostEvent>,
        cancel: CancellationToken,
    ) -> SessionSummary {
        let SessionInputs {
            mut sensors,
            mut positions,
            mut commands,
        } = inputs;
        let (route_tx, mut route_rx) = mpsc::channel::<RouteResponse>(8);

        let mut frames = tokio::time::interval(self.config.viewport.frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut core = SessionCore {
            heading: HeadingEstimator::new(self.config.heading.clone()),
            engine: RouteEngine::new(self.config.routing.clone()),
            viewport: ViewportController::new(self.config.viewport.clone()),
            link: RendererLink::new(transport),
            router: self.router,
            route_tx,
            tasks: Vec::new(),
            events,
            follow_reported: true,
            awaiting_clear_ack: false,
            summary: SessionSummary::default(),
        };

        let mut sensors_open = true;
        let mut commands_open = true;
        let mut renderer_open = true;

        info!("Tracking session started");

        loop {
            if !sensors_open
                && !commands_open
                && positions.is_finished()
                && !core.engine.is_request_pending()
            {
                info!("All session inputs closed");
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Tracking session cancelled");
                    break;
                }

                reading = sensors.recv(), if sensors_open => match reading {
                    Some(reading) => core.on_sensor(reading),
                    None => {
                        debug!("Sensor feed closed");
                        sensors_open = false;
                    }
                },

                event = positions.next_event(), if !positions.is_finished() => {
                    if let Some(event) = event {
                        core.on_position_event(event);
                    }
                }

                frame = core.link.recv(), if renderer_open => match frame {
                    Some(frame) => core.on_renderer_frame(&frame, Instant::now()),
                    None => {
                        warn!("Renderer disconnected");
                        renderer_open = false;
                        core.link.mark_lost();
                        core.viewport.renderer_lost();
                    }
                },

                command = commands.recv(), if commands_open => match command {
                    Some(command) => core.on_host_command(command),
                    None => {
                        debug!("Host command feed closed");
                        commands_open = false;
                    }
                },

                Some((ticket, outcome)) = route_rx.recv() => {
                    core.on_route_response(ticket, outcome);
                }

                _ = frames.tick() => core.on_frame(),
            }

            core.report_follow_change();
        }

        // Release subscriptions and abandon in-flight requests
        sensors.close();
        positions.close();
        commands.close();
        for task in core.tasks.drain(..) {
            task.abort();
        }

        let mut summary = core.summary;
        summary.commands_sent = core.link.sent();
        summary.commands_dropped = core.link.dropped();

        info!(
            fixes = summary.fixes,
            route_requests = summary.route_requests,
            commands_sent = summary.commands_sent,
            commands_dropped = summary.commands_dropped,
            "Tracking session ended"
        );
        summary
    }

    /// Wait for a renderer on `bridge`, then run with it.
    pub async fn run_websocket(
        self,
        inputs: SessionInputs,
        bridge: &WebSocketBridge,
        capacity: usize,
        events: mpsc::UnboundedSender<HostEvent>,
        cancel: CancellationToken,
    ) -> Result<SessionSummary, SessionError> {
        let transport = tokio::select! {
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            accepted = bridge.accept(capacity) => accepted?,
        };
        Ok(self.run(inputs, transport, events, cancel).await)
    }
}

/// State owned by the running loop.
struct SessionCore<T> {
    heading: HeadingEstimator,
    engine: RouteEngine,
    viewport: ViewportController,
    link: RendererLink<T>,
    router: Arc<dyn RoutingService>,
    route_tx: mpsc::Sender<RouteResponse>,
    tasks: Vec<JoinHandle<()>>,
    events: mpsc::UnboundedSender<HostEvent>,
    /// Follow flag last reported to the host.
    follow_reported: bool,
    /// A clearRoute went out and the renderer's ROUTE_CLEARED echo is due.
    awaiting_clear_ack: bool,
    summary: SessionSummary,
}

impl<T: BridgeTransport> SessionCore<T> {
    fn emit(&self, event: HostEvent) {
        if self.events.send(event).is_err() {
            debug!("Host event receiver gone");
        }
    }

    fn on_sensor(&mut self, reading: SensorReading) {
        self.summary.sensor_samples += 1;
        if let Some(heading) = self.heading.ingest(reading) {
            self.viewport.set_heading(heading);
        }
    }

    fn on_position_event(&mut self, event: PositionEvent) {
        match event {
            PositionEvent::Fix(fix) => {
                self.summary.fixes += 1;
                if let Some(route_event) = self.engine.on_position_update(&fix.point()) {
                    self.apply_route_event(route_event);
                }
                let commands = self.viewport.on_position(&fix);
                self.link.send_all(commands);
            }
            PositionEvent::Error(error) => {
                self.emit(HostEvent::PositionError {
                    message: error.to_string(),
                    fatal: error.is_fatal(),
                });
            }
        }
    }

    fn on_renderer_frame(&mut self, frame: &str, now: Instant) {
        let message = match BridgeMessage::parse(frame) {
            Ok(message) => message,
            Err(e) => {
                self.summary.frames_discarded += 1;
                debug!(error = %e, "Discarding renderer frame");
                return;
            }
        };
        debug!(kind = message.kind(), "Renderer message");

        match message {
            BridgeMessage::MapReady => {
                self.link.mark_ready();
                self.awaiting_clear_ack = false;
                let commands = self.viewport.renderer_ready(now);
                self.link.send_all(commands);
                // Redraw a route that outlived the previous renderer
                if let Some(set) = self.engine.route() {
                    self.link.send(&RendererCommand::show_route(
                        set.remaining(),
                        set.alternative.as_ref(),
                        set.destination,
                    ));
                }
            }
            BridgeMessage::DragStart => {
                self.viewport.on_drag_start(now);
            }
            BridgeMessage::DragEnd => self.viewport.on_drag_end(),
            // Legacy renderers send the literal for zooms too and never
            // follow it with a drag end
            BridgeMessage::UserDragged | BridgeMessage::ZoomStart => {
                self.viewport.on_zoom_start(now);
            }
            BridgeMessage::MapTapped {
                latitude,
                longitude,
            } => self.request_route(GeoPoint::new(latitude, longitude)),
            BridgeMessage::AlternativeTapped => self.switch_route(),
            BridgeMessage::RouteSwitched { active_index } => {
                let current = self.engine.route().map(|set| set.active_index);
                if current.is_some() && current != Some(active_index) {
                    self.switch_route();
                }
            }
            BridgeMessage::RouteCleared => {
                if self.awaiting_clear_ack {
                    self.awaiting_clear_ack = false;
                    debug!("Renderer acknowledged route clear");
                    return;
                }
                if self.engine.clear().is_some() {
                    self.emit(HostEvent::RouteCleared {
                        reason: ClearKind::Renderer,
                    });
                }
            }
            // The core reports RouteReady itself when it installs a route
            BridgeMessage::RouteInfo { data } => {
                debug!(destination = %data.destination, "Renderer route info");
            }
        }
    }

    fn on_host_command(&mut self, command: HostCommand) {
        debug!(?command, "Host command");
        match command {
            HostCommand::Recenter => {
                let commands = self.viewport.recenter();
                self.link.send_all(commands);
            }
            HostCommand::ClearRoute => {
                if let Some(event) = self.engine.clear() {
                    self.apply_route_event(event);
                }
            }
            HostCommand::RequestRoute { destination } => self.request_route(destination),
            HostCommand::SwitchRoute => self.switch_route(),
        }
    }

    fn on_route_response(
        &mut self,
        ticket: RouteTicket,
        outcome: Result<Vec<RouteGeometry>, RouteError>,
    ) {
        match self.engine.complete_request(&ticket, outcome) {
            Ok(Some(event)) => self.apply_route_event(event),
            Ok(None) => {}
            Err(e) => self.emit(HostEvent::RouteFailed {
                message: e.to_string(),
            }),
        }
    }

    fn on_frame(&mut self) {
        if let Some(command) = self.viewport.tick() {
            self.link.send(&command);
        }
    }

    fn request_route(&mut self, destination: GeoPoint) {
        let Some(origin) = self.viewport.last_fix().map(|fix| fix.point()) else {
            warn!(%destination, "Route requested before first position fix");
            self.emit(HostEvent::RouteFailed {
                message: "No position fix yet".to_string(),
            });
            return;
        };

        let ticket = self.engine.begin_request(origin, destination);
        self.summary.route_requests += 1;

        let router = Arc::clone(&self.router);
        let tx = self.route_tx.clone();
        self.tasks.retain(|task| !task.is_finished());
        self.tasks.push(tokio::spawn(async move {
            let outcome = router.route(ticket.origin, ticket.destination).await;
            let _ = tx.send((ticket, outcome)).await;
        }));
    }

    fn switch_route(&mut self) {
        match self.engine.switch_to_alternative() {
            Ok(event) => self.apply_route_event(event),
            Err(e) => debug!(error = %e, "Route switch ignored"),
        }
    }

    fn apply_route_event(&mut self, event: RouteEvent) {
        match event {
            RouteEvent::Ready(info) => {
                if let Some(set) = self.engine.route() {
                    self.link.send(&RendererCommand::show_route(
                        &set.primary.coordinates,
                        set.alternative.as_ref(),
                        set.destination,
                    ));
                    let commands = self.viewport.on_route_shown(set.bounds());
                    self.link.send_all(commands);
                }
                self.emit(HostEvent::RouteReady { info });
            }
            RouteEvent::Advanced { .. } => {
                if let Some(set) = self.engine.route() {
                    self.link.send(&RendererCommand::trim_route(set.remaining()));
                }
            }
            RouteEvent::Switched { active_index } => {
                if let Some(set) = self.engine.route() {
                    self.link.send(&RendererCommand::show_route(
                        set.remaining(),
                        set.alternative.as_ref(),
                        set.destination,
                    ));
                }
                self.emit(HostEvent::RouteSwitched { active_index });
            }
            RouteEvent::Cleared(reason) => {
                if self.link.send(&RendererCommand::ClearRoute) {
                    self.awaiting_clear_ack = true;
                }
                self.emit(HostEvent::RouteCleared {
                    reason: reason.into(),
                });
            }
        }
    }

    fn report_follow_change(&mut self) {
        let following = self.viewport.is_following();
        if following != self.follow_reported {
            self.follow_reported = following;
            self.emit(HostEvent::FollowChanged {
                is_following: following,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{ChannelTransport, RendererEnd};
    use crate::position::{GeoPosition, PositionError};
    use crate::routing::StaticRouter;
    use std::time::Duration;

    struct Harness {
        feeds: SessionFeeds,
        renderer: RendererEnd,
        events: mpsc::UnboundedReceiver<HostEvent>,
        cancel: CancellationToken,
        handle: JoinHandle<SessionSummary>,
    }

    fn start(router: StaticRouter) -> Harness {
        let (feeds, inputs) = session_channels(PositionStreamConfig::default(), 32);
        let (transport, renderer) = ChannelTransport::pair(256);
        let (events_tx, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let session = TrackingSession::new(SessionConfig::default(), Arc::new(router)).unwrap();
        let handle = tokio::spawn(session.run(inputs, transport, events_tx, cancel.clone()));

        Harness {
            feeds,
            renderer,
            events,
            cancel,
            handle,
        }
    }

    fn route(points: &[(f64, f64)]) -> RouteGeometry {
        RouteGeometry::new(
            points.iter().map(|&(lat, lon)| GeoPoint::new(lat, lon)).collect(),
            1_112.0,
            90.0,
        )
    }

    async fn next_command(renderer: &mut RendererEnd, name: &str) -> serde_json::Value {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), renderer.commands.recv())
                .await
                .expect("timed out waiting for command")
                .expect("renderer channel closed");
            let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
            if value["command"] == name {
                return value;
            }
        }
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<HostEvent>) -> HostEvent {
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for host event")
            .expect("event channel closed")
    }

    async fn send_frame(harness: &Harness, frame: &str) {
        harness.renderer.messages.send(frame.to_string()).await.unwrap();
    }

    /// A loop-less core for stepping renderer frames with chosen timestamps.
    fn stepped_core(
        router: StaticRouter,
    ) -> (
        SessionCore<ChannelTransport>,
        RendererEnd,
        mpsc::UnboundedReceiver<HostEvent>,
    ) {
        let (transport, renderer) = ChannelTransport::pair(64);
        let (events_tx, events) = mpsc::unbounded_channel();
        let (route_tx, _route_rx) = mpsc::channel(1);
        let config = SessionConfig::default();
        let core = SessionCore {
            heading: HeadingEstimator::new(config.heading),
            engine: RouteEngine::new(config.routing),
            viewport: ViewportController::new(config.viewport),
            link: RendererLink::new(transport),
            router: Arc::new(router),
            route_tx,
            tasks: Vec::new(),
            events: events_tx,
            follow_reported: true,
            awaiting_clear_ack: false,
            summary: SessionSummary::default(),
        };
        (core, renderer, events)
    }

    fn drain_commands(renderer: &mut RendererEnd) -> Vec<String> {
        let mut names = Vec::new();
        while let Ok(frame) = renderer.commands.try_recv() {
            let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
            names.push(value["command"].as_str().unwrap_or_default().to_string());
        }
        names
    }

    #[test]
    fn test_zero_frame_interval_rejected() {
        let mut config = SessionConfig::default();
        config.viewport.frame_interval = Duration::ZERO;

        let result = TrackingSession::new(config, Arc::new(StaticRouter::new(vec![])));
        assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_legacy_drag_literal_acts_as_zoom() {
        let (mut core, _renderer, _events) = stepped_core(StaticRouter::new(vec![]));
        let start = Instant::now();
        let after_grace = start + core.viewport.config().grace_period + Duration::from_millis(1);

        core.on_renderer_frame(r#"{"type":"MAP_READY"}"#, start);
        core.on_renderer_frame("USER_DRAGGED_MAP", after_grace);

        // Follow stops, but nothing is left waiting for a drag end that never comes
        let follow = core.viewport.follow();
        assert!(!follow.is_following);
        assert!(!follow.is_dragging);

        core.on_renderer_frame(r#"{"type":"DRAG_START"}"#, after_grace);
        assert!(core.viewport.follow().is_dragging);
    }

    #[tokio::test]
    async fn test_renderer_route_info_is_not_forwarded() {
        let (mut core, _renderer, mut events) = stepped_core(StaticRouter::new(vec![]));

        core.on_renderer_frame(
            r#"{"type":"ROUTE_INFO","data":{
                "main":{"distance":"2.50 km","duration":"5 min"},
                "alternative":null,
                "destination":{"latitude":-23.5,"longitude":-46.6}}}"#,
            Instant::now(),
        );

        assert_eq!(core.summary.frames_discarded, 0);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_clear_echo_consumed_once() {
        let (mut core, mut renderer, mut events) = stepped_core(StaticRouter::new(vec![]));
        core.on_renderer_frame(r#"{"type":"MAP_READY"}"#, Instant::now());

        let ticket = core
            .engine
            .begin_request(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.01));
        core.on_route_response(
            ticket,
            Ok(vec![route(&[(0.0, 0.0), (0.0, 0.005), (0.0, 0.01)])]),
        );
        core.on_host_command(HostCommand::ClearRoute);
        assert!(core.awaiting_clear_ack);
        assert!(drain_commands(&mut renderer).contains(&"clearRoute".to_string()));
        while events.try_recv().is_ok() {}

        // Echo of our own clear
        core.on_renderer_frame(r#"{"type":"ROUTE_CLEARED"}"#, Instant::now());
        assert!(!core.awaiting_clear_ack);
        assert!(events.try_recv().is_err());

        // A new route, then a clear the user made on the map
        let ticket = core
            .engine
            .begin_request(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.01));
        core.on_route_response(
            ticket,
            Ok(vec![route(&[(0.0, 0.0), (0.0, 0.005), (0.0, 0.01)])]),
        );
        while events.try_recv().is_ok() {}
        core.on_renderer_frame(r#"{"type":"ROUTE_CLEARED"}"#, Instant::now());
        assert!(core.engine.route().is_none());
        assert_eq!(
            events.try_recv().unwrap(),
            HostEvent::RouteCleared {
                reason: ClearKind::Renderer
            }
        );
    }

    #[tokio::test]
    async fn test_commands_wait_for_readiness() {
        let mut h = start(StaticRouter::new(vec![]));

        h.feeds
            .positions
            .send(Ok(GeoPosition::new(1.0, 2.0, 5.0)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.renderer.commands.try_recv().is_err());

        send_frame(&h, r#"{"type":"MAP_READY"}"#).await;
        let view = next_command(&mut h.renderer, "setView").await;
        assert_eq!(view["animate"], false);
        assert_eq!(view["zoom"], 17.0);

        h.cancel.cancel();
        let summary = h.handle.await.unwrap();
        assert_eq!(summary.fixes, 1);
        assert!(summary.commands_sent >= 2);
    }

    #[tokio::test]
    async fn test_route_request_from_map_tap() {
        let mut h = start(StaticRouter::new(vec![
            route(&[(0.0, 0.0), (0.0, 0.005), (0.0, 0.01)]),
            route(&[(0.0, 0.0), (0.0, 0.01)]),
        ]));

        send_frame(&h, r#"{"type":"MAP_READY"}"#).await;
        h.feeds
            .positions
            .send(Ok(GeoPosition::new(0.0, 0.0, 5.0)))
            .await
            .unwrap();
        next_command(&mut h.renderer, "setView").await;

        send_frame(&h, r#"{"type":"MAP_TAPPED","latitude":0.0,"longitude":0.01}"#).await;

        let shown = next_command(&mut h.renderer, "showRoute").await;
        assert_eq!(shown["primary"].as_array().unwrap().len(), 3);
        assert_eq!(shown["alternative"].as_array().unwrap().len(), 2);
        next_command(&mut h.renderer, "fitBounds").await;

        match next_event(&mut h.events).await {
            HostEvent::RouteReady { info } => {
                assert_eq!(info.destination, GeoPoint::new(0.0, 0.01));
                assert!(info.alternative.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
        // Fitting the route stops follow mode
        assert_eq!(
            next_event(&mut h.events).await,
            HostEvent::FollowChanged { is_following: false }
        );

        h.cancel.cancel();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_route_request_without_fix_fails() {
        let mut h = start(StaticRouter::new(vec![]));

        h.feeds
            .commands
            .send(HostCommand::RequestRoute {
                destination: GeoPoint::new(0.0, 0.01),
            })
            .await
            .unwrap();

        assert!(matches!(
            next_event(&mut h.events).await,
            HostEvent::RouteFailed { .. }
        ));
        h.cancel.cancel();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_frames_are_counted_and_ignored() {
        let h = start(StaticRouter::new(vec![]));

        send_frame(&h, "not json").await;
        send_frame(&h, r#"{"type":"SOMETHING_NEW"}"#).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        h.cancel.cancel();
        let summary = h.handle.await.unwrap();
        assert_eq!(summary.frames_discarded, 2);
    }

    #[tokio::test]
    async fn test_fatal_position_error_reported() {
        let mut h = start(StaticRouter::new(vec![]));

        h.feeds
            .positions
            .send(Err(PositionError::PermissionDenied))
            .await
            .unwrap();

        match next_event(&mut h.events).await {
            HostEvent::PositionError { fatal, .. } => assert!(fatal),
            other => panic!("unexpected {:?}", other),
        }
        h.cancel.cancel();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_session_ends_when_inputs_close() {
        let h = start(StaticRouter::new(vec![]));

        drop(h.feeds);
        let summary = tokio::time::timeout(Duration::from_secs(5), h.handle)
            .await
            .expect("session did not finish")
            .unwrap();
        assert_eq!(summary, SessionSummary::default());
    }

    #[tokio::test]
    async fn test_run_websocket_cancelled_while_waiting() {
        let bridge = WebSocketBridge::bind("127.0.0.1:0").await.unwrap();
        let (_feeds, inputs) = session_channels(PositionStreamConfig::default(), 4);
        let (events_tx, _events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let session =
            TrackingSession::new(SessionConfig::default(), Arc::new(StaticRouter::new(vec![])))
                .unwrap();
        let result = session
            .run_websocket(inputs, &bridge, 8, events_tx, cancel)
            .await;
        assert!(matches!(result, Err(SessionError::Cancelled)));
    }

    #[tokio::test]
    async fn test_run_websocket_serves_renderer() {
        use futures_util::{SinkExt, StreamExt};
        use tokio_tungstenite::tungstenite::Message;

        let bridge = WebSocketBridge::bind("127.0.0.1:0").await.unwrap();
        let addr = bridge.local_addr().unwrap();
        let (feeds, inputs) = session_channels(PositionStreamConfig::default(), 4);
        let (events_tx, _events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let client = tokio::spawn(async move {
            let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
                .await
                .unwrap();
            socket
                .send(Message::Text(r#"{"type":"MAP_READY"}"#.to_string()))
                .await
                .unwrap();
            feeds
                .positions
                .send(Ok(GeoPosition::new(1.0, 2.0, 5.0)))
                .await
                .unwrap();

            loop {
                match socket.next().await {
                    Some(Ok(Message::Text(text))) if text.contains("setView") => return text,
                    Some(Ok(_)) => continue,
                    other => panic!("unexpected {:?}", other),
                }
            }
        });

        let session =
            TrackingSession::new(SessionConfig::default(), Arc::new(StaticRouter::new(vec![])))
                .unwrap();
        let run = session.run_websocket(inputs, &bridge, 8, events_tx, cancel.clone());
        let (result, frame) = tokio::join!(run, async {
            let frame = client.await.unwrap();
            cancel.cancel();
            frame
        });

        let summary = result.unwrap();
        assert_eq!(summary.fixes, 1);
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["lat"], 1.0);
    }

    #[test]
    fn test_host_command_json() {
        let command: HostCommand = serde_json::from_str(
            r#"{"command":"request_route","destination":{"latitude":1.0,"longitude":2.0}}"#,
        )
        .unwrap();
        assert_eq!(
            command,
            HostCommand::RequestRoute {
                destination: GeoPoint::new(1.0, 2.0)
            }
        );
        assert_eq!(
            serde_json::from_str::<HostCommand>(r#"{"command":"recenter"}"#).unwrap(),
            HostCommand::Recenter
        );
    }
}
