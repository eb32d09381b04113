//! Common types and utilities shared across CLI commands.

use std::path::Path;
use std::sync::Arc;

use clap::ValueEnum;
use driveline::bridge::HostEvent;
use driveline::config::DrivelineConfig;
use driveline::heading::SensorSample;
use driveline::platform::DevicePlatform;
use driveline::routing::{
    parse_osrm_response, OsrmRouter, ReqwestClient, RoutingService, StaticRouter,
};
use tokio::sync::mpsc;
use tracing::info;

use crate::error::CliError;

/// Device platform selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum PlatformArg {
    /// Mirrored magnetometer azimuth, `google.navigation:` deep links
    Android,
    /// `comgooglemaps://` deep links
    Ios,
    /// Web links, no azimuth correction
    Other,
}

impl From<PlatformArg> for DevicePlatform {
    fn from(platform: PlatformArg) -> Self {
        match platform {
            PlatformArg::Android => DevicePlatform::Android,
            PlatformArg::Ios => DevicePlatform::Ios,
            PlatformArg::Other => DevicePlatform::Other,
        }
    }
}

/// Resolve the platform: CLI takes precedence, then config.
pub fn resolve_platform(cli: Option<PlatformArg>, configured: DevicePlatform) -> DevicePlatform {
    cli.map(DevicePlatform::from).unwrap_or(configured)
}

/// Parse `X,Y,Z` into a sensor sample.
pub fn parse_vector(s: &str) -> Result<SensorSample, String> {
    let values = s
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("invalid axis value '{}'", part.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    SensorSample::try_from(values.as_slice()).map_err(|e| e.to_string())
}

/// Routing backend: a recorded OSRM response when `fixture` is given,
/// otherwise the configured OSRM server.
pub fn build_router(
    config: &DrivelineConfig,
    fixture: Option<&Path>,
) -> Result<Arc<dyn RoutingService>, CliError> {
    match fixture {
        Some(path) => {
            let body = std::fs::read(path).map_err(|e| {
                CliError::Trace(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let routes = parse_osrm_response(&body)?;
            info!(fixture = %path.display(), routes = routes.len(), "Using recorded routes");
            Ok(Arc::new(StaticRouter::new(routes)))
        }
        None => {
            let client = ReqwestClient::with_timeout(config.routing.timeout)?;
            Ok(Arc::new(OsrmRouter::new(
                client,
                config.routing.base_url.clone(),
            )))
        }
    }
}

/// Print renderer frames and host events until both channels close.
pub async fn print_session_output(
    mut commands: Option<mpsc::Receiver<String>>,
    mut events: mpsc::UnboundedReceiver<HostEvent>,
) {
    let mut events_open = true;
    while commands.is_some() || events_open {
        tokio::select! {
            frame = recv_frame(&mut commands), if commands.is_some() => match frame {
                Some(frame) => println!("→ {}", frame),
                None => commands = None,
            },
            event = events.recv(), if events_open => match event {
                Some(event) => println!("• {}", event_line(&event)),
                None => events_open = false,
            },
        }
    }
}

async fn recv_frame(commands: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    match commands {
        Some(rx) => rx.recv().await,
        None => None,
    }
}

/// One-line JSON rendering of a host event.
pub fn event_line(event: &HostEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|e| format!("<unencodable event: {}>", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vector() {
        let sample = parse_vector("0.5, -1,9.81").unwrap();
        assert_eq!(sample, SensorSample::new(0.5, -1.0, 9.81));
    }

    #[test]
    fn test_parse_vector_rejects_bad_input() {
        assert!(parse_vector("1,2").is_err());
        assert!(parse_vector("1,2,z").is_err());
        assert!(parse_vector("1,2,NaN").is_err());
    }

    #[test]
    fn test_event_line() {
        let line = event_line(&HostEvent::FollowChanged {
            is_following: false,
        });
        assert_eq!(line, r#"{"event":"follow_changed","is_following":false}"#);
    }

    #[test]
    fn test_build_router_from_fixture() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"{"code":"Ok","routes":[{"distance":1112.0,"duration":95.0,
                "geometry":{"coordinates":[[0.0,0.0],[0.005,0.0],[0.01,0.0]]}}]}"#,
        )
        .unwrap();

        let router = build_router(&DrivelineConfig::default(), Some(file.path()));
        assert!(router.is_ok());
    }

    #[test]
    fn test_build_router_rejects_bad_fixture() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, br#"{"code":"NoRoute","routes":[]}"#).unwrap();

        assert!(matches!(
            build_router(&DrivelineConfig::default(), Some(file.path())),
            Err(CliError::Routing(_))
        ));
    }

    #[test]
    fn test_resolve_platform_prefers_cli() {
        assert_eq!(
            resolve_platform(Some(PlatformArg::Ios), DevicePlatform::Android),
            DevicePlatform::Ios
        );
        assert_eq!(
            resolve_platform(None, DevicePlatform::Android),
            DevicePlatform::Android
        );
    }
}
