//! Route command - request a route from OSRM and print what the host would show.

use driveline::geo::GeoPoint;
use driveline::platform::DevicePlatform;
use driveline::routing::handoff::{handoff_url, NavigationApp};
use driveline::routing::{OsrmRouter, ReqwestClient, RouteEngine, RouteEvent, RouteInfo};

use super::common::{resolve_platform, PlatformArg};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the route command.
pub struct RouteArgs {
    pub from: GeoPoint,
    pub to: GeoPoint,
    pub base_url: Option<String>,
    pub platform: Option<PlatformArg>,
    pub json: bool,
}

/// Run the route command.
pub fn run(runner: &CliRunner, args: RouteArgs) -> Result<(), CliError> {
    runner.log_startup("route");
    let config = runner.config();

    let base_url = args
        .base_url
        .unwrap_or_else(|| config.routing.base_url.clone());
    let platform = resolve_platform(args.platform, config.heading.platform);

    let client = ReqwestClient::with_timeout(config.routing.timeout)?;
    let router = OsrmRouter::new(client, base_url);
    let mut engine = RouteEngine::new(config.routing.engine.clone());

    let runtime = runner.runtime()?;
    let event = runtime.block_on(engine.request_route(&router, args.from, args.to))?;

    let info = match event {
        RouteEvent::Ready(info) => info,
        other => {
            return Err(CliError::Config(format!(
                "Unexpected route event: {:?}",
                other
            )))
        }
    };

    if args.json {
        let json = serde_json::to_string_pretty(&info)
            .map_err(|e| CliError::Config(format!("Failed to encode route: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }

    let points = engine
        .route()
        .map(|set| set.primary.coordinates.len())
        .unwrap_or_default();

    println!("Route {} → {}", args.from, args.to);
    println!("──────────────────────────────");
    for line in summary_lines(&info) {
        println!("{}", line);
    }
    println!("  Geometry:    {} points", points);
    println!();
    println!("Open in ({})", platform);
    for (label, url) in handoff_links(platform, &info.destination) {
        println!("  {:<12} {}", label, url);
    }

    Ok(())
}

fn summary_lines(info: &RouteInfo) -> Vec<String> {
    let mut lines = vec![format!(
        "  Main:        {}, {}",
        info.main.distance, info.main.duration
    )];
    match &info.alternative {
        Some(alt) => lines.push(format!("  Alternative: {}, {}", alt.distance, alt.duration)),
        None => lines.push("  Alternative: (none)".to_string()),
    }
    lines
}

fn handoff_links(platform: DevicePlatform, destination: &GeoPoint) -> Vec<(&'static str, String)> {
    NavigationApp::ALL
        .iter()
        .map(|app| (app.label(), handoff_url(*app, platform, destination)))
        .collect()
}
