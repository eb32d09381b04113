//! Driveline CLI - command-line interface
//!
//! Exercises the navigation core outside a mobile host: one-shot route and
//! heading queries, trace replay against a console renderer, and a WebSocket
//! bridge for an out-of-process map.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use driveline::geo::GeoPoint;
use driveline::heading::SensorSample;

use commands::common::{parse_vector, PlatformArg};
use commands::config::ConfigCommands;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "driveline")]
#[command(version = driveline::VERSION)]
#[command(about = "Vehicle navigation core: heading, routing and map control", long_about = None)]
struct Cli {
    /// Configuration file (default: <config dir>/driveline/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a driving route and print summaries and hand-off links
    Route {
        /// Origin as LAT,LON
        #[arg(long, allow_hyphen_values = true)]
        from: GeoPoint,

        /// Destination as LAT,LON
        #[arg(long, allow_hyphen_values = true)]
        to: GeoPoint,

        /// OSRM server base URL (overrides config)
        #[arg(long)]
        base_url: Option<String>,

        /// Platform used for deep links (overrides config)
        #[arg(long, value_enum)]
        platform: Option<PlatformArg>,

        /// Print the route info as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute a compass heading from one magnetometer and accelerometer sample
    Heading {
        /// Magnetometer axes as X,Y,Z (µT)
        #[arg(long = "mag", value_parser = parse_vector, allow_hyphen_values = true)]
        magnetic: SensorSample,

        /// Accelerometer axes as X,Y,Z (m/s²)
        #[arg(long = "accel", value_parser = parse_vector, allow_hyphen_values = true)]
        inertial: SensorSample,

        /// Sensor axis convention (overrides config)
        #[arg(long, value_enum)]
        platform: Option<PlatformArg>,

        /// |z| of the normalized gravity vector above which the device counts as flat
        #[arg(long)]
        flat_threshold: Option<f64>,
    },

    /// Replay a recorded trace and print renderer commands and host events
    Replay {
        /// JSON-lines trace file
        trace: PathBuf,

        /// Recorded OSRM response used instead of the routing server
        #[arg(long)]
        routes: Option<PathBuf>,
    },

    /// Serve a session to a renderer connecting over WebSocket
    Serve {
        /// Address to listen on
        #[arg(long, default_value = commands::serve::DEFAULT_LISTEN)]
        listen: String,

        /// JSON-lines trace to feed once the renderer connects
        trace: Option<PathBuf>,

        /// Recorded OSRM response used instead of the routing server
        #[arg(long)]
        routes: Option<PathBuf>,
    },

    /// View and modify configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Config { command } => commands::config::run(command, config_path),
        Commands::Heading {
            magnetic,
            inertial,
            platform,
            flat_threshold,
        } => commands::heading::run(
            config_path,
            commands::heading::HeadingArgs {
                magnetic,
                inertial,
                platform,
                flat_threshold,
            },
        ),
        Commands::Route {
            from,
            to,
            base_url,
            platform,
            json,
        } => {
            let runner = CliRunner::new(config_path)?;
            commands::route::run(
                &runner,
                commands::route::RouteArgs {
                    from,
                    to,
                    base_url,
                    platform,
                    json,
                },
            )
        }
        Commands::Replay { trace, routes } => {
            let runner = CliRunner::new(config_path)?;
            commands::replay::run(&runner, commands::replay::ReplayArgs { trace, routes })
        }
        Commands::Serve {
            listen,
            trace,
            routes,
        } => {
            let runner = CliRunner::new(config_path)?;
            commands::serve::run(
                &runner,
                commands::serve::ServeArgs {
                    listen,
                    trace,
                    routes,
                },
            )
        }
    }
}
