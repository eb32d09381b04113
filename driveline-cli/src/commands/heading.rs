//! Heading command - one-shot tilt-compensated azimuth from raw sensor axes.

use driveline::heading::{raw_azimuth, SensorSample};

use super::common::{resolve_platform, PlatformArg};
use crate::error::CliError;
use crate::runner::load_config;

/// Arguments for the heading command.
pub struct HeadingArgs {
    pub magnetic: SensorSample,
    pub inertial: SensorSample,
    pub platform: Option<PlatformArg>,
    pub flat_threshold: Option<f64>,
}

/// Run the heading command.
pub fn run(config_path: Option<&std::path::Path>, args: HeadingArgs) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let platform = resolve_platform(args.platform, config.heading.platform);
    let flat_threshold = args
        .flat_threshold
        .unwrap_or(config.heading.flat_threshold);

    if !(0.0..=1.0).contains(&flat_threshold) {
        return Err(CliError::InvalidArgument(format!(
            "flat threshold must be within [0, 1], got {}",
            flat_threshold
        )));
    }

    let raw = raw_azimuth(&args.magnetic, &args.inertial, flat_threshold).ok_or_else(|| {
        CliError::InvalidArgument(
            "inertial vector has zero magnitude or the azimuth is undefined".to_string(),
        )
    })?;
    let corrected = platform.correct_azimuth(raw);

    println!("Raw azimuth:     {:>7.2}°", raw);
    println!("Heading ({}): {:>7.2}°", platform, corrected);

    Ok(())
}
