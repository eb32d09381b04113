//! Configuration management CLI commands.
//!
//! Provides `config init`, `config show`, `config get`, `config set`, and
//! `config path` for viewing and modifying settings from the command line.

use std::path::Path;

use clap::Subcommand;
use driveline::config::{config_file_path, DrivelineConfig, CONFIG_KEYS};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with every default value
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List all configuration settings
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., routing.base_url)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., routing.base_url)
        key: String,

        /// Value to set
        value: String,
    },

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand against `path`, or the default location.
pub fn run(command: ConfigCommands, path: Option<&Path>) -> Result<(), CliError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };

    match command {
        ConfigCommands::Init { force } => run_init(&path, force),
        ConfigCommands::Show => run_show(&path),
        ConfigCommands::Get { key } => run_get(&path, &key),
        ConfigCommands::Set { key, value } => run_set(&path, &key, &value),
        ConfigCommands::Path => run_path(&path),
    }
}

fn load_or_default(path: &Path) -> Result<DrivelineConfig, CliError> {
    if path.exists() {
        Ok(DrivelineConfig::load_from(path)?)
    } else {
        Ok(DrivelineConfig::default())
    }
}

fn unknown_key(key: &str) -> CliError {
    CliError::Config(format!(
        "Unknown configuration key '{}'. Use 'driveline config show' to see available keys.",
        key
    ))
}

/// Write the defaults.
fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        )));
    }

    DrivelineConfig::default().save_to(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// List all configuration settings.
fn run_show(path: &Path) -> Result<(), CliError> {
    let config = load_or_default(path)?;

    println!("Configuration Settings");
    println!("======================");
    println!();

    let mut current_section = "";

    for key in CONFIG_KEYS {
        let Some((section, name)) = key.split_once('.') else {
            continue;
        };

        // Print section header when section changes
        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", section);
            current_section = section;
        }

        let value = config.get(key)?;
        if value.is_empty() {
            println!("  {} = (not set)", name);
        } else {
            println!("  {} = {}", name, value);
        }
    }

    Ok(())
}

/// Get a configuration value.
fn run_get(path: &Path, key: &str) -> Result<(), CliError> {
    if !CONFIG_KEYS.contains(&key) {
        return Err(unknown_key(key));
    }

    let value = load_or_default(path)?.get(key)?;
    if value.is_empty() {
        println!("(not set)");
    } else {
        println!("{}", value);
    }

    Ok(())
}

/// Set a configuration value.
fn run_set(path: &Path, key: &str, value: &str) -> Result<(), CliError> {
    if !CONFIG_KEYS.contains(&key) {
        return Err(unknown_key(key));
    }

    let mut config = load_or_default(path)?;
    config.set(key, value)?;
    config.save_to(path)?;

    println!("Set {} = {}", key, value);
    Ok(())
}

/// Show the configuration file path.
fn run_path(path: &Path) -> Result<(), CliError> {
    println!("{}", path.display());
    Ok(())
}
