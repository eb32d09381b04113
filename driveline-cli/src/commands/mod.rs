//! CLI subcommands.

pub mod common;
pub mod config;
pub mod heading;
pub mod replay;
pub mod route;
pub mod serve;
