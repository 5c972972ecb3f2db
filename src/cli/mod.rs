//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Surge using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Surge - bulk data loader for PostgreSQL-compatible databases
#[derive(Parser, Debug)]
#[command(name = "surge")]
#[command(version, about, long_about = None)]
#[command(author = "Surge Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "surge.toml", env = "SURGE_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "SURGE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load the configured tables
    Load(commands::load::LoadArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
