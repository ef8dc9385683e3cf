//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Alert command arguments.
#[derive(Debug, Args)]
pub struct AlertCommand {
    /// Latitude of the current position fix
    #[arg(long, allow_hyphen_values = true)]
    pub latitude: f64,

    /// Longitude of the current position fix
    #[arg(long, allow_hyphen_values = true)]
    pub longitude: f64,

    /// Identity of the reporting user
    #[arg(short, long)]
    pub user: String,
}

/// Report command arguments.
#[derive(Debug, Args)]
pub struct ReportCommand {
    /// Path to the finished audio recording
    #[arg(short, long, value_name = "FILE")]
    pub audio: PathBuf,

    /// Latitude of the current position fix
    #[arg(long, allow_hyphen_values = true)]
    pub latitude: f64,

    /// Longitude of the current position fix
    #[arg(long, allow_hyphen_values = true)]
    pub longitude: f64,

    /// Identity of the reporting user
    #[arg(short, long)]
    pub user: String,
}

/// Simulate command arguments.
#[derive(Debug, Args)]
pub struct SimulateCommand {
    /// Sample trace to replay (JSON lines, one sample per line)
    #[arg(value_name = "TRACE")]
    pub trace: PathBuf,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Login command arguments.
#[derive(Debug, Args)]
pub struct LoginCommand {
    /// Short-lived access token
    #[arg(long)]
    pub access_token: String,

    /// Long-lived refresh token
    #[arg(long)]
    pub refresh_token: String,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Print the configuration file path
    Path,

    /// Validate a configuration file
    Validate {
        /// Configuration file to validate (defaults to the standard path)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}
