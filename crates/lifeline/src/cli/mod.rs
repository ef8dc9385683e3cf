//! Command-line interface for lifeline.
//!
//! This module provides the CLI structure and command handlers for the
//! `lifeline` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AlertCommand, ConfigCommand, LoginCommand, ReportCommand, SimulateCommand, StatusCommand,
};

/// lifeline - shake-to-alert personal safety client
///
/// Turns a motion-sensor stream into an emergency trigger and delivers
/// authenticated alerts to an emergency contact, recovering from expired
/// credentials and surfacing connectivity loss instead of queuing.
#[derive(Debug, Parser)]
#[command(name = "lifeline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a bare emergency alert (no recording)
    Alert(AlertCommand),

    /// Submit a full report with an audio recording
    Report(ReportCommand),

    /// Replay a recorded sample trace through the shake detector
    Simulate(SimulateCommand),

    /// Show client and credential status
    Status(StatusCommand),

    /// Store credentials for authenticated dispatch
    Login(LoginCommand),

    /// Purge stored credentials
    Logout,

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_command_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_mapping() {
        let cli = Cli::parse_from(["lifeline", "logout"]);
        assert_eq!(cli.verbosity(), crate::logging::Verbosity::Normal);

        let cli = Cli::parse_from(["lifeline", "-v", "logout"]);
        assert_eq!(cli.verbosity(), crate::logging::Verbosity::Verbose);

        let cli = Cli::parse_from(["lifeline", "-vv", "logout"]);
        assert_eq!(cli.verbosity(), crate::logging::Verbosity::Trace);

        let cli = Cli::parse_from(["lifeline", "--quiet", "logout"]);
        assert_eq!(cli.verbosity(), crate::logging::Verbosity::Quiet);
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["lifeline", "--config", "/tmp/custom.toml", "logout"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/custom.toml")));
    }

    #[test]
    fn test_login_command_parses() {
        let cli = Cli::parse_from([
            "lifeline",
            "login",
            "--access-token",
            "a1",
            "--refresh-token",
            "r1",
        ]);
        let Command::Login(cmd) = cli.command else {
            panic!("expected login command");
        };
        assert_eq!(cmd.access_token, "a1");
        assert_eq!(cmd.refresh_token, "r1");
    }
}
