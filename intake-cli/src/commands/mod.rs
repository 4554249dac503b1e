//! CLI Commands Module
//!
//! Command definitions for the intake CLI.

pub mod outbox;
pub mod tracker;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Property intake submission engine CLI
#[derive(Parser, Debug)]
#[command(name = "intake")]
#[command(version)]
#[command(about = "Validate and submit property intake graphs")]
#[command(long_about = "A command-line tool for the property intake submission engine.\n\n\
    Use this tool to validate intake graphs, normalize legacy occupancy data, \
    submit graphs to the datastore and inspect the local duplicate guard.")]
pub struct Cli {
    /// Directory holding durable local state (env: INTAKE_STATE_DIR)
    #[arg(long, env = "INTAKE_STATE_DIR", default_value = ".intake")]
    pub state_dir: PathBuf,

    /// Datastore project URL (env: INTAKE_DATASTORE_URL)
    #[arg(long, env = "INTAKE_DATASTORE_URL")]
    pub datastore_url: Option<String>,

    /// Datastore API key (env: INTAKE_DATASTORE_API_KEY)
    #[arg(long, env = "INTAKE_DATASTORE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Session token of the signed-in user (env: INTAKE_DATASTORE_TOKEN)
    #[arg(long, env = "INTAKE_DATASTORE_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Output format (json, table, plain)
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "INTAKE_LOG_JSON")]
    pub log_json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Table format (human-readable)
    #[default]
    Table,
    /// Plain text
    Plain,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate an intake graph without touching the network
    Validate {
        /// Graph or submission request JSON file
        file: PathBuf,
        /// Normalize legacy occupancy values first
        #[arg(long)]
        normalize_occupancy: bool,
    },

    /// Normalize a raw occupancy value
    Normalize {
        /// JSON file holding the raw value
        file: PathBuf,
    },

    /// Submit a graph
    Submit {
        /// Submission request JSON file
        file: PathBuf,
        /// User id, overriding the request and the session
        #[arg(short, long)]
        user: Option<String>,
        /// Use an in-memory datastore instead of the REST one
        #[arg(long)]
        memory: bool,
        /// Normalize legacy occupancy values first
        #[arg(long)]
        normalize_occupancy: bool,
    },

    /// Re-run the pending snapshot of a user
    Resume {
        /// User id
        #[arg(short, long)]
        user: String,
        /// Use an in-memory datastore instead of the REST one
        #[arg(long)]
        memory: bool,
    },

    /// Inspect or reset the duplicate guard
    #[command(subcommand)]
    Tracker(tracker::TrackerCommands),

    /// Inspect or replay the local activity outbox
    #[command(subcommand)]
    Outbox(outbox::OutboxCommands),

    /// Print a sample graph
    Sample {
        /// Wrap the graph in a submission request
        #[arg(long)]
        request: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_help() {
        let result = Cli::try_parse_from(["intake", "--help"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Table);
    }

    #[test]
    fn test_parse_submit() {
        let cli = Cli::try_parse_from([
            "intake",
            "--format",
            "json",
            "submit",
            "request.json",
            "--memory",
            "--user",
            "u1",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Submit {
                file, user, memory, ..
            } => {
                assert_eq!(file, PathBuf::from("request.json"));
                assert_eq!(user.as_deref(), Some("u1"));
                assert!(memory);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_tracker_status() {
        let cli = Cli::try_parse_from(["intake", "tracker", "status", "--user", "u1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Tracker(tracker::TrackerCommands::Status { .. })
        ));
    }
}
