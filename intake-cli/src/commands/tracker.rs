//! Tracker Commands

use clap::Subcommand;

/// Duplicate guard commands
#[derive(Subcommand, Debug)]
pub enum TrackerCommands {
    /// Show the state of a user
    Status {
        /// User id
        #[arg(short, long)]
        user: String,
    },

    /// Reset a user so the next submit starts fresh
    Clear {
        /// User id
        #[arg(short, long)]
        user: String,
        /// Also drop the pending snapshot
        #[arg(long)]
        pending: bool,
    },
}
