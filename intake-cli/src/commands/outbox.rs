//! Outbox Commands

use clap::Subcommand;

/// Activity outbox commands
#[derive(Subcommand, Debug)]
pub enum OutboxCommands {
    /// List activity rows waiting locally
    List,

    /// Push waiting rows to the REST datastore
    Replay,
}
