//! Intake CLI - Command Line Interface
//!
//! Operator tooling for the property intake submission engine.
//!
//! # Usage
//!
//! ```text
//! intake [OPTIONS] <COMMAND>
//!
//! Commands:
//!   validate   Validate an intake graph without touching the network
//!   normalize  Normalize a raw occupancy value
//!   submit     Submit a graph
//!   resume     Re-run the pending snapshot of a user
//!   tracker    Inspect or reset the duplicate guard
//!   outbox     Inspect or replay the local activity outbox
//!   sample     Print a sample graph
//!
//! Options:
//!       --state-dir <DIR>      Durable local state [default: .intake]
//!       --datastore-url <URL>  Datastore project URL
//!       --api-key <KEY>        Datastore API key
//!   -f, --format <FORMAT>      Output format (json, table, plain) [default: table]
//!   -v, --verbose              Enable verbose output
//! ```
//!
//! # Examples
//!
//! ```text
//! intake sample --request > request.json
//! intake validate request.json
//! intake submit request.json --memory --user user-1
//! intake tracker status --user user-1
//! ```

pub mod commands;
pub mod error;
pub mod handler;
pub mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use error::{CliError, CliResult};

/// Intake CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
