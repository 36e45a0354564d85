use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "binar-sync")]
#[command(about = "Offline sync engine for the Binar bookkeeping backend")]
#[command(long_about = "binar-sync - offline-first sync for Binar

Records created, changed or deleted while the backend is unreachable are kept
in a local cache and a durable queue. The queue is delivered in order once the
backend answers again.

QUICK START:
  binar-sync create workers --data '{\"name\": \"Ali\"}'   Queue a new record
  binar-sync status                                     Show pending count and errors
  binar-sync run                                        Deliver queued operations
  binar-sync pull                                       Refresh the local cache

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting

For more information on a specific command, run:
  binar-sync <command> --help")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    ///
    /// Defaults to `general.default_output` from the config file.
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Directory holding config.yaml and the database
    #[arg(long, global = true, env = "BINAR_SYNC_HOME")]
    pub data_dir: Option<PathBuf>,

    /// Backend base URL, overriding the config file
    #[arg(long, global = true, env = "BINAR_SYNC_API_URL")]
    pub api_url: Option<String>,

    /// Bearer token sent with every request
    #[arg(long, global = true, env = "BINAR_SYNC_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

/// Queue status accepted by `list --status`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusFilter {
    Pending,
    InFlight,
    Failed,
    Canceled,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show sync status
    ///
    /// Probes the backend once, then prints connectivity, the number of
    /// operations not yet confirmed, the last successful sync and the last
    /// error.
    ///
    /// # Examples
    ///
    ///   binar-sync status
    ///   binar-sync status -o json
    #[command(alias = "st")]
    Status,

    /// Deliver queued operations
    ///
    /// Runs one sync pass: operations are sent oldest first. Timeouts and
    /// server errors are retried with backoff; rejected operations are parked
    /// as failed; a network failure stops the pass.
    ///
    /// # Examples
    ///
    ///   binar-sync run
    ///   binar-sync run -o json
    Run,

    /// List queued operations
    ///
    /// # Examples
    ///
    ///   binar-sync list
    ///   binar-sync list --status failed
    #[command(alias = "ls")]
    List {
        /// Only show operations with this status
        #[arg(long, short = 's', value_enum)]
        status: Option<StatusFilter>,
    },

    /// Create a record locally and queue it
    ///
    /// # Examples
    ///
    ///   binar-sync create workers --data '{"name": "Ali", "wage": 250}'
    Create {
        /// Entity type, e.g. workers, suppliers, fund-transfers
        entity: String,

        /// Record fields as a JSON object
        #[arg(long, short = 'd')]
        data: String,
    },

    /// Change fields of a record locally and queue the update
    ///
    /// # Examples
    ///
    ///   binar-sync update workers w-42 --data '{"wage": 300}'
    Update {
        /// Entity type
        entity: String,

        /// Record id
        id: String,

        /// Changed fields as a JSON object
        #[arg(long, short = 'd')]
        data: String,
    },

    /// Delete a record locally and queue the delete
    Delete {
        /// Entity type
        entity: String,

        /// Record id
        id: String,
    },

    /// Cancel a queued operation
    ///
    /// Works for pending, failed and in-flight operations. A request already
    /// on the wire completes but its result is discarded.
    Cancel {
        /// Operation id
        id: String,
    },

    /// Cancel every queued operation
    CancelAll {
        /// Required confirmation
        #[arg(long)]
        force: bool,
    },

    /// Reset failed operations to pending
    Requeue {
        /// Operation id
        #[arg(required_unless_present = "all")]
        id: Option<String>,

        /// Requeue every failed operation
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },

    /// Replace the local cache with the server's full backup
    ///
    /// Records created offline and not yet confirmed are kept.
    Pull,

    /// Show cached records
    ///
    /// Without an entity type, lists the types present in the cache.
    Entities {
        /// Entity type
        entity: Option<String>,
    },

    /// Show queue statistics
    Stats,

    /// Purge old canceled operations
    Cleanup {
        /// Age in hours; defaults to `sync.canceled_retention_hours`
        #[arg(long)]
        older_than: Option<i64>,
    },

    /// Keep syncing in the foreground
    ///
    /// Probes the backend periodically, runs a pass on every reconnect and on
    /// the periodic timer. Stop with Ctrl-C.
    Watch,

    /// Generate shell completions
    ///
    /// Example: binar-sync completions bash > ~/.bash_completion.d/binar-sync
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_update() {
        let cli = Cli::try_parse_from([
            "binar-sync",
            "update",
            "workers",
            "w-42",
            "--data",
            "{\"wage\": 300}",
            "-o",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.output, Some(OutputFormat::Json));
        match cli.command {
            Commands::Update { entity, id, data } => {
                assert_eq!(entity, "workers");
                assert_eq!(id, "w-42");
                assert!(data.contains("wage"));
            }
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn test_requeue_needs_target() {
        assert!(Cli::try_parse_from(["binar-sync", "requeue"]).is_err());
        assert!(Cli::try_parse_from(["binar-sync", "requeue", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["binar-sync", "requeue", "abc", "--all"]).is_err());
    }

    #[test]
    fn test_list_status_filter() {
        let cli = Cli::try_parse_from(["binar-sync", "list", "--status", "in-flight"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::List {
                status: Some(StatusFilter::InFlight)
            }
        ));
    }
}
