//! Command implementations for binar-sync.
//!
//! Every command receives a [`Context`] holding the opened engine and returns
//! the text to print.

mod records;
mod sync;

pub use records::{create, delete, entities, update};
pub use sync::{cancel, cancel_all, cleanup, list, pull, requeue, run, stats, status, watch};

use std::path::PathBuf;
use std::sync::Arc;

use clap::CommandFactory;
use clap_complete::Shell;

use crate::cli::args::{Cli, OutputFormat};
use crate::config::{Config, Paths};
use crate::error::SyncError;
use crate::features::sync::{
    ConnectivityMonitor, ExecutorConfig, SyncEngine, SyncQueue, SyncStateStore,
};
use crate::remote::{HttpRemote, RemoteApi};
use crate::storage::Database;

/// Everything a command needs, opened once per invocation.
pub struct Context {
    pub engine: SyncEngine,
    pub remote: Arc<dyn RemoteApi>,
    pub config: Config,
    pub format: OutputFormat,
}

impl Context {
    /// Resolve paths and settings, open the database and build the engine.
    ///
    /// Command-line flags override the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be read or the database cannot
    /// be opened.
    pub fn open(
        data_dir: Option<PathBuf>,
        api_url: Option<String>,
        token: Option<String>,
        output: Option<OutputFormat>,
    ) -> Result<Self, SyncError> {
        let paths = match data_dir {
            Some(root) => Paths::with_root(root),
            None => Paths::new()?,
        };
        paths.ensure_dirs()?;

        let mut config = Config::load_from_path(&paths.config_file)?;
        if let Some(url) = api_url {
            config.remote.base_url = url;
        }
        if token.is_some() {
            config.remote.auth_token = token;
        }

        let remote: Arc<dyn RemoteApi> = Arc::new(HttpRemote::new(&config.remote)?);
        let db = Database::open_at(&paths.database)?;
        let queue = SyncQueue::open(db, SyncStateStore::default())?;
        let engine = SyncEngine::new(
            queue,
            Arc::clone(&remote),
            ConnectivityMonitor::default(),
            ExecutorConfig::from_config(&config),
        );

        Ok(Self {
            engine,
            remote,
            format: output.unwrap_or(config.general.default_output),
            config,
        })
    }

    /// Probe the backend once so the engine knows whether it is reachable.
    pub async fn probe(&self) -> bool {
        self.engine.connectivity().probe(self.remote.as_ref()).await
    }
}

/// Generate shell completions for the specified shell.
///
/// # Errors
///
/// Returns an error if the script is not valid UTF-8.
pub fn completions(shell: Shell) -> Result<String, SyncError> {
    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    clap_complete::generate(shell, &mut cmd, "binar-sync", &mut buf);
    String::from_utf8(buf).map_err(|e| SyncError::InvalidInput(format!("UTF-8 error: {e}")))
}

/// Parse a `--data` argument.
fn parse_json(raw: &str) -> Result<serde_json::Value, SyncError> {
    serde_json::from_str(raw)
        .map_err(|e| SyncError::InvalidInput(format!("--data is not valid JSON: {e}")))
}
