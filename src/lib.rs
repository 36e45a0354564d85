//! binar-sync - offline sync engine for the Binar bookkeeping backend
//!
//! Mutations made while the backend is unreachable are cached locally and
//! queued durably; the [`SyncEngine`] delivers them in order once it answers.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod output;
pub mod remote;
pub mod storage;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use error::SyncError;
pub use features::sync::{SyncEngine, SyncQueue, SyncStateStore};
pub use remote::{HttpRemote, RemoteApi};
