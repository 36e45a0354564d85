//! Configuration management for binar-sync.
//!
//! This module handles loading configuration from `~/.binar-sync/`.

mod paths;
mod settings;

pub use paths::{Paths, HOME_ENV};
pub use settings::{ColorSetting, Config, GeneralConfig, LoggingConfig, RemoteConfig, SyncConfig};
