//! Storage layer for binar-sync.
//!
//! This module provides SQLite-based persistence for:
//! - Sync queue (offline mutations)
//! - Cached entities mirrored from the backend
//! - Sync metadata

mod database;
mod migrations;

pub use database::Database;
