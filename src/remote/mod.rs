//! Remote API access.
//!
//! The engine talks to the backend only through [`RemoteApi`], so tests can
//! swap the HTTP client for a mock.

mod client;
mod error;
mod types;

use async_trait::async_trait;

pub use client::HttpRemote;
pub use error::RemoteError;
pub use types::{FullBackup, HttpMethod, RemoteRequest, RemoteResponse, UpdateMethod};

/// Operations the sync engine needs from the backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Send one mutation request.
    ///
    /// # Errors
    ///
    /// Returns a classified [`RemoteError`] for anything other than a 2xx answer.
    async fn send(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteError>;

    /// Fetch every table from `GET /api/sync/full-backup`.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteError`] if the request fails or the body is unusable.
    async fn full_backup(&self) -> Result<FullBackup, RemoteError>;

    /// Check that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns a network or timeout error when no HTTP answer arrives.
    async fn ping(&self) -> Result<(), RemoteError>;
}
