#![allow(dead_code)]

use std::sync::Arc;

use binar_sync::config::RemoteConfig;
use binar_sync::features::sync::{
    ConnectivityMonitor, ExecutorConfig, RetryPolicy, SyncEngine, SyncQueue, SyncStateStore,
};
use binar_sync::remote::HttpRemote;
use binar_sync::storage::Database;
use wiremock::MockServer;

pub fn remote_config(server: &MockServer) -> RemoteConfig {
    RemoteConfig {
        base_url: server.uri(),
        request_timeout_ms: 500,
        ..RemoteConfig::default()
    }
}

pub fn http_remote(server: &MockServer) -> HttpRemote {
    HttpRemote::new(&remote_config(server)).unwrap()
}

/// Engine over an in-memory database talking to `server`, with immediate retries.
pub fn engine(server: &MockServer, online: bool) -> SyncEngine {
    let db = Database::open_in_memory().unwrap();
    let queue = SyncQueue::open(db, SyncStateStore::default()).unwrap();
    let config = ExecutorConfig {
        retry: RetryPolicy::immediate(3),
        ..ExecutorConfig::default()
    };

    SyncEngine::new(
        queue,
        Arc::new(http_remote(server)),
        ConnectivityMonitor::new(online),
        config,
    )
}
