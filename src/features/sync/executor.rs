//! Sync engine.
//!
//! Drains the queue in order against the remote API, reconciles the local
//! store and keeps the sync state current. At most one pass runs at a time;
//! callers arriving during a pass wait for it and share its result.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use colored::Colorize;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::conflict::{self, Conflict, ConflictStrategy};
use super::connectivity::ConnectivityMonitor;
use super::local_store::{self, entity_id, CachedEntity, LocalStore};
use super::operation::{now_millis, ErrorType, OperationKind, QueueOperation};
use super::queue::{self, SyncQueue};
use super::retry::RetryPolicy;
use super::state::{SyncState, SyncStateStore};
use crate::config::Config;
use crate::error::SyncError;
use crate::remote::{RemoteApi, RemoteError, RemoteRequest, RemoteResponse, UpdateMethod};

/// Configuration for the sync engine.
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    pub retry: RetryPolicy,
    pub update_method: UpdateMethod,
    pub conflict_strategy: ConflictStrategy,
}

impl ExecutorConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry: config.sync.retry_policy(),
            update_method: config.remote.update_method,
            conflict_strategy: config.sync.conflict_strategy,
        }
    }
}

/// What the engine is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// No pass is running
    Idle,
    Draining,
    /// Waiting before retrying a transient failure
    Backoff,
    /// The pass finished and its result is being published
    Completed,
}

/// How one operation ended in a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Confirmed by the server and removed from the queue
    Delivered,
    /// Parked as failed
    Failed,
    /// Left pending: the backend was unreachable, or the record's create
    /// is not confirmed yet
    Deferred,
    /// Canceled before or while it was sent
    Skipped,
}

/// Result of executing a single operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub id: String,
    /// e.g. `create workers`
    pub summary: String,
    pub outcome: Outcome,
    /// Attempts made in this pass
    pub attempts: u32,
    pub error: Option<String>,
    pub error_type: Option<ErrorType>,
}

impl ExecutionResult {
    fn new(op: &QueueOperation, outcome: Outcome, attempts: u32) -> Self {
        Self {
            id: op.id.clone(),
            summary: op.summary(),
            outcome,
            attempts,
            error: None,
            error_type: None,
        }
    }

    fn with_error(mut self, error: &RemoteError) -> Self {
        self.error = Some(error.to_string());
        self.error_type = Some(error.kind());
        self
    }
}

/// Result of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncResult {
    pub succeeded: usize,
    pub failed: usize,
    pub deferred: usize,
    pub skipped: usize,
    /// The pass stopped early on a network failure
    pub aborted: bool,
    /// The pass did not run because the backend is unreachable
    pub offline: bool,
    pub results: Vec<ExecutionResult>,
}

impl SyncResult {
    /// Create an empty result.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    /// Add a result.
    pub fn add(&mut self, result: ExecutionResult) {
        match result.outcome {
            Outcome::Delivered => self.succeeded += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Deferred => self.deferred += 1,
            Outcome::Skipped => self.skipped += 1,
        }
        self.results.push(result);
    }

    /// Check if every attempted operation was delivered.
    #[must_use]
    pub const fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.deferred == 0 && !self.offline
    }

    /// Get total operations processed.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.succeeded + self.failed + self.deferred + self.skipped
    }
}

/// The status interface consumed by UIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    pub is_syncing: bool,
    /// Operations not yet confirmed by the server
    pub offline_count: usize,
    pub is_online: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_type: Option<ErrorType>,
    pub latency: Option<u64>,
}

impl SyncStatus {
    fn from_state(state: &SyncState, is_online: bool) -> Self {
        Self {
            is_syncing: state.is_syncing,
            offline_count: state.pending_count,
            is_online,
            last_sync: state.last_sync,
            last_error: state.last_error.clone(),
            last_error_type: state.last_error_type,
            latency: state.latency,
        }
    }
}

type PassOutcome = Option<Result<SyncResult, String>>;

pub(super) struct Inner {
    pub(super) queue: SyncQueue,
    pub(super) store: LocalStore,
    pub(super) state: SyncStateStore,
    pub(super) connectivity: ConnectivityMonitor,
    remote: Arc<dyn RemoteApi>,
    config: ExecutorConfig,
    phase: Mutex<SyncPhase>,
    /// Result channel of the running pass, if any
    pass: Mutex<Option<watch::Receiver<PassOutcome>>>,
    /// Serializes drain passes and full pulls
    exclusive: tokio::sync::Mutex<()>,
}

/// Offline sync engine. Cloning shares the same engine.
#[derive(Clone)]
pub struct SyncEngine {
    pub(super) inner: Arc<Inner>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("phase", &self.phase())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the pass slot even if the leading caller is dropped mid-pass.
struct PassGuard<'a> {
    inner: &'a Inner,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        lock(&self.inner.pass).take();
        *lock(&self.inner.phase) = SyncPhase::Idle;
        self.inner.state.update(|s| s.is_syncing = false);
    }
}

impl SyncEngine {
    /// Create an engine over an opened queue.
    ///
    /// The local store and sync state are taken from the queue.
    #[must_use]
    pub fn new(
        queue: SyncQueue,
        remote: Arc<dyn RemoteApi>,
        connectivity: ConnectivityMonitor,
        config: ExecutorConfig,
    ) -> Self {
        let store = LocalStore::with_database(queue.database().clone());
        let state = queue.state().clone();

        Self {
            inner: Arc::new(Inner {
                queue,
                store,
                state,
                connectivity,
                remote,
                config,
                phase: Mutex::new(SyncPhase::Idle),
                pass: Mutex::new(None),
                exclusive: tokio::sync::Mutex::new(()),
            }),
        }
    }

    #[must_use]
    pub fn queue(&self) -> &SyncQueue {
        &self.inner.queue
    }

    #[must_use]
    pub fn local_store(&self) -> &LocalStore {
        &self.inner.store
    }

    #[must_use]
    pub fn state(&self) -> &SyncStateStore {
        &self.inner.state
    }

    #[must_use]
    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.inner.connectivity
    }

    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        *lock(&self.inner.phase)
    }

    fn set_phase(&self, phase: SyncPhase) {
        *lock(&self.inner.phase) = phase;
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        SyncStatus::from_state(&self.inner.state.get_state(), self.inner.connectivity.is_online())
    }

    /// Run a sync pass, or wait for the one already running.
    ///
    /// # Errors
    ///
    /// Returns an error if local storage fails during the pass. Callers that
    /// joined a running pass get [`SyncError::PassFailed`] instead.
    pub async fn manual_sync(&self) -> Result<SyncResult, SyncError> {
        self.sync().await
    }

    /// Run a sync pass, or wait for the one already running.
    ///
    /// # Errors
    ///
    /// See [`manual_sync`](Self::manual_sync).
    pub async fn sync(&self) -> Result<SyncResult, SyncError> {
        let (mut receiver, sender) = {
            let mut slot = lock(&self.inner.pass);
            if let Some(running) = slot.as_ref() {
                (running.clone(), None)
            } else {
                let (tx, rx) = watch::channel(None);
                *slot = Some(rx.clone());
                (rx, Some(tx))
            }
        };

        let Some(sender) = sender else {
            debug!("sync pass already running, joining it");
            let outcome = receiver
                .wait_for(Option::is_some)
                .await
                .map_err(|_| SyncError::PassFailed("the running pass was abandoned".to_string()))?
                .clone();
            return match outcome {
                Some(result) => result.map_err(SyncError::PassFailed),
                None => Err(SyncError::PassFailed("no result".to_string())),
            };
        };

        let _guard = PassGuard { inner: &self.inner };
        let result = self.run_pass().await;
        // Publish before the slot is cleared so joiners never miss it
        let shared = result.as_ref().map(SyncResult::clone).map_err(ToString::to_string);
        let _ = sender.send(Some(shared));

        result
    }

    async fn run_pass(&self) -> Result<SyncResult, SyncError> {
        let _exclusive = self.inner.exclusive.lock().await;

        if !self.inner.connectivity.is_online() {
            debug!("offline, skipping sync pass");
            return Ok(SyncResult::offline());
        }

        self.set_phase(SyncPhase::Draining);
        self.inner.state.update(|s| s.is_syncing = true);
        let started = Instant::now();

        let mut pass = PassProgress::default();
        let drained = self.drain(&mut pass).await;

        if let Err(e) = &drained {
            warn!(error = %e, "sync pass aborted by storage failure");
            pass.had_error = true;
            self.inner.state.update(|s| {
                s.set_error(
                    e.to_string(),
                    ErrorType::Validation,
                    Some(json!({ "source": "storage" })),
                );
            });
        }

        let result = pass.result;
        let had_error = pass.had_error;
        let latency = pass.latency;
        self.inner.state.update(|s| {
            s.is_syncing = false;
            if result.succeeded > 0 {
                s.last_sync = Some(now_millis());
                s.latency = latency;
            }
            if !had_error {
                s.clear_error();
            }
        });
        self.set_phase(SyncPhase::Completed);
        self.set_phase(SyncPhase::Idle);

        drained?;
        info!(
            succeeded = result.succeeded,
            failed = result.failed,
            deferred = result.deferred,
            skipped = result.skipped,
            elapsed_ms = started.elapsed().as_millis(),
            "sync pass finished"
        );
        Ok(result)
    }

    async fn drain(&self, pass: &mut PassProgress) -> Result<(), SyncError> {
        let mut cursor = self.inner.queue.list_pending();

        while let Some(op) = cursor.next() {
            let op = op?;
            let execution = self.deliver(&op, pass).await?;

            let stop = execution.error_type == Some(ErrorType::Network);
            pass.result.add(execution);
            if stop {
                pass.result.aborted = true;
                info!("network unavailable, stopping sync pass");
                break;
            }
        }

        Ok(())
    }

    /// Deliver one operation, retrying transient failures within the pass.
    async fn deliver(
        &self,
        queued: &QueueOperation,
        pass: &mut PassProgress,
    ) -> Result<ExecutionResult, SyncError> {
        let queue = &self.inner.queue;
        let policy = &self.inner.config.retry;

        // Re-read: an earlier create in this pass may have retargeted it
        let Some(op) = queue.get(&queued.id)? else {
            return Ok(ExecutionResult::new(queued, Outcome::Skipped, 0));
        };
        let op = &op;

        if self.awaits_create(op)? {
            debug!(id = %op.id, op = %op.summary(), "record not created on the server yet, waiting");
            return Ok(ExecutionResult::new(op, Outcome::Deferred, 0));
        }
        if !queue.mark_in_flight(&op.id)? {
            return Ok(ExecutionResult::new(op, Outcome::Skipped, 0));
        }

        let request = match RemoteRequest::for_operation(op, self.inner.config.update_method) {
            Ok(request) => request,
            Err(e) => {
                self.record_error(&e, pass);
                queue.mark_failed(&op.id, &e.to_string(), e.kind())?;
                return Ok(ExecutionResult::new(op, Outcome::Failed, 0).with_error(&e));
            }
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            let sent = Instant::now();

            let error = match self.inner.remote.send(request.clone()).await {
                Ok(response) => {
                    let rtt = u64::try_from(sent.elapsed().as_millis()).unwrap_or(u64::MAX);
                    let strategy = self.inner.config.conflict_strategy;

                    let applied = queue.dequeue_with(&op.id, |conn| {
                        reconcile(conn, op, &response, strategy)
                    })?;

                    if applied.is_none() {
                        debug!(id = %op.id, "operation canceled in flight, result discarded");
                        return Ok(ExecutionResult::new(op, Outcome::Skipped, attempts));
                    }

                    pass.latency = Some(rtt);
                    debug!(id = %op.id, op = %op.summary(), rtt, "delivered");
                    return Ok(ExecutionResult::new(op, Outcome::Delivered, attempts));
                }
                Err(e) => e,
            };

            let kind = error.kind();
            let message = error.to_string();
            self.record_error(&error, pass);

            if kind == ErrorType::Network {
                queue.defer(&op.id, &message, kind)?;
                return Ok(ExecutionResult::new(op, Outcome::Deferred, attempts).with_error(&error));
            }

            if !policy.should_retry(kind, attempts) {
                let outcome = if queue.mark_failed(&op.id, &message, kind)? {
                    warn!(id = %op.id, op = %op.summary(), error = %message, attempts, "operation failed");
                    Outcome::Failed
                } else {
                    Outcome::Skipped
                };
                return Ok(ExecutionResult::new(op, outcome, attempts).with_error(&error));
            }

            if !queue.record_attempt(&op.id, &message, kind)? {
                return Ok(ExecutionResult::new(op, Outcome::Skipped, attempts).with_error(&error));
            }

            let delay = policy.delay(attempts - 1);
            debug!(id = %op.id, attempt = attempts, ?delay, error = %message, "retrying after backoff");
            self.set_phase(SyncPhase::Backoff);
            tokio::time::sleep(delay).await;
            self.set_phase(SyncPhase::Draining);

            if !queue.mark_in_flight(&op.id)? {
                return Ok(ExecutionResult::new(op, Outcome::Skipped, attempts).with_error(&error));
            }
        }
    }

    /// Whether `op` targets a record whose create is still queued.
    fn awaits_create(&self, op: &QueueOperation) -> Result<bool, SyncError> {
        match (op.kind, op.target_id.as_deref()) {
            (OperationKind::Update | OperationKind::Delete, Some(target)) => {
                self.inner.queue.has_unconfirmed_create(&op.entity_type, target)
            }
            _ => Ok(false),
        }
    }

    fn record_error(&self, error: &RemoteError, pass: &mut PassProgress) {
        pass.had_error = true;
        let details = error.details();
        self.inner
            .state
            .update(|s| s.set_error(error.to_string(), error.kind(), details));
    }

    /// Cancel one queued operation.
    ///
    /// An operation already on the wire finishes, but its result is discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be updated.
    pub fn cancel_operation(&self, id: &str) -> Result<bool, SyncError> {
        let canceled = self.inner.queue.cancel(id)?;
        if canceled {
            info!(id, "operation canceled");
        }
        Ok(canceled)
    }

    /// Cancel every pending, failed and in-flight operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be updated.
    pub fn cancel_all_operations(&self) -> Result<usize, SyncError> {
        let count = self.inner.queue.cancel_all()?;
        info!(count, "all operations canceled");
        Ok(count)
    }

    /// Replace the local cache with the server's full backup.
    ///
    /// Waits for a running drain pass to finish first.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Offline`] when the backend is unreachable, or the
    /// remote or storage error that stopped the import.
    pub async fn pull_full_backup(&self) -> Result<usize, SyncError> {
        if !self.inner.connectivity.is_online() {
            return Err(SyncError::Offline);
        }

        let _exclusive = self.inner.exclusive.lock().await;
        self.inner.state.update(|s| s.is_syncing = true);

        let sent = Instant::now();
        let outcome = match self.inner.remote.full_backup().await {
            Ok(backup) => self
                .inner
                .store
                .import_backup(&backup)
                .map(|count| (count, sent.elapsed())),
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok((count, rtt)) => {
                info!(records = count, "full backup imported");
                self.inner.state.update(|s| {
                    s.is_syncing = false;
                    s.last_sync = Some(now_millis());
                    s.latency = Some(u64::try_from(rtt.as_millis()).unwrap_or(u64::MAX));
                    s.clear_error();
                });
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "full backup failed");
                let (kind, details) = match &e {
                    SyncError::Remote(remote) => (remote.kind(), remote.details()),
                    _ => (ErrorType::Validation, Some(json!({ "source": "storage" }))),
                };
                self.inner.state.update(|s| {
                    s.is_syncing = false;
                    s.set_error(e.to_string(), kind, details);
                });
                Err(e)
            }
        }
    }

    /// Run one pass per offline to online transition until the monitor is dropped.
    #[must_use]
    pub fn spawn_reconnect_listener(&self) -> JoinHandle<()> {
        let engine = self.clone();
        let mut events = self.inner.connectivity.subscribe();

        tokio::spawn(async move {
            loop {
                let reconnected = match events.recv().await {
                    Ok(online) => online,
                    // Missed transitions collapse into the current state
                    Err(broadcast::error::RecvError::Lagged(_)) => engine.inner.connectivity.is_online(),
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if reconnected {
                    info!("back online, syncing");
                    if let Err(e) = engine.sync().await {
                        warn!(error = %e, "reconnect sync failed");
                    }
                }
            }
        })
    }

    /// Sync every `interval` while online. Ticks during a pass are skipped.
    #[must_use]
    pub fn spawn_periodic(&self, interval: Duration) -> JoinHandle<()> {
        let engine = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if engine.inner.connectivity.is_online() {
                    if let Err(e) = engine.sync().await {
                        warn!(error = %e, "periodic sync failed");
                    }
                }
            }
        })
    }

    /// Start a pass in the background if online and inside a runtime.
    pub(super) fn trigger(&self) {
        if !self.inner.connectivity.is_online() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let engine = self.clone();
        handle.spawn(async move {
            if let Err(e) = engine.sync().await {
                warn!(error = %e, "background sync failed");
            }
        });
    }
}

#[derive(Default)]
struct PassProgress {
    result: SyncResult,
    had_error: bool,
    latency: Option<u64>,
}

/// Apply a confirmed operation to the local store.
///
/// Runs inside the dequeue transaction.
fn reconcile(
    conn: &Connection,
    op: &QueueOperation,
    response: &RemoteResponse,
    strategy: ConflictStrategy,
) -> Result<(), SyncError> {
    let entity = response.entity();

    match op.kind {
        OperationKind::Create => {
            let placeholder = local_store::placeholder_for(conn, &op.id)?;
            if let Some(ph) = &placeholder {
                local_store::remove(conn, &ph.entity_type, &ph.id)?;
            }
            let local_id = op
                .target_id
                .clone()
                .or_else(|| placeholder.as_ref().map(|ph| ph.id.clone()));

            let server = entity.and_then(|e| entity_id(e).map(|id| (id, e)));
            match (server, &placeholder) {
                (Some((server_id, server)), _) => {
                    if let Some(local_id) = local_id.filter(|id| *id != server_id) {
                        let moved = queue::retarget(conn, &op.entity_type, &local_id, &server_id)?;
                        if moved > 0 {
                            debug!(from = %local_id, to = %server_id, moved, "retargeted queued operations");
                        }
                    }
                    // Placeholder gone: the record was deleted locally meanwhile
                    if placeholder.is_none() && op.target_id.is_some() {
                        return Ok(());
                    }
                    let data = resolve(conn, op, &server_id, placeholder.as_ref(), server, strategy)?;
                    local_store::put_synced(conn, &op.entity_type, &server_id, &data)?;
                }
                // No canonical entity: keep what we wrote, now confirmed
                (None, Some(ph)) => local_store::put_synced(conn, &ph.entity_type, &ph.id, &ph.data)?,
                (None, None) => {}
            }
        }
        OperationKind::Update => {
            let target = op
                .target_id
                .clone()
                .or_else(|| entity.and_then(entity_id));

            if let (Some(target), Some(server)) = (target, entity) {
                let local = local_store::get(conn, &op.entity_type, &target)?;
                let data = resolve(conn, op, &target, local.as_ref(), server, strategy)?;
                local_store::put_synced(conn, &op.entity_type, &target, &data)?;
            }
        }
        OperationKind::Delete => {
            if let Some(target) = &op.target_id {
                local_store::remove(conn, &op.entity_type, target)?;
            }
        }
    }

    Ok(())
}

/// The server copy, unless newer local edits to the same record are queued.
fn resolve(
    conn: &Connection,
    op: &QueueOperation,
    id: &str,
    local: Option<&CachedEntity>,
    server: &Value,
    strategy: ConflictStrategy,
) -> Result<Value, SyncError> {
    let queued = queue::queued_edits_for(conn, &op.entity_type, id, &op.id)?;
    let Some(local) = local.filter(|_| queued > 0) else {
        return Ok(server.clone());
    };

    let conflict = Conflict {
        client: Some(&local.data),
        server: Some(server),
        client_time: local.updated_at,
        server_time: server_timestamp(server).unwrap_or(op.created_at),
    };

    let mut resolved = conflict::resolve(strategy, &conflict).unwrap_or_else(|| server.clone());
    // The record keeps its server identity whichever side won
    if let Value::Object(map) = &mut resolved {
        let server_id = server
            .get("id")
            .cloned()
            .unwrap_or_else(|| Value::String(id.to_string()));
        map.insert("id".to_string(), server_id);
    }
    Ok(resolved)
}

/// Modification time reported by the server, if any.
fn server_timestamp(entity: &Value) -> Option<DateTime<Utc>> {
    let value = entity.get("updatedAt").or_else(|| entity.get("updated_at"))?;
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Format sync result for display.
#[must_use]
pub fn format_sync_result(result: &SyncResult) -> String {
    if result.offline {
        return format!("{} Backend unreachable, nothing was sent", "○".yellow());
    }

    let mut lines = Vec::new();

    lines.push(format!("Sync completed: {} operations", result.total()));
    lines.push("─".repeat(40));

    if result.succeeded > 0 {
        lines.push(format!(
            "  {} {}",
            "✓".green(),
            format!("{} succeeded", result.succeeded).green()
        ));
    }

    if result.failed > 0 {
        lines.push(format!(
            "  {} {}",
            "✗".red(),
            format!("{} failed", result.failed).red()
        ));
    }

    if result.deferred > 0 {
        lines.push(format!(
            "  {} {}",
            "↻".yellow(),
            format!("{} deferred", result.deferred).yellow()
        ));
    }

    if result.skipped > 0 {
        lines.push(format!(
            "  {} {}",
            "○".yellow(),
            format!("{} skipped", result.skipped).yellow()
        ));
    }

    if result.aborted {
        lines.push(format!("  {}", "Stopped early: network unavailable".yellow()));
    }

    // Show first few errors
    let errors: Vec<_> = result
        .results
        .iter()
        .filter(|r| r.error.is_some())
        .take(3)
        .collect();

    if !errors.is_empty() {
        lines.push(String::new());
        lines.push("Errors:".to_string());
        for err in errors {
            lines.push(format!(
                "  - {}: {}",
                err.summary,
                err.error.as_deref().unwrap_or("Unknown error")
            ));
        }
    }

    lines.join("\n")
}
