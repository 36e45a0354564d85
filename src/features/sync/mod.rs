//! Offline sync engine.
//!
//! Mutations made without connectivity are written to the local cache and a
//! durable queue. The engine drains the queue in order once the backend is
//! reachable again.
//!
//! Features:
//! - Durable FIFO queue with cancellation and requeue
//! - Observable sync state with synchronous listeners
//! - Connectivity events driving one pass per reconnect
//! - Bounded retry with exponential backoff
//! - Conflict resolution for records edited during a pass

pub mod conflict;
pub mod connectivity;
pub mod executor;
pub mod local_store;
pub mod mutations;
pub mod operation;
pub mod queue;
pub mod retry;
pub mod state;

pub use conflict::{conflicting_fields, resolve as resolve_conflict, Conflict, ConflictStrategy};
pub use connectivity::ConnectivityMonitor;
pub use executor::{
    format_sync_result, ExecutionResult, ExecutorConfig, Outcome, SyncEngine, SyncPhase,
    SyncResult, SyncStatus,
};
pub use local_store::{is_placeholder, placeholder_id, CachedEntity, LocalStore};
pub use mutations::MutationReceipt;
pub use operation::{ErrorType, OperationKind, OperationStatus, QueueOperation};
pub use queue::{PendingCursor, QueueStats, SyncQueue};
pub use retry::RetryPolicy;
pub use state::{Subscription, SyncState, SyncStateStore};
