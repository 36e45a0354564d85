//! Connectivity monitor.
//!
//! Publishes online/offline transitions. The sync engine subscribes and
//! runs one pass per reconnect; a background probe against the backend's
//! health endpoint feeds the monitor.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::remote::RemoteApi;

const EVENT_CAPACITY: usize = 16;

/// Shared online/offline flag with change notifications.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    online: Arc<Mutex<bool>>,
    events: broadcast::Sender<bool>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ConnectivityMonitor {
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            online: Arc::new(Mutex::new(online)),
            events,
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.online.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Update the flag. Subscribers are notified only when it changes.
    ///
    /// Returns whether the value changed.
    pub fn set_online(&self, online: bool) -> bool {
        let mut current = self.online.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == online {
            return false;
        }
        *current = online;

        info!(online, "connectivity changed");
        // No receivers is fine
        let _ = self.events.send(online);
        true
    }

    /// Receive every transition from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<bool> {
        self.events.subscribe()
    }

    /// Probe the backend once and record the result.
    pub async fn probe(&self, remote: &dyn RemoteApi) -> bool {
        let reachable = match remote.ping().await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "health probe failed");
                false
            }
        };
        self.set_online(reachable);
        reachable
    }

    /// Probe the backend every `interval` until the task is aborted.
    #[must_use]
    pub fn spawn_probe(&self, remote: Arc<dyn RemoteApi>, interval: Duration) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                monitor.probe(remote.as_ref()).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MockRemoteApi, RemoteError};

    #[test]
    fn test_set_online_reports_change() {
        let monitor = ConnectivityMonitor::new(false);
        assert!(!monitor.is_online());

        assert!(monitor.set_online(true));
        assert!(!monitor.set_online(true));
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions_only() {
        let monitor = ConnectivityMonitor::new(false);
        let mut rx = monitor.subscribe();

        monitor.set_online(true);
        monitor.set_online(true);
        monitor.set_online(false);

        assert!(rx.recv().await.unwrap());
        assert!(!rx.recv().await.unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let monitor = ConnectivityMonitor::new(false);
        let other = monitor.clone();
        let mut rx = other.subscribe();

        monitor.set_online(true);
        assert!(other.is_online());
        assert!(rx.recv().await.unwrap());
    }

    #[tokio::test]
    async fn test_probe() {
        let monitor = ConnectivityMonitor::new(false);

        let mut up = MockRemoteApi::new();
        up.expect_ping().returning(|| Ok(()));
        assert!(monitor.probe(&up).await);
        assert!(monitor.is_online());

        let mut down = MockRemoteApi::new();
        down.expect_ping()
            .returning(|| Err(RemoteError::Network("connection refused".to_string())));
        assert!(!monitor.probe(&down).await);
        assert!(!monitor.is_online());
    }
}
