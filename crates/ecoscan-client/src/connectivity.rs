//! Network connectivity tracking.
//!
//! Connectivity is a single boolean published on a `watch` channel, so any
//! number of consumers can take a point-in-time reading or await changes.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Source of connectivity state.
pub trait ConnectivityObserver: Send + Sync {
    /// Point-in-time connectivity check.
    fn is_connected(&self) -> bool;

    /// Subscribe to connectivity changes.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Connectivity state driven by whoever owns the platform's network events.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    state: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(connected: bool) -> Self {
        let (state, _) = watch::channel(connected);
        Self {
            state: Arc::new(state),
        }
    }

    /// Publish a new connectivity reading. Returns whether the state changed.
    pub fn set_connected(&self, connected: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == connected {
                false
            } else {
                *current = connected;
                true
            }
        });
        if changed {
            if connected {
                info!("Network connection restored");
            } else {
                info!("Device went offline");
            }
        }
        changed
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityObserver for ConnectivityMonitor {
    fn is_connected(&self) -> bool {
        *self.state.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn reports_current_state() {
        let monitor = ConnectivityMonitor::new(false);
        assert!(!monitor.is_connected());
        assert!(monitor.set_connected(true));
        assert!(monitor.is_connected());
    }

    #[test]
    fn repeated_reading_is_not_a_change() {
        let monitor = ConnectivityMonitor::new(true);
        assert!(!monitor.set_connected(true));
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let monitor = ConnectivityMonitor::new(false);
        let mut rx = monitor.subscribe();

        monitor.set_connected(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
    }
}
