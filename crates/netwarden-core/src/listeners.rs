// ── Listener registry ──
//
// Fan-out side of alert delivery. Consumers (websocket sessions,
// notification bridges) register an mpsc sender and receive every
// raised event, best effort: a full channel drops that listener's copy,
// a closed channel removes the listener.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::model::AlertEvent;

/// Identifies a registered listener for later removal.
pub type ListenerId = usize;

#[derive(Debug, Default)]
pub struct ListenerRegistry {
    listeners: DashMap<ListenerId, mpsc::Sender<AlertEvent>>,
    next_id: AtomicUsize,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sender: mpsc::Sender<AlertEvent>) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, sender);
        info!(listener_id = id, "alert listener registered");
        id
    }

    /// Returns whether a listener with this id was present.
    pub fn remove(&self, id: ListenerId) -> bool {
        let removed = self.listeners.remove(&id).is_some();
        if removed {
            info!(listener_id = id, "alert listener removed");
        }
        removed
    }

    pub fn clear(&self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Clone the event to every registered listener.
    ///
    /// Never blocks on a slow consumer: a full queue means that
    /// listener misses this event, a closed queue prunes the listener.
    pub fn broadcast(&self, event: &AlertEvent) {
        // Snapshot so pruning does not race the iteration.
        let targets: Vec<(ListenerId, mpsc::Sender<AlertEvent>)> = self
            .listeners
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut closed = Vec::new();
        for (id, sender) in targets {
            match sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(listener_id = id, "listener queue full, dropping event copy");
                }
                Err(TrySendError::Closed(_)) => closed.push(id),
            }
        }

        for id in closed {
            debug!(listener_id = id, "pruning closed listener");
            self.listeners.remove(&id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::AlertSeverity;
    use chrono::Utc;

    fn event() -> AlertEvent {
        AlertEvent {
            alert_id: -1,
            alert_time: Utc::now(),
            ack_time: None,
            requires_ack: false,
            severity: AlertSeverity::Warning,
            message: "'high cpu' Triggered for device='host42'".into(),
            target_id: 42,
            rule_id: 1,
            value: "[95 MORE_THAN 90]".into(),
            acked: true,
            ws_notified: false,
            db_notified: false,
        }
    }

    #[tokio::test]
    async fn every_listener_receives_a_copy() {
        let registry = ListenerRegistry::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        registry.register(tx_a);
        registry.register(tx_b);

        registry.broadcast(&event());

        assert_eq!(rx_a.recv().await.unwrap().rule_id, 1);
        assert_eq!(rx_b.recv().await.unwrap().rule_id, 1);
    }

    #[tokio::test]
    async fn closed_listeners_are_pruned() {
        let registry = ListenerRegistry::new();
        let (tx, rx) = mpsc::channel(1);
        registry.register(tx);
        drop(rx);

        registry.broadcast(&event());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn full_listener_is_kept_but_skipped() {
        let registry = ListenerRegistry::new();
        let (tx, mut rx) = mpsc::channel(1);
        registry.register(tx);

        registry.broadcast(&event());
        registry.broadcast(&event());

        assert_eq!(registry.len(), 1);
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn remove_reports_whether_the_id_existed() {
        let registry = ListenerRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let id = registry.register(tx);

        assert!(registry.remove(id));
        assert!(!registry.remove(id));

        let (tx, _rx2) = mpsc::channel(1);
        let next = registry.register(tx);
        // Ids are never reused.
        assert_ne!(next, id);
    }
}
