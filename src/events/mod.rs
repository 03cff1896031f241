//! Fan-out of [`Event`]s to connected clients.
//!
//! Each listener owns a bounded queue. [`Broadcaster::broadcast`] snapshots
//! the registry and pushes into every open queue without waiting, so a slow
//! client can only lose its own events and never stalls the transcoder.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use vidladder_common::Event;

/// Default number of events queued per listener.
pub const DEFAULT_LISTENER_BUFFER: usize = 256;

/// Identifies one connected listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiving side handed to a newly connected client.
pub struct Listener {
    pub id: ListenerId,
    pub events: mpsc::Receiver<Arc<Event>>,
}

/// Registry of connected listeners.
pub struct Broadcaster {
    listeners: RwLock<HashMap<ListenerId, mpsc::Sender<Arc<Event>>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl Broadcaster {
    /// Create a broadcaster whose listeners each queue up to `buffer` events.
    pub fn new(buffer: usize) -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Register a new listener.
    pub fn connect(&self) -> Listener {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.buffer);
        self.listeners.write().insert(id, tx);
        debug!(listener = %id, "Listener connected");
        Listener { id, events: rx }
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn disconnect(&self, id: ListenerId) -> bool {
        let removed = self.listeners.write().remove(&id).is_some();
        if removed {
            debug!(listener = %id, "Listener disconnected");
        }
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver `event` to every open listener.
    ///
    /// Returns how many listeners the event was queued for. Closed listeners
    /// are skipped and full queues drop the event for that listener only.
    pub fn broadcast(&self, event: Event) -> usize {
        let snapshot: Vec<(ListenerId, mpsc::Sender<Arc<Event>>)> = self
            .listeners
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let kind = event.kind();
        let event = Arc::new(event);
        let mut delivered = 0;

        for (id, tx) in snapshot {
            if tx.is_closed() {
                continue;
            }
            match tx.try_send(Arc::clone(&event)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(listener = %id, "Listener queue full, dropping {} event", kind);
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }

        if delivered == 0 {
            debug!("No listeners for {} event", kind);
        }
        delivered
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_LISTENER_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_listener_receives_broadcast() {
        let hub = Broadcaster::default();
        let mut a = hub.connect();
        let mut b = hub.connect();

        assert_eq!(hub.broadcast(Event::info("hello")), 2);

        assert_eq!(*a.events.recv().await.unwrap(), Event::info("hello"));
        assert_eq!(*b.events.recv().await.unwrap(), Event::info("hello"));
    }

    #[tokio::test]
    async fn disconnected_listener_is_not_delivered_to() {
        let hub = Broadcaster::default();
        let a = hub.connect();
        let mut b = hub.connect();

        assert!(hub.disconnect(a.id));
        assert!(!hub.disconnect(a.id));
        assert_eq!(hub.listener_count(), 1);

        assert_eq!(hub.broadcast(Event::speed(1.0)), 1);
        assert_eq!(*b.events.recv().await.unwrap(), Event::speed(1.0));
    }

    #[test]
    fn closed_listener_is_skipped_silently() {
        let hub = Broadcaster::default();
        let a = hub.connect();
        drop(a.events);

        assert_eq!(hub.broadcast(Event::info("nobody home")), 0);
        // Still registered until the connection reports its disconnect.
        assert_eq!(hub.listener_count(), 1);
    }

    #[test]
    fn no_replay_for_late_joiners() {
        let hub = Broadcaster::default();
        hub.broadcast(Event::info("early"));
        let mut late = hub.connect();
        assert!(late.events.try_recv().is_err());
    }

    #[test]
    fn full_queue_drops_only_for_slow_listener() {
        let hub = Broadcaster::new(2);
        let mut slow = hub.connect();
        let mut fast = hub.connect();

        hub.broadcast(Event::info("1"));
        hub.broadcast(Event::info("2"));
        assert_eq!(*fast.events.try_recv().unwrap(), Event::info("1"));
        assert_eq!(*fast.events.try_recv().unwrap(), Event::info("2"));

        // The slow queue is full; only the fast listener takes this one.
        assert_eq!(hub.broadcast(Event::info("3")), 1);
        assert_eq!(*fast.events.try_recv().unwrap(), Event::info("3"));

        assert_eq!(*slow.events.try_recv().unwrap(), Event::info("1"));
        assert_eq!(*slow.events.try_recv().unwrap(), Event::info("2"));
        assert!(slow.events.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_connect_and_broadcast() {
        let hub = Arc::new(Broadcaster::new(1024));
        let mut tasks = Vec::new();

        for _ in 0..8 {
            let hub = Arc::clone(&hub);
            tasks.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let listener = hub.connect();
                    hub.broadcast(Event::speed(2.0));
                    hub.disconnect(listener.id);
                }
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(hub.listener_count(), 0);
    }
}
