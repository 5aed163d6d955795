//! Fan-out status broadcast for the Gantry coordination engine.
//!
//! Every component reports progress by handing a [`StatusUpdate`] to the
//! [`EventNotifier`], which delivers it to all currently subscribed
//! listeners. A listener that fails delivery is dropped rather than allowed
//! to stall the publisher, so a broken observer can never block agent
//! progress.
//!
//! # Main types
//!
//! - [`Listener`] — Trait implemented by delivery transports.
//! - [`EventNotifier`] — The broadcast hub.
//! - [`ChannelListener`] — An in-process `mpsc`-backed listener.

use async_trait::async_trait;
use gantry_core::{GantryError, GantryResult, StatusUpdate};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

/// A transport that can receive broadcast status updates.
///
/// Any transport satisfying "deliver to the current listener, fail fast on
/// error" is conformant; the notifier handles removal of failing listeners.
#[async_trait]
pub trait Listener: Send + Sync {
    /// A stable name used in logs when this listener is dropped.
    fn name(&self) -> &str;

    /// Deliver one update. An `Err` causes the listener to be unsubscribed.
    async fn deliver(&self, update: StatusUpdate) -> GantryResult<()>;
}

/// Broadcast hub delivering status updates to zero or more listeners.
pub struct EventNotifier {
    listeners: RwLock<Vec<Arc<dyn Listener>>>,
}

impl EventNotifier {
    /// Creates a notifier with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Subscribe a listener to all future broadcasts.
    pub async fn subscribe(&self, listener: Arc<dyn Listener>) {
        let mut listeners = self.listeners.write().await;
        debug!(listener = listener.name(), "Listener subscribed");
        listeners.push(listener);
    }

    /// Number of currently subscribed listeners.
    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len()
    }

    /// Broadcast an update to all current listeners.
    ///
    /// Listeners whose delivery fails are logged and removed. Never returns
    /// an error to the caller: delivery is best-effort by contract.
    pub async fn broadcast(&self, update: StatusUpdate) {
        // Clone the list so a slow listener never holds the registration lock.
        let current: Vec<Arc<dyn Listener>> = self.listeners.read().await.clone();
        if current.is_empty() {
            return;
        }

        let mut failed: Vec<Arc<dyn Listener>> = Vec::new();
        for listener in &current {
            if let Err(e) = listener.deliver(update.clone()).await {
                warn!(
                    listener = listener.name(),
                    error = %e,
                    "Dropping listener after failed delivery"
                );
                failed.push(Arc::clone(listener));
            }
        }

        if !failed.is_empty() {
            let mut listeners = self.listeners.write().await;
            listeners.retain(|l| !failed.iter().any(|f| Arc::ptr_eq(l, f)));
        }
    }

    /// Unsubscribe every listener. Safe to call more than once.
    pub async fn close(&self) {
        let mut listeners = self.listeners.write().await;
        listeners.clear();
    }
}

impl Default for EventNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-process listener backed by a bounded `mpsc` channel.
///
/// Used by tests and embedded consumers. A dropped receiver turns delivery
/// into an error, which unsubscribes the listener on the next broadcast.
pub struct ChannelListener {
    name: String,
    tx: mpsc::Sender<StatusUpdate>,
}

impl ChannelListener {
    /// Creates a listener and the receiving half of its channel.
    pub fn new(name: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<StatusUpdate>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                name: name.into(),
                tx,
            },
            rx,
        )
    }
}

#[async_trait]
impl Listener for ChannelListener {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, update: StatusUpdate) -> GantryResult<()> {
        self.tx
            .send(update)
            .await
            .map_err(|_| GantryError::Orchestration(format!("listener '{}' closed", self.name)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use gantry_core::AgentState;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Listener that fails every delivery.
    struct FailingListener;

    #[async_trait]
    impl Listener for FailingListener {
        fn name(&self) -> &str {
            "failing"
        }

        async fn deliver(&self, _update: StatusUpdate) -> GantryResult<()> {
            Err(GantryError::Orchestration("always fails".to_string()))
        }
    }

    /// Listener that counts deliveries.
    struct CountingListener {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Listener for CountingListener {
        fn name(&self) -> &str {
            "counting"
        }

        async fn deliver(&self, _update: StatusUpdate) -> GantryResult<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_update() -> StatusUpdate {
        StatusUpdate::new("a1", AgentState::Running, 50, "halfway")
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_listeners() {
        let notifier = EventNotifier::new();
        let c1 = Arc::new(AtomicUsize::new(0));
        let c2 = Arc::new(AtomicUsize::new(0));
        notifier
            .subscribe(Arc::new(CountingListener { count: c1.clone() }))
            .await;
        notifier
            .subscribe(Arc::new(CountingListener { count: c2.clone() }))
            .await;

        notifier.broadcast(test_update()).await;
        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert_eq!(c2.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_listener_is_dropped() {
        let notifier = EventNotifier::new();
        let count = Arc::new(AtomicUsize::new(0));
        notifier.subscribe(Arc::new(FailingListener)).await;
        notifier
            .subscribe(Arc::new(CountingListener {
                count: count.clone(),
            }))
            .await;
        assert_eq!(notifier.listener_count().await, 2);

        notifier.broadcast(test_update()).await;
        assert_eq!(notifier.listener_count().await, 1);
        // The healthy listener survived and was delivered to.
        assert_eq!(count.load(Ordering::SeqCst), 1);

        notifier.broadcast(test_update()).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_broadcast_with_no_listeners_is_noop() {
        let notifier = EventNotifier::new();
        notifier.broadcast(test_update()).await;
        assert_eq!(notifier.listener_count().await, 0);
    }

    #[tokio::test]
    async fn test_channel_listener_receives_updates() {
        let notifier = EventNotifier::new();
        let (listener, mut rx) = ChannelListener::new("test", 16);
        notifier.subscribe(Arc::new(listener)).await;

        notifier.broadcast(test_update()).await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.agent_id, "a1");
        assert_eq!(received.progress, 50);
    }

    #[tokio::test]
    async fn test_channel_listener_dropped_receiver_unsubscribes() {
        let notifier = EventNotifier::new();
        let (listener, rx) = ChannelListener::new("dead", 1);
        notifier.subscribe(Arc::new(listener)).await;
        drop(rx);

        notifier.broadcast(test_update()).await;
        assert_eq!(notifier.listener_count().await, 0);
    }

    #[tokio::test]
    async fn test_close_clears_listeners() {
        let notifier = EventNotifier::new();
        let (listener, _rx) = ChannelListener::new("one", 4);
        notifier.subscribe(Arc::new(listener)).await;
        notifier.close().await;
        assert_eq!(notifier.listener_count().await, 0);
    }
}
