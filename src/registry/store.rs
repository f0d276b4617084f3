//! Subscriber registry implementation
//!
//! Tracks the set of live delivery channels and copies each raw frame to
//! every one of them. Add/remove take the write lock; fan-out takes the read
//! lock, so a single fan-out call always sees a consistent subscriber set —
//! a frame delivered concurrently with an add/remove reaches either all
//! subscribers present before the mutation or all present after, never a
//! torn subset.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, RwLock};

use super::config::RegistryConfig;
use super::subscriber::{EnqueueOutcome, SubscriberEntry, SubscriberHandle, SubscriberStats};
use crate::stats::BridgeStats;

/// Central registry of active subscribers
///
/// Thread-safe via `RwLock`. Fan-out is the hot path and only needs read
/// access; per-entry counters are atomics.
pub struct SubscriberRegistry {
    /// Map of subscriber id to entry
    subscribers: RwLock<HashMap<u64, SubscriberEntry>>,

    /// Next subscriber id to allocate
    next_id: AtomicU64,

    /// Configuration
    config: RegistryConfig,

    /// Shared bridge counters
    stats: Arc<BridgeStats>,
}

impl SubscriberRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
            stats: Arc::new(BridgeStats::new()),
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the shared bridge counters
    pub fn stats(&self) -> &Arc<BridgeStats> {
        &self.stats
    }

    /// Register a new subscriber
    ///
    /// Returns the handle used to deregister and the receiving half of the
    /// subscriber's frame queue. The caller owns both; dropping the receiver
    /// without calling [`remove`](Self::remove) is tolerated (the entry is
    /// pruned on the next fan-out) but handlers should deregister explicitly.
    pub async fn add(&self) -> (SubscriberHandle, mpsc::Receiver<Bytes>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.config.queue_capacity);

        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(id, SubscriberEntry::new(tx));

        self.stats.total_subscribers.fetch_add(1, Ordering::Relaxed);
        self.stats
            .active_subscribers
            .store(subscribers.len() as u64, Ordering::Relaxed);

        tracing::info!(
            subscriber_id = id,
            active = subscribers.len(),
            "Subscriber registered"
        );

        (SubscriberHandle(id), rx)
    }

    /// Deregister a subscriber
    ///
    /// Idempotent: removing an already-removed handle is a no-op, which keeps
    /// double cleanup on error paths harmless.
    pub async fn remove(&self, handle: SubscriberHandle) {
        let mut subscribers = self.subscribers.write().await;

        if subscribers.remove(&handle.0).is_some() {
            self.stats
                .active_subscribers
                .store(subscribers.len() as u64, Ordering::Relaxed);

            tracing::info!(
                subscriber_id = handle.0,
                active = subscribers.len(),
                "Subscriber removed"
            );
        } else {
            tracing::debug!(subscriber_id = handle.0, "Subscriber already removed");
        }
    }

    /// Copy one raw frame to every registered subscriber
    ///
    /// Never blocks: a full queue drops the new frame for that subscriber
    /// only and marks it degraded. Subscribers whose receiver is gone are
    /// pruned afterwards.
    pub async fn fanout(&self, frame: Bytes) {
        let mut closed: Vec<u64> = Vec::new();

        {
            let subscribers = self.subscribers.read().await;

            for (&id, entry) in subscribers.iter() {
                match entry.enqueue(frame.clone()) {
                    EnqueueOutcome::Delivered => {
                        self.stats.frames_delivered.fetch_add(1, Ordering::Relaxed);
                    }
                    EnqueueOutcome::Dropped => {
                        self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            subscriber_id = id,
                            frame_len = frame.len(),
                            "Queue full, frame dropped for slow subscriber"
                        );
                    }
                    EnqueueOutcome::Closed => closed.push(id),
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in closed {
                if subscribers.remove(&id).is_some() {
                    tracing::debug!(subscriber_id = id, "Pruned closed subscriber");
                }
            }
            self.stats
                .active_subscribers
                .store(subscribers.len() as u64, Ordering::Relaxed);
        }
    }

    /// Close every subscriber channel and empty the registry
    ///
    /// Used when the device is gone. Dropping the senders wakes every
    /// handler blocked on `recv()` with channel-closed.
    pub async fn close_all(&self) {
        let mut subscribers = self.subscribers.write().await;
        let count = subscribers.len();
        subscribers.clear();

        self.stats.active_subscribers.store(0, Ordering::Relaxed);

        if count > 0 {
            tracing::info!(closed = count, "All subscriber channels closed");
        }
    }

    /// Number of currently registered subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Statistics for one subscriber, if still registered
    pub async fn subscriber_stats(&self, handle: SubscriberHandle) -> Option<SubscriberStats> {
        let subscribers = self.subscribers.read().await;
        subscribers.get(&handle.0).map(|entry| entry.stats())
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_remove() {
        let registry = SubscriberRegistry::new();

        let (handle, _rx) = registry.add().await;
        assert_eq!(registry.subscriber_count().await, 1);

        registry.remove(handle).await;
        assert_eq!(registry.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = SubscriberRegistry::new();

        let (handle, _rx) = registry.add().await;
        registry.remove(handle).await;
        registry.remove(handle).await; // double cleanup must be a no-op

        assert_eq!(registry.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_fanout_order_preserved_per_subscriber() {
        let registry = SubscriberRegistry::new();

        let (_h1, mut rx1) = registry.add().await;
        let (_h2, mut rx2) = registry.add().await;
        let (_h3, mut rx3) = registry.add().await;

        let frames: Vec<Bytes> = (0u8..5).map(|i| Bytes::from(vec![i; 4])).collect();
        for frame in &frames {
            registry.fanout(frame.clone()).await;
        }

        for rx in [&mut rx1, &mut rx2, &mut rx3] {
            for expected in &frames {
                assert_eq!(&rx.recv().await.unwrap(), expected);
            }
        }

        assert_eq!(registry.stats().snapshot().frames_delivered, 15);
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops_do_not_affect_fast_one() {
        let config = RegistryConfig::default().queue_capacity(2);
        let registry = SubscriberRegistry::with_config(config);

        let (slow, _slow_rx) = registry.add().await; // never drained
        let (_fast, mut fast_rx) = registry.add().await;

        for i in 0u8..4 {
            registry.fanout(Bytes::from(vec![i])).await;
        }

        // Fast subscriber got everything, in order
        for i in 0u8..4 {
            assert_eq!(fast_rx.try_recv().unwrap(), Bytes::from(vec![i]));
        }

        // Slow one kept the first two and dropped the rest
        let stats = registry.subscriber_stats(slow).await.unwrap();
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.dropped, 2);
        assert!(stats.degraded);

        assert_eq!(registry.stats().snapshot().frames_dropped, 2);
    }

    #[tokio::test]
    async fn test_dropped_receiver_pruned_on_fanout() {
        let registry = SubscriberRegistry::new();

        let (_h1, rx1) = registry.add().await;
        let (_h2, mut rx2) = registry.add().await;
        drop(rx1);

        registry.fanout(Bytes::from_static(b"frame")).await;

        assert_eq!(registry.subscriber_count().await, 1);
        assert_eq!(rx2.recv().await.unwrap(), Bytes::from_static(b"frame"));
    }

    #[tokio::test]
    async fn test_add_during_fanout_sees_all_or_nothing() {
        let registry = Arc::new(SubscriberRegistry::new());

        // Hammer add/remove concurrently with fan-out; every frame a
        // subscriber observes must be intact and in order.
        let churn = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for _ in 0..50 {
                    let (handle, _rx) = registry.add().await;
                    registry.remove(handle).await;
                }
            })
        };

        let (_h, mut rx) = registry.add().await;
        for i in 0u8..50 {
            registry.fanout(Bytes::from(vec![i; 8])).await;
        }
        churn.await.unwrap();

        let mut last = None;
        while let Ok(frame) = rx.try_recv() {
            assert_eq!(frame.len(), 8);
            let value = frame[0];
            assert!(frame.iter().all(|&b| b == value)); // never torn
            if let Some(prev) = last {
                assert!(value > prev);
            }
            last = Some(value);
        }
    }

    #[tokio::test]
    async fn test_close_all_unblocks_receivers() {
        let registry = Arc::new(SubscriberRegistry::new());

        let (_h, mut rx) = registry.add().await;
        let waiter = tokio::spawn(async move { rx.recv().await });

        registry.close_all().await;

        // recv() returns None once the sender is gone
        assert!(waiter.await.unwrap().is_none());
        assert_eq!(registry.subscriber_count().await, 0);
    }
}
