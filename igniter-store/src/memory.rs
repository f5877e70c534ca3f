use async_trait::async_trait;
use dashmap::DashMap;
use igniter_core::{FrameworkError, Store};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::debug;

/// Per-subscriber channel capacity. A slow subscriber drops messages
/// rather than blocking publishers.
const SUBSCRIBER_BUFFER: usize = 64;

struct StoredValue {
    value: Value,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-process store: a concurrent map plus channel-based pub/sub.
///
/// Expired keys are dropped lazily on read. Pub/sub delivery is
/// best-effort and in-process only; cross-process fan-out is what the
/// networked adapters are for.
#[derive(Default)]
pub struct MemoryStore {
    values: DashMap<String, StoredValue>,
    subscribers: DashMap<String, Vec<mpsc::Sender<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) keys.
    pub fn len(&self) -> usize {
        self.values.iter().filter(|e| !e.value().is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of subscribers currently attached to a channel.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.subscribers
            .get(channel)
            .map(|senders| senders.iter().filter(|s| !s.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, FrameworkError> {
        if let Some(entry) = self.values.get(key) {
            if entry.is_expired() {
                drop(entry);
                self.values.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<(), FrameworkError> {
        self.values.insert(
            key.to_string(),
            StoredValue {
                value,
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), FrameworkError> {
        self.values.remove(key);
        Ok(())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), FrameworkError> {
        let Some(mut senders) = self.subscribers.get_mut(channel) else {
            return Ok(());
        };

        let mut delivered = 0usize;
        senders.retain(|sender| {
            if sender.is_closed() {
                return false;
            }
            if sender.try_send(message.to_string()).is_ok() {
                delivered += 1;
            }
            true
        });
        debug!(channel = %channel, delivered, "Store publish");
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<mpsc::Receiver<String>, FrameworkError> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_set_delete() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", json!({"v": 1}), None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"v": 1})));

        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = MemoryStore::new();
        store
            .set("k", json!(1), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!(1)));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe("events").await.unwrap();

        store.publish("events", "hello").await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let store = MemoryStore::new();
        store.publish("nobody", "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let store = MemoryStore::new();
        let rx = store.subscribe("events").await.unwrap();
        assert_eq!(store.subscriber_count("events"), 1);

        drop(rx);
        store.publish("events", "x").await.unwrap();
        assert_eq!(store.subscriber_count("events"), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_all_receive() {
        let store = MemoryStore::new();
        let mut rx1 = store.subscribe("events").await.unwrap();
        let mut rx2 = store.subscribe("events").await.unwrap();

        store.publish("events", "m").await.unwrap();
        assert_eq!(rx1.recv().await.as_deref(), Some("m"));
        assert_eq!(rx2.recv().await.as_deref(), Some("m"));
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe("a").await.unwrap();
        store.publish("b", "m").await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
