//! In-process pub/sub fabric
//!
//! Behaves like a broker with queue groups: a published message reaches every
//! group subscribed to its subject (or to [`ALL_SUBJECT`]) and, inside each
//! group, one member chosen round-robin. Used for tests and for wiring several
//! sessions together inside one process.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use herald_core::HeraldResult;

use crate::{BridgeMessage, MessageSender, PubSub, Subscription, ALL_SUBJECT};

/// Default per-subscription buffer
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
struct QueueGroup {
    members: Vec<MessageSender>,
    next: usize,
}

impl QueueGroup {
    /// Pick the next live member
    fn pick(&mut self) -> Option<&MessageSender> {
        self.members.retain(|tx| !tx.is_closed());
        if self.members.is_empty() {
            return None;
        }
        let idx = self.next % self.members.len();
        self.next = self.next.wrapping_add(1);
        self.members.get(idx)
    }
}

/// In-memory broker
pub struct MemoryPubSub {
    /// Queue groups keyed by (subject, queue)
    groups: Mutex<HashMap<(String, String), QueueGroup>>,
    capacity: usize,
}

impl MemoryPubSub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MemoryPubSub {
            groups: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Publish a payload. Returns how many subscriptions accepted it.
    pub fn publish(&self, subject: &str, payload: impl Into<Bytes>) -> usize {
        let payload = payload.into();
        let mut groups = self.groups.lock();
        let mut delivered = 0;

        for ((group_subject, queue), group) in groups.iter_mut() {
            if group_subject != subject && group_subject != ALL_SUBJECT {
                continue;
            }
            let Some(tx) = group.pick() else {
                continue;
            };
            match tx.try_send(BridgeMessage::new(subject, payload.clone())) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subject, queue = %queue, "bridge subscriber full, message dropped");
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }

        groups.retain(|_, g| !g.members.is_empty());
        delivered
    }

    /// Number of live subscriptions across all groups
    pub fn subscription_count(&self) -> usize {
        self.groups
            .lock()
            .values()
            .map(|g| g.members.iter().filter(|tx| !tx.is_closed()).count())
            .sum()
    }
}

impl Default for MemoryPubSub {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSub for MemoryPubSub {
    fn queue_subscribe(&self, subject: &str, queue: &str) -> HeraldResult<Subscription> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.groups
            .lock()
            .entry((subject.to_string(), queue.to_string()))
            .or_default()
            .members
            .push(tx);
        tracing::debug!(subject, queue, "memory subscription added");
        Ok(Subscription::new(subject, queue, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subject_and_wildcard() {
        let bus = MemoryPubSub::new();
        let mut typed = bus.queue_subscribe("READY", "a").unwrap();
        let mut all = bus.queue_subscribe(ALL_SUBJECT, "b").unwrap();
        let mut other = bus.queue_subscribe("GUILD_CREATE", "c").unwrap();

        assert_eq!(bus.publish("READY", "{}"), 2);

        assert_eq!(typed.next().await.unwrap().subject, "READY");
        assert_eq!(all.next().await.unwrap().subject, "READY");
        assert!(other.into_receiver().try_recv().is_err());
    }

    #[tokio::test]
    async fn test_queue_group_round_robin() {
        let bus = MemoryPubSub::new();
        let first = bus.queue_subscribe("READY", "workers").unwrap();
        let second = bus.queue_subscribe("READY", "workers").unwrap();

        for _ in 0..4 {
            assert_eq!(bus.publish("READY", "{}"), 1);
        }

        let mut first = first.into_receiver();
        let mut second = second.into_receiver();
        let mut counts = (0, 0);
        while first.try_recv().is_ok() {
            counts.0 += 1;
        }
        while second.try_recv().is_ok() {
            counts.1 += 1;
        }
        assert_eq!(counts, (2, 2));
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let bus = MemoryPubSub::new();
        let sub = bus.queue_subscribe("READY", "workers").unwrap();
        assert_eq!(bus.subscription_count(), 1);

        drop(sub);

        assert_eq!(bus.publish("READY", "{}"), 0);
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn test_full_subscription_drops() {
        let bus = MemoryPubSub::with_capacity(1);
        let _sub = bus.queue_subscribe("READY", "workers").unwrap();

        assert_eq!(bus.publish("READY", "1"), 1);
        assert_eq!(bus.publish("READY", "2"), 0);
    }
}
