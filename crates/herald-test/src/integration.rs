//! End-to-end Integration Test Suite
//!
//! Tests that verify the complete session flow:
//! - Gateway events through state, wildcard and tag phases
//! - Cross-process delivery over a shared pub/sub fabric
//! - Role moves against the cached guild and the remote service

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use herald_bridge::MemoryPubSub;
use herald_core::{Event, EventTag};
use herald_runtime::{Session, SessionConfig};

// ============================================================================
// SESSION CLUSTER
// ============================================================================

/// Several sessions sharing one pub/sub fabric and queue group,
/// standing in for a fleet of worker processes
pub struct SessionCluster {
    pub bus: Arc<MemoryPubSub>,
    pub sessions: Vec<Session>,
    received: Arc<Mutex<HashMap<usize, Vec<EventTag>>>>,
}

impl SessionCluster {
    /// Build `size` sessions that record every event they handle
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(size: usize, config: SessionConfig) -> Self {
        let bus = Arc::new(MemoryPubSub::new());
        let received: Arc<Mutex<HashMap<usize, Vec<EventTag>>>> = Arc::new(Mutex::new(HashMap::new()));

        let sessions = (0..size)
            .map(|idx| {
                let session = Session::builder()
                    .config(config.clone())
                    .pubsub(bus.clone())
                    .build();
                let log = Arc::clone(&received);
                let _handle = session.add_any_handler(move |_, event| {
                    log.lock().entry(idx).or_default().push(event.tag());
                });
                session
            })
            .collect();

        SessionCluster {
            bus,
            sessions,
            received,
        }
    }

    /// Publish a raw payload on the subject of `tag`
    pub fn publish(&self, tag: EventTag, payload: &str) -> usize {
        self.bus.publish(tag.as_str(), payload.to_string())
    }

    /// Events handled per session, in session order
    pub fn received_counts(&self) -> Vec<usize> {
        let received = self.received.lock();
        (0..self.sessions.len())
            .map(|idx| received.get(&idx).map_or(0, Vec::len))
            .collect()
    }

    pub fn total_received(&self) -> usize {
        self.received_counts().iter().sum()
    }

    /// Wait until `expected` events were handled across the cluster
    pub async fn wait_for_total(&self, expected: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.total_received() >= expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.total_received() >= expected
    }
}

/// Counts events of every tag seen by a session
#[derive(Clone, Default)]
pub struct EventCounter {
    counts: Arc<Mutex<HashMap<EventTag, usize>>>,
    total: Arc<AtomicUsize>,
}

impl EventCounter {
    pub fn new() -> Self {
        EventCounter::default()
    }

    /// Attach to every event of `session`
    pub fn attach(&self, session: &Session) {
        let counter = self.clone();
        let _handle = session.add_any_handler(move |_, event: &Event| counter.record(event.tag()));
    }

    pub fn record(&self, tag: EventTag) {
        *self.counts.lock().entry(tag).or_default() += 1;
        self.total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self, tag: EventTag) -> usize {
        self.counts.lock().get(&tag).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}
