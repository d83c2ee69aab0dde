//! External bridge
//!
//! Subscribes a session to the pub/sub fabric as handlers get registered and
//! feeds received payloads through the normal dispatch pipeline. Messages are
//! only consumed here; the bridge never publishes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use herald_bridge::{PubSub, Subscription, ALL_SUBJECT};
use herald_core::EventTag;

use crate::WeakSession;

/// Per-session subscription table
pub struct ExternalBridge {
    pubsub: Arc<dyn PubSub>,
    queue_group: String,
    runtime: Handle,
    /// Receive loops by subject
    subscriptions: Mutex<HashMap<&'static str, JoinHandle<()>>>,
    /// Set while the all-subjects loop is running
    wildcard_live: Arc<AtomicBool>,
}

impl ExternalBridge {
    pub fn new(pubsub: Arc<dyn PubSub>, queue_group: impl Into<String>, runtime: Handle) -> Self {
        ExternalBridge {
            pubsub,
            queue_group: queue_group.into(),
            runtime,
            subscriptions: Mutex::new(HashMap::new()),
            wildcard_live: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subject carrying events of `tag`
    pub fn subject_for(tag: EventTag) -> &'static str {
        if tag.is_any() {
            ALL_SUBJECT
        } else {
            tag.as_str()
        }
    }

    pub fn queue_group(&self) -> &str {
        &self.queue_group
    }

    /// Subscribe to `tag` unless already subscribed
    ///
    /// Returns whether a new subscription was started. A failed subscription
    /// is logged and left unrecorded so the next registration retries it.
    pub fn ensure_subscribed(&self, tag: EventTag, session: WeakSession) -> bool {
        let subject = Self::subject_for(tag);
        let mut subscriptions = self.subscriptions.lock();
        if let Some(existing) = subscriptions.get(subject) {
            if !existing.is_finished() {
                return false;
            }
        }

        let subscription = match self.pubsub.queue_subscribe(subject, &self.queue_group) {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(subject, queue = %self.queue_group, error = %e, "bridge subscription failed");
                return false;
            }
        };

        if subscription.is_wildcard() {
            self.wildcard_live.store(true, Ordering::Release);
        }
        let wildcard_live = Arc::clone(&self.wildcard_live);
        let task = self
            .runtime
            .spawn(receive_loop(subscription, session, wildcard_live));
        subscriptions.insert(subject, task);

        info!(subject, queue = %self.queue_group, "bridge subscribed");
        true
    }

    pub fn is_subscribed(&self, tag: EventTag) -> bool {
        self.subscriptions
            .lock()
            .get(Self::subject_for(tag))
            .is_some_and(|task| !task.is_finished())
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .lock()
            .values()
            .filter(|task| !task.is_finished())
            .count()
    }
}

impl Drop for ExternalBridge {
    fn drop(&mut self) {
        for (_, task) in self.subscriptions.get_mut().drain() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for ExternalBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalBridge")
            .field("queue_group", &self.queue_group)
            .field("subscriptions", &self.subscription_count())
            .finish_non_exhaustive()
    }
}

/// Drain one subscription into the session
///
/// Messages are handled one at a time on the blocking pool, so a
/// subscription delivers in order. A tag loop stands down while the
/// all-subjects loop is live; otherwise a message would be handled twice.
async fn receive_loop(mut subscription: Subscription, session: WeakSession, wildcard_live: Arc<AtomicBool>) {
    let wildcard = subscription.is_wildcard();

    while let Some(message) = subscription.next().await {
        if !wildcard && wildcard_live.load(Ordering::Acquire) {
            continue;
        }
        let Some(strong) = session.upgrade() else {
            break;
        };

        let subject = message.subject.clone();
        match tokio::task::spawn_blocking(move || strong.handle_bridge_message(message)).await {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => debug!(%subject, "bridge message for unknown event dropped"),
            Ok(Err(e)) => warn!(%subject, error = %e, "bridge message dropped"),
            Err(e) => warn!(%subject, error = %e, "bridge handler task failed"),
        }
    }

    if wildcard {
        wildcard_live.store(false, Ordering::Release);
    }
    debug!(subject = subscription.subject(), "bridge subscription closed");
}
