//! Event dispatch
//!
//! One pass over a snapshot of the registry: the internal state hook first,
//! then the wildcard handlers, then the handlers registered for the event's
//! own tag.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tracing::{debug, error, trace};

use herald_core::{Event, EventTag, StateUpdate};

use crate::{DispatchMode, HandlerEntry, HandlerRegistry, Session};

/// Dispatch statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events taken through the pipeline
    pub events: u64,
    pub handlers_invoked: u64,
    /// One-shot handlers consumed
    pub once_fired: u64,
    pub handler_panics: u64,
    /// State hook failures (logged, non-fatal)
    pub state_errors: u64,
    pub bridge_received: u64,
    /// Bridge messages with an unknown subject or a bad payload
    pub bridge_dropped: u64,
}

#[derive(Debug, Default)]
pub(crate) struct DispatchCounters {
    events: AtomicU64,
    handlers_invoked: AtomicU64,
    once_fired: AtomicU64,
    handler_panics: AtomicU64,
    state_errors: AtomicU64,
    bridge_received: AtomicU64,
    bridge_dropped: AtomicU64,
}

impl DispatchCounters {
    pub(crate) fn event(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bridge_received(&self) {
        self.bridge_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bridge_dropped(&self) {
        self.bridge_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            events: self.events.load(Ordering::Relaxed),
            handlers_invoked: self.handlers_invoked.load(Ordering::Relaxed),
            once_fired: self.once_fired.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
            state_errors: self.state_errors.load(Ordering::Relaxed),
            bridge_received: self.bridge_received.load(Ordering::Relaxed),
            bridge_dropped: self.bridge_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Runs registered handlers for events
pub struct Dispatcher {
    registry: HandlerRegistry,
    state: Option<Arc<dyn StateUpdate>>,
    mode: DispatchMode,
    runtime: Option<Handle>,
    counters: Arc<DispatchCounters>,
}

impl Dispatcher {
    /// Create a dispatcher
    ///
    /// Concurrent mode needs a runtime handle; without one the dispatcher
    /// runs handlers inline.
    pub fn new(mode: DispatchMode, runtime: Option<Handle>, state: Option<Arc<dyn StateUpdate>>) -> Self {
        let mode = match (mode, &runtime) {
            (DispatchMode::Concurrent, None) => {
                tracing::warn!("no tokio runtime available, dispatching handlers synchronously");
                DispatchMode::Sync
            }
            (mode, _) => mode,
        };
        Dispatcher {
            registry: HandlerRegistry::new(),
            state,
            mode,
            runtime,
            counters: Arc::new(DispatchCounters::default()),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    pub(crate) fn counters(&self) -> &DispatchCounters {
        &self.counters
    }

    /// Run the internal state hook
    ///
    /// Always synchronous: it has finished before any user handler is
    /// launched. Failures are logged and counted, never propagated.
    pub fn dispatch_internal(&self, event: &Event) {
        let Some(state) = &self.state else {
            return;
        };
        if let Err(e) = state.apply(event) {
            self.counters.state_errors.fetch_add(1, Ordering::Relaxed);
            debug!(tag = %event.tag(), error = %e, "state update failed");
        }
    }

    /// Claim the entries for one phase, counting the one-shot ones consumed
    fn claim(&self, tag: EventTag) -> Vec<Arc<HandlerEntry>> {
        let entries = self.registry.snapshot(tag);
        let once = entries.iter().filter(|e| e.is_once()).count() as u64;
        self.counters.once_fired.fetch_add(once, Ordering::Relaxed);
        entries
    }

    /// Invoke every handler registered under `tag`
    ///
    /// Returns the number of handlers launched. In concurrent mode they may
    /// still be running when this returns.
    pub fn dispatch(&self, session: &Session, tag: EventTag, event: &Arc<Event>) -> usize {
        let entries = self.claim(tag);
        if entries.is_empty() {
            return 0;
        }
        trace!(%tag, handlers = entries.len(), "dispatching");

        let launched = entries.len();
        match (self.mode, &self.runtime) {
            (DispatchMode::Concurrent, Some(runtime)) => {
                for entry in entries {
                    let session = session.clone();
                    let event = Arc::clone(event);
                    let counters = Arc::clone(&self.counters);
                    runtime.spawn_blocking(move || invoke(&counters, &entry, &session, &event));
                }
            }
            _ => {
                for entry in &entries {
                    invoke(&self.counters, entry, session, event);
                }
            }
        }
        launched
    }

    /// Run the wildcard phase, then the phase for the event's own tag
    ///
    /// Both phases are claimed up front. In concurrent mode one task drives
    /// the event: wildcard handlers run in parallel and all of them finish
    /// before any tag handler starts. The caller does not wait for either.
    pub fn dispatch_event(&self, session: &Session, event: &Arc<Event>) -> usize {
        let tag = event.tag();
        let wildcard = self.claim(EventTag::ANY);
        let tagged = self.claim(tag);
        let launched = wildcard.len() + tagged.len();
        if launched == 0 {
            return 0;
        }
        trace!(%tag, wildcard = wildcard.len(), tagged = tagged.len(), "dispatching event");

        match (self.mode, &self.runtime) {
            (DispatchMode::Concurrent, Some(runtime)) => {
                let session = session.clone();
                let event = Arc::clone(event);
                let counters = Arc::clone(&self.counters);
                runtime.spawn(async move {
                    run_phase(&counters, wildcard, &session, &event).await;
                    run_phase(&counters, tagged, &session, &event).await;
                });
            }
            _ => {
                for entry in wildcard.iter().chain(&tagged) {
                    invoke(&self.counters, entry, session, event);
                }
            }
        }
        launched
    }
}

/// Run one phase on the blocking pool and wait for every handler in it
async fn run_phase(
    counters: &Arc<DispatchCounters>,
    entries: Vec<Arc<HandlerEntry>>,
    session: &Session,
    event: &Arc<Event>,
) {
    if entries.is_empty() {
        return;
    }
    let mut phase = JoinSet::new();
    for entry in entries {
        let session = session.clone();
        let event = Arc::clone(event);
        let counters = Arc::clone(counters);
        phase.spawn_blocking(move || invoke(&counters, &entry, &session, &event));
    }
    while let Some(joined) = phase.join_next().await {
        if let Err(e) = joined {
            debug!(error = %e, "handler task failed");
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("mode", &self.mode)
            .field("state_hook", &self.state.is_some())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Call one handler, containing any panic it raises
fn invoke(counters: &DispatchCounters, entry: &HandlerEntry, session: &Session, event: &Event) {
    counters.handlers_invoked.fetch_add(1, Ordering::Relaxed);
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| entry.invoke(session, event))) {
        counters.handler_panics.fetch_add(1, Ordering::Relaxed);
        error!(
            tag = %entry.tag(),
            event = %event.tag(),
            panic = %panic_message(payload.as_ref()),
            "event handler panicked"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use herald_core::{EventShape, HeraldError, HeraldResult, MessageCreate, TypingStart};

    use crate::{SessionConfig, WeakSession};

    struct FailingState;

    impl StateUpdate for FailingState {
        fn apply(&self, _event: &Event) -> HeraldResult<()> {
            Err(HeraldError::StateUpdate("boom".into()))
        }
    }

    fn sync_session() -> Session {
        Session::builder()
            .config(SessionConfig::default().sync_events().with_state_tracking(false))
            .build()
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u32), "unknown panic");
    }

    #[test]
    fn test_concurrent_without_runtime_falls_back() {
        let dispatcher = Dispatcher::new(DispatchMode::Concurrent, None, None);
        assert_eq!(dispatcher.mode(), DispatchMode::Sync);
    }

    #[test]
    fn test_state_errors_are_counted() {
        let dispatcher = Dispatcher::new(DispatchMode::Sync, None, Some(Arc::new(FailingState)));
        dispatcher.dispatch_internal(&MessageCreate::default().into_event());
        assert_eq!(dispatcher.stats().state_errors, 1);
    }

    #[test]
    fn test_dispatch_only_reaches_matching_tag() {
        let session = sync_session();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _handle = session.add_handler::<TypingStart, _>(move |_, _| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        let event = Arc::new(MessageCreate::default().into_event());
        let launched = session.dispatcher().dispatch(&session, MessageCreate::TAG, &event);

        assert_eq!(launched, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dispatch_event_runs_wildcard_then_tag() {
        let session = sync_session();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let o = Arc::clone(&order);
        let _tag = session.add_handler::<MessageCreate, _>(move |_, _| o.lock().push("tag"));
        let o = Arc::clone(&order);
        let _any = session.add_any_handler_once(move |_, _| o.lock().push("any"));

        let event = Arc::new(MessageCreate::default().into_event());
        assert_eq!(session.dispatcher().dispatch_event(&session, &event), 2);
        assert_eq!(*order.lock(), vec!["any", "tag"]);
        assert_eq!(session.stats().once_fired, 1);

        assert_eq!(session.dispatcher().dispatch_event(&session, &event), 1);
    }

    #[test]
    fn test_panicking_handler_does_not_stop_pass() {
        let session = sync_session();
        let hits = Arc::new(AtomicUsize::new(0));
        let _bad = session.add_handler::<MessageCreate, _>(|_, _| panic!("handler failure"));
        let h = Arc::clone(&hits);
        let _good = session.add_handler::<MessageCreate, _>(move |_, _| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        session.handle_event(MessageCreate::default().into_event());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let stats = session.stats();
        assert_eq!(stats.handler_panics, 1);
        assert_eq!(stats.handlers_invoked, 2);
    }

    #[test]
    fn test_weak_session_does_not_keep_alive() {
        let session = sync_session();
        let weak: WeakSession = session.downgrade();
        assert!(weak.upgrade().is_some());
        drop(session);
        assert!(weak.upgrade().is_none());
    }
}
