//! Herald session - handler registration and the event pipeline

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{error, trace};

use herald_bridge::{BridgeMessage, PubSub};
use herald_core::{Event, EventCatalog, EventShape, EventTag, HeraldError, HeraldResult, StateUpdate};
use herald_state::StateCache;

use crate::{
    typed_handler, DispatchStats, Dispatcher, ExternalBridge, HandlerFn, RemoveHandle, SessionConfig,
};

struct SessionInner {
    config: SessionConfig,
    catalog: EventCatalog,
    dispatcher: Dispatcher,
    bridge: Option<ExternalBridge>,
    cache: Option<Arc<StateCache>>,
    session_id: RwLock<Option<String>>,
}

/// A connected client session
///
/// Cheap to clone; every clone shares the same catalog, registry and bridge.
/// Sessions are independent of one another.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

/// Non-owning reference to a [`Session`]
#[derive(Clone, Default)]
pub struct WeakSession {
    inner: Weak<SessionInner>,
}

impl WeakSession {
    pub fn upgrade(&self) -> Option<Session> {
        self.inner.upgrade().map(|inner| Session { inner })
    }
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Session with the default configuration on the current runtime, if any
    pub fn new() -> Self {
        SessionBuilder::default().build()
    }

    pub fn downgrade(&self) -> WeakSession {
        WeakSession {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn catalog(&self) -> &EventCatalog {
        &self.inner.catalog
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn bridge(&self) -> Option<&ExternalBridge> {
        self.inner.bridge.as_ref()
    }

    /// Guild cache, when state tracking is on
    pub fn cache(&self) -> Option<&Arc<StateCache>> {
        self.inner.cache.as_ref()
    }

    /// Session id from the last Ready event
    pub fn session_id(&self) -> Option<String> {
        self.inner.session_id.read().clone()
    }

    pub fn stats(&self) -> DispatchStats {
        self.inner.dispatcher.stats()
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Run `f` on every event of shape `T`
    pub fn add_handler<T, F>(&self, f: F) -> RemoveHandle
    where
        T: EventShape,
        F: Fn(&Session, &T) + Send + Sync + 'static,
    {
        self.register(T::TAG, false, typed_handler::<T, F>(f))
    }

    /// Run `f` on the next event of shape `T` only
    pub fn add_handler_once<T, F>(&self, f: F) -> RemoveHandle
    where
        T: EventShape,
        F: Fn(&Session, &T) + Send + Sync + 'static,
    {
        self.register(T::TAG, true, typed_handler::<T, F>(f))
    }

    /// Run `f` on every event
    pub fn add_any_handler<F>(&self, f: F) -> RemoveHandle
    where
        F: Fn(&Session, &Event) + Send + Sync + 'static,
    {
        self.register(EventTag::ANY, false, Box::new(f))
    }

    pub fn add_any_handler_once<F>(&self, f: F) -> RemoveHandle
    where
        F: Fn(&Session, &Event) + Send + Sync + 'static,
    {
        self.register(EventTag::ANY, true, Box::new(f))
    }

    /// Register by shape name, for callers that only know the name at runtime
    ///
    /// An unknown name is logged and yields a handle that removes nothing.
    pub fn add_handler_by_name<F>(&self, name: &str, once: bool, f: F) -> RemoveHandle
    where
        F: Fn(&Session, &Event) + Send + Sync + 'static,
    {
        match self.inner.catalog.tag_for(name) {
            Some(tag) => self.register(tag, once, Box::new(f)),
            None => {
                let err = HeraldError::UnknownEventType(name.to_string());
                error!(error = %err, "handler registration rejected");
                RemoveHandle::noop()
            }
        }
    }

    fn register(&self, tag: EventTag, once: bool, callback: Box<HandlerFn>) -> RemoveHandle {
        let handle = self.inner.dispatcher.registry().register(tag, once, callback);
        if let Some(bridge) = &self.inner.bridge {
            bridge.ensure_subscribed(tag, self.downgrade());
        }
        trace!(%tag, once, "handler registered");
        handle
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    /// Take one event through the pipeline
    ///
    /// Stage 1 fills in session bookkeeping, stage 2 runs the state hook,
    /// stage 3 the wildcard handlers and stage 4 the handlers for the event's
    /// own tag.
    pub fn handle_event(&self, mut event: Event) {
        let dispatcher = &self.inner.dispatcher;
        dispatcher.counters().event();

        // Stage 1: Session bookkeeping
        self.prepare(&mut event);

        // Stage 2: Internal state
        dispatcher.dispatch_internal(&event);

        // Stage 3 and 4: Wildcard handlers, then tag handlers
        dispatcher.dispatch_event(self, &Arc::new(event));
    }

    fn prepare(&self, event: &mut Event) {
        match event {
            Event::Ready(ready) => {
                *self.inner.session_id.write() = Some(ready.session_id.clone());
                for guild in &mut ready.guilds {
                    guild.stamp_ids();
                }
            }
            Event::GuildCreate(e) => e.guild.stamp_ids(),
            Event::GuildUpdate(e) => e.guild.stamp_ids(),
            _ => {}
        }
    }

    /// Decode a bridged payload and handle it as if received locally
    ///
    /// `Ok(false)` means the subject names no known event and the message
    /// was dropped. Decode failures are returned; there is no retry.
    pub fn handle_bridge_message(&self, message: BridgeMessage) -> HeraldResult<bool> {
        let counters = self.inner.dispatcher.counters();
        counters.bridge_received();

        if !self.inner.catalog.contains(&message.subject) {
            counters.bridge_dropped();
            return Ok(false);
        }
        let event = match self.inner.catalog.decode(&message.subject, &message.payload) {
            Ok(event) => event,
            Err(e) => {
                counters.bridge_dropped();
                return Err(e);
            }
        };

        self.handle_event(event);
        Ok(true)
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id())
            .field("dispatcher", &self.inner.dispatcher)
            .field("bridge", &self.inner.bridge)
            .finish_non_exhaustive()
    }
}

/// Session builder
#[derive(Default)]
pub struct SessionBuilder {
    config: SessionConfig,
    catalog: Option<EventCatalog>,
    state: Option<Arc<dyn StateUpdate>>,
    pubsub: Option<Arc<dyn PubSub>>,
    runtime: Option<Handle>,
}

impl SessionBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the standard event catalog
    pub fn catalog(mut self, catalog: EventCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Use a custom state hook instead of the built-in guild cache
    pub fn state(mut self, state: Arc<dyn StateUpdate>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn pubsub(mut self, pubsub: Arc<dyn PubSub>) -> Self {
        self.pubsub = Some(pubsub);
        self
    }

    /// Runtime for concurrent dispatch and bridge tasks. Defaults to the
    /// runtime the session is built on.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Session {
        let SessionBuilder {
            config,
            catalog,
            state,
            pubsub,
            runtime,
        } = self;
        let runtime = runtime.or_else(|| Handle::try_current().ok());

        let cache = match (&state, config.track_state) {
            (None, true) => Some(Arc::new(StateCache::new())),
            _ => None,
        };
        let state = state.or_else(|| {
            cache
                .as_ref()
                .map(|cache| Arc::clone(cache) as Arc<dyn StateUpdate>)
        });

        let bridge = match (config.bridge.enabled, pubsub, &runtime) {
            (true, Some(pubsub), Some(runtime)) => Some(ExternalBridge::new(
                pubsub,
                config.bridge.queue_group.clone(),
                runtime.clone(),
            )),
            (true, None, _) => {
                tracing::warn!("bridge enabled without a pub/sub fabric, bridging disabled");
                None
            }
            (true, Some(_), None) => {
                tracing::warn!("bridge enabled without a tokio runtime, bridging disabled");
                None
            }
            (false, _, _) => None,
        };

        let dispatcher = Dispatcher::new(config.dispatch_mode, runtime, state);

        Session {
            inner: Arc::new(SessionInner {
                config,
                catalog: catalog.unwrap_or_else(EventCatalog::standard),
                dispatcher,
                bridge,
                cache,
                session_id: RwLock::new(None),
            }),
        }
    }
}
