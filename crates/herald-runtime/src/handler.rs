//! Handler entries

use std::fmt;
use std::sync::Arc;

use herald_core::{Event, EventShape, EventTag};

use crate::Session;

/// Callback signature shared by all handlers
pub type HandlerFn = dyn Fn(&Session, &Event) + Send + Sync;

/// A registered callback
///
/// Entries are compared by pointer, so two identical closures stay
/// independently removable.
pub struct HandlerEntry {
    tag: EventTag,
    once: bool,
    callback: Box<HandlerFn>,
}

impl HandlerEntry {
    pub fn new(tag: EventTag, once: bool, callback: Box<HandlerFn>) -> Arc<Self> {
        Arc::new(HandlerEntry {
            tag,
            once,
            callback,
        })
    }

    pub fn tag(&self) -> EventTag {
        self.tag
    }

    pub fn is_once(&self) -> bool {
        self.once
    }

    #[inline]
    pub fn invoke(&self, session: &Session, event: &Event) {
        (self.callback)(session, event)
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("tag", &self.tag)
            .field("once", &self.once)
            .finish_non_exhaustive()
    }
}

/// Wrap a typed callback so it only sees events of its own shape
pub fn typed_handler<T, F>(f: F) -> Box<HandlerFn>
where
    T: EventShape,
    F: Fn(&Session, &T) + Send + Sync + 'static,
{
    Box::new(move |session, event| {
        if let Some(inner) = T::from_event(event) {
            f(session, inner)
        }
    })
}
