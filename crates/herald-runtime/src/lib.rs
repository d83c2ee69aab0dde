//! Herald Runtime - Sessions and event dispatch
//!
//! This crate implements the event pipeline of a session:
//! 1. Session bookkeeping (session id, guild back-references)
//! 2. Internal state update
//! 3. Wildcard handlers
//! 4. Tag handlers
//!
//! Handlers live in a per-session registry. With bridging enabled, the
//! session also subscribes to a pub/sub fabric for every registered tag and
//! runs bridged events through the same pipeline.

pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod handler;
pub mod logging;
pub mod registry;
pub mod session;

pub use bridge::*;
pub use config::*;
pub use dispatch::*;
pub use handler::*;
pub use logging::*;
pub use registry::*;
pub use session::*;
