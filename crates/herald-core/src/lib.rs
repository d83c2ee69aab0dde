//! Herald Core - Fundamental gateway types
//!
//! This crate defines the types shared by every Herald crate:
//! - Identifiers (GuildId, RoleId, UserId, ChannelId, MessageId)
//! - The gateway object model (guilds, roles, members, messages)
//! - Event shapes, tags and the event catalog
//! - Error types

pub mod id;
pub mod model;
pub mod event;
pub mod error;

pub use id::*;
pub use model::*;
pub use event::*;
pub use error::*;
