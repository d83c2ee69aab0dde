//! Herald State - Guild cache and role hierarchy management
//!
//! This crate implements:
//! - The guild state cache fed by gateway events
//! - Role hierarchy reordering
//! - Role edit/delete/move operations against the remote service

pub mod cache;
pub mod reorder;
pub mod roles;

pub use cache::*;
pub use reorder::*;
pub use roles::*;
