//! Error types for Herald

use thiserror::Error;

use crate::{GuildId, RoleId};

/// Core Herald errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeraldError {
    // Registration errors
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    // Hierarchy errors
    #[error("Role position out of bounds: {position}")]
    PositionBounds { position: i32 },

    #[error("The default role cannot be moved")]
    UnmovableDefaultRole,

    #[error("Role not found: {0:?}")]
    RoleNotFound(RoleId),

    #[error("Guild not found: {0:?}")]
    GuildNotFound(GuildId),

    // Collaborator errors
    #[error("Remote call failed: {0}")]
    Remote(String),

    #[error("Failed to decode {tag} event: {reason}")]
    Decode { tag: String, reason: String },

    #[error("Subscription to {subject} failed: {reason}")]
    Subscribe { subject: String, reason: String },

    #[error("State update failed: {0}")]
    StateUpdate(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl HeraldError {
    /// Was this failure reported by the remote mutation service?
    pub fn is_remote(&self) -> bool {
        matches!(self, HeraldError::Remote(_))
    }
}

/// Result type for Herald operations
pub type HeraldResult<T> = Result<T, HeraldError>;
