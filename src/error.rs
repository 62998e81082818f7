//! Error types for market-memory.

use thiserror::Error;

use crate::memory::NodeId;

/// Result type alias using market-memory's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during memory operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Event was malformed, out of range, for another symbol, or out of order.
    /// The event is dropped; the store is unchanged.
    #[error("Invalid event: {reason}")]
    InvalidEvent { reason: String },

    /// A post-mutation consistency check failed. The node was restored to
    /// its prior state.
    #[error("Invariant violation on node {node_id}: {message}")]
    InvariantViolation { node_id: NodeId, message: String },

    /// No node with this id exists in any tier
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// Query arguments were out of range
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shard actor has shut down or dropped its reply channel
    #[error("Shard unavailable: {0}")]
    ShardUnavailable(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid event error.
    pub fn invalid_event(reason: impl Into<String>) -> Self {
        Self::InvalidEvent {
            reason: reason.into(),
        }
    }

    /// Create an invariant violation error.
    pub fn invariant_violation(node_id: NodeId, message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            node_id,
            message: message.into(),
        }
    }

    /// Create an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the error only affected a single event or node.
    ///
    /// Every variant is recoverable at the store level; this distinguishes
    /// per-event rejections from problems with the caller's setup.
    pub fn is_event_scoped(&self) -> bool {
        matches!(
            self,
            Self::InvalidEvent { .. } | Self::InvariantViolation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = Error::invalid_event("price must be positive");
        assert_eq!(err.to_string(), "Invalid event: price must be positive");

        let err = Error::invariant_violation(NodeId(7), "counter mismatch");
        assert_eq!(
            err.to_string(),
            "Invariant violation on node node#7: counter mismatch"
        );

        let err = Error::UnknownNode(NodeId(3));
        assert_eq!(err.to_string(), "Unknown node: node#3");
    }

    #[test]
    fn test_event_scoped() {
        assert!(Error::invalid_event("x").is_event_scoped());
        assert!(Error::invariant_violation(NodeId(1), "x").is_event_scoped());
        assert!(!Error::config("x").is_event_scoped());
        assert!(!Error::UnknownNode(NodeId(1)).is_event_scoped());
    }
}
