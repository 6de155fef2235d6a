// ABOUTME: Defines all error types for the ringlock library using thiserror.
// ABOUTME: Configuration errors are fatal at construction; RingError unifies them.

use std::time::Duration;

use crate::agent::AgentId;

/// Top-level error type for the ringlock library.
#[derive(Debug, thiserror::Error)]
pub enum RingError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Agent {agent} aborted: {source}")]
    AgentPanicked {
        agent: AgentId,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("Run task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Run did not complete within {0:?}")]
    Timeout(Duration),
}

/// Errors from validating or loading a ring configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("ring size must be at least 2, got {0}")]
    RingTooSmall(usize),

    #[error("admission capacity must be at least 1")]
    ZeroCapacity,

    #[error("admission capacity {capacity} must be below ring size {ring_size}")]
    CapacityNotBelowRingSize { capacity: usize, ring_size: usize },

    #[error("quota must be at least 1")]
    ZeroQuota,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
