// ABOUTME: Ring configuration - sizes, admission capacity, quota, and strategies.
// ABOUTME: Validated once at construction; loadable from JSON files.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which arbiter backend bounds concurrent admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbiterKind {
    /// Counting gate guarded by a semaphore.
    #[default]
    Gate,
    /// Dedicated host task consuming admission and release messages.
    Host,
}

impl std::fmt::Display for ArbiterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArbiterKind::Gate => write!(f, "gate"),
            ArbiterKind::Host => write!(f, "host"),
        }
    }
}

/// Order in which an agent takes its two resources.
///
/// Release always happens in the reverse order. Safety does not depend on
/// this choice; the admission bound alone rules out circular wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquireOrder {
    /// Left then right; release right then left.
    #[default]
    LeftFirst,
    /// Right then left; release left then right.
    RightFirst,
}

impl std::fmt::Display for AcquireOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquireOrder::LeftFirst => write!(f, "left-first"),
            AcquireOrder::RightFirst => write!(f, "right-first"),
        }
    }
}

/// Construction parameters for a ring run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Number of resources and agents (N).
    pub ring_size: usize,
    /// Maximum agents admitted at once (K).
    pub capacity: usize,
    /// Work cycles each agent must complete (M).
    pub quota: usize,
    /// Arbiter backend.
    pub arbiter: ArbiterKind,
    /// Resource acquisition order.
    pub acquire_order: AcquireOrder,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            ring_size: 5,
            capacity: 2,
            quota: 3,
            arbiter: ArbiterKind::Gate,
            acquire_order: AcquireOrder::LeftFirst,
        }
    }
}

impl RingConfig {
    /// Create a new config builder starting from the reference values.
    pub fn builder() -> RingConfigBuilder {
        RingConfigBuilder::new()
    }

    /// Check the structural constraints: N >= 2, 1 <= K < N, M >= 1.
    ///
    /// K < N is what guarantees at least one agent sits outside the
    /// acquisition phase, so a full cycle of blocked holders cannot form.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ring_size < 2 {
            return Err(ConfigError::RingTooSmall(self.ring_size));
        }
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.capacity >= self.ring_size {
            return Err(ConfigError::CapacityNotBelowRingSize {
                capacity: self.capacity,
                ring_size: self.ring_size,
            });
        }
        if self.quota == 0 {
            return Err(ConfigError::ZeroQuota);
        }
        Ok(())
    }

    /// Parse and validate a config from a JSON string.
    ///
    /// Missing fields take their default values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: RingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

/// Builder for constructing ring configs.
pub struct RingConfigBuilder {
    config: RingConfig,
}

impl Default for RingConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RingConfigBuilder {
    /// Create a builder holding the reference values (N=5, K=2, M=3).
    pub fn new() -> Self {
        Self {
            config: RingConfig::default(),
        }
    }

    /// Set the ring size (number of agents and resources).
    pub fn ring_size(mut self, ring_size: usize) -> Self {
        self.config.ring_size = ring_size;
        self
    }

    /// Set the admission capacity.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Set the per-agent quota.
    pub fn quota(mut self, quota: usize) -> Self {
        self.config.quota = quota;
        self
    }

    /// Select the arbiter backend.
    pub fn arbiter(mut self, arbiter: ArbiterKind) -> Self {
        self.config.arbiter = arbiter;
        self
    }

    /// Select the acquisition order.
    pub fn acquire_order(mut self, order: AcquireOrder) -> Self {
        self.config.acquire_order = order;
        self
    }

    /// Validate and build the config.
    pub fn build(self) -> Result<RingConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod config_test;
