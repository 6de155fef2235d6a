// ABOUTME: Root module for ringlock - bounded arbitration over a ring of shared resources.
// ABOUTME: Re-exports all public types from submodules.

pub mod agent;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod hook;
pub mod prelude;

pub use error::{ConfigError, RingError};
