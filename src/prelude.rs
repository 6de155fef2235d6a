// ABOUTME: Prelude module - convenient imports for common use cases.
// ABOUTME: Use `use ringlock::prelude::*;` to get started quickly.

pub use crate::agent::{Agent, AgentId, AgentReport, AgentState, StateCell, WorkFn, noop_work};
pub use crate::config::{AcquireOrder, ArbiterKind, RingConfig, RingConfigBuilder};
pub use crate::coordinator::{
    Admission, Arbiter, ArbiterStats, Coordinator, Resource, ResourceGuard, Ring, RunHandle,
    RunReport,
};
pub use crate::error::{ConfigError, RingError};
pub use crate::hook::{
    EventKind, EventRecorder, Hook, HookRegistry, RecordedEvent, ResourceConflict, RingEvent,
    Trace, TracingHook, Violation,
};
