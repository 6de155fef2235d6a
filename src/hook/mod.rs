// ABOUTME: Hook system exposing the observable agent event stream.
// ABOUTME: Provides events, the Hook trait, a registry, and a tracing renderer.

mod recorder;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agent::AgentId;

pub use recorder::{EventRecorder, RecordedEvent, ResourceConflict, Trace, Violation};

/// Events emitted by agents as they move through their cycles.
///
/// Per agent the order is fixed; across agents events interleave freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RingEvent {
    /// Fired before the agent blocks on the arbiter.
    Requesting { agent: AgentId },

    /// Fired once the arbiter has granted a slot.
    Admitted { agent: AgentId },

    /// Fired after both resources are held, before the unit of work.
    Starting { agent: AgentId, cycle: usize },

    /// Fired after the counter increment, before any resource is released.
    Finishing { agent: AgentId, cycle: usize },

    /// Fired after resources are released, before the slot goes back.
    CycleComplete { agent: AgentId, count: usize },

    /// Fired once the quota is met.
    Done { agent: AgentId },
}

/// Discriminant of a [`RingEvent`], for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Requesting,
    Admitted,
    Starting,
    Finishing,
    CycleComplete,
    Done,
}

impl RingEvent {
    /// The agent that emitted this event.
    pub fn agent(&self) -> AgentId {
        match *self {
            RingEvent::Requesting { agent }
            | RingEvent::Admitted { agent }
            | RingEvent::Starting { agent, .. }
            | RingEvent::Finishing { agent, .. }
            | RingEvent::CycleComplete { agent, .. }
            | RingEvent::Done { agent } => agent,
        }
    }

    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            RingEvent::Requesting { .. } => EventKind::Requesting,
            RingEvent::Admitted { .. } => EventKind::Admitted,
            RingEvent::Starting { .. } => EventKind::Starting,
            RingEvent::Finishing { .. } => EventKind::Finishing,
            RingEvent::CycleComplete { .. } => EventKind::CycleComplete,
            RingEvent::Done { .. } => EventKind::Done,
        }
    }
}

/// Trait for implementing hooks.
///
/// Hooks are synchronous: they may be fired while an agent holds its
/// resources, and nothing is allowed to suspend there.
pub trait Hook: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &RingEvent);

    /// Optional: Filter which events this hook cares about.
    /// Default returns true for all events.
    fn accepts(&self, event: &RingEvent) -> bool {
        let _ = event;
        true
    }
}

/// Registry of hooks, assembled before a run and shared read-only by all agents.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookRegistry {
    /// Create a new empty hook registry.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Register a hook.
    pub fn register(&mut self, hook: impl Hook + 'static) {
        self.hooks.push(Arc::new(hook));
    }

    /// Register a hook wrapped in Arc.
    pub fn register_arc(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.push(hook);
    }

    /// Register a closure called for every event.
    pub fn on_event<F>(&mut self, f: F)
    where
        F: Fn(&RingEvent) + Send + Sync + 'static,
    {
        self.register(FnHook { callback: f });
    }

    /// Fire an event to all registered hooks that accept it.
    pub fn fire(&self, event: &RingEvent) {
        for hook in &self.hooks {
            if hook.accepts(event) {
                hook.on_event(event);
            }
        }
    }

    /// Get the number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

/// Hook wrapper for closures.
struct FnHook<F> {
    callback: F,
}

impl<F> Hook for FnHook<F>
where
    F: Fn(&RingEvent) + Send + Sync,
{
    fn on_event(&self, event: &RingEvent) {
        (self.callback)(event);
    }
}

/// Renders every event as a `tracing` log line at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHook;

impl Hook for TracingHook {
    fn on_event(&self, event: &RingEvent) {
        match *event {
            RingEvent::Requesting { agent } => info!(%agent, "requesting admission"),
            RingEvent::Admitted { agent } => info!(%agent, "admitted"),
            RingEvent::Starting { agent, cycle } => info!(%agent, cycle, "starting work"),
            RingEvent::Finishing { agent, cycle } => info!(%agent, cycle, "finishing work"),
            RingEvent::CycleComplete { agent, count } => info!(%agent, count, "cycle complete"),
            RingEvent::Done { agent } => info!(%agent, "done"),
        }
    }
}
