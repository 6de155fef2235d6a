// ABOUTME: Event recorder hook and trace analysis over the recorded stream.
// ABOUTME: Checks per-agent quotas, the admission bound, and resource exclusion.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use super::{EventKind, Hook, RingEvent};
use crate::agent::AgentId;
use crate::config::RingConfig;

/// One event with its position in the global order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordedEvent {
    /// Position in the recorded order, starting at 0.
    pub seq: usize,
    /// Time since the recorder was created.
    pub elapsed: Duration,
    /// The event itself.
    #[serde(flatten)]
    pub event: RingEvent,
}

struct RecorderState {
    started: Instant,
    events: Vec<RecordedEvent>,
}

/// Hook that records every event under one lock.
///
/// Agents fire `Admitted`/`Starting` after taking a slot or resource and
/// `Finishing`/`CycleComplete` before giving one back, so the recorded order
/// is consistent with the real order of holds.
///
/// Clones share the same buffer: register one clone, read from another.
#[derive(Clone)]
pub struct EventRecorder {
    state: Arc<Mutex<RecorderState>>,
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RecorderState {
                started: Instant::now(),
                events: Vec::new(),
            })),
        }
    }

    /// Snapshot of everything recorded so far.
    pub fn trace(&self) -> Trace {
        Trace {
            events: self.state.lock().events.clone(),
        }
    }

    /// Number of events recorded so far.
    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.state.lock().events.is_empty()
    }

    /// Drop all recorded events.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.events.clear();
        state.started = Instant::now();
    }
}

impl Hook for EventRecorder {
    fn on_event(&self, event: &RingEvent) {
        let mut state = self.state.lock();
        let seq = state.events.len();
        let elapsed = state.started.elapsed();
        state.events.push(RecordedEvent {
            seq,
            elapsed,
            event: *event,
        });
    }
}

/// Two agents working at once while sharing a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceConflict {
    /// Ring index of the shared resource.
    pub resource: usize,
    /// Agent already working.
    pub holder: AgentId,
    /// Agent that started working on top of it.
    pub intruder: AgentId,
    /// Sequence number of the intruder's `Starting` event.
    pub seq: usize,
}

/// A property of the run that the trace shows was broken.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("agent {agent}: {starting} starting / {finishing} finishing events, quota {quota}")]
    QuotaMismatch {
        agent: AgentId,
        starting: usize,
        finishing: usize,
        quota: usize,
    },

    #[error("{peak} agents admitted at once, capacity {capacity}")]
    CapacityExceeded { peak: usize, capacity: usize },

    #[error(
        "agents {} and {} worked on resource {} at once (seq {})",
        .0.holder, .0.intruder, .0.resource, .0.seq
    )]
    ResourceOverlap(ResourceConflict),

    #[error("agent {0} emitted events out of cycle order")]
    OutOfOrder(AgentId),

    #[error("{done} of {expected} agents reached done")]
    Unfinished { done: usize, expected: usize },
}

/// An ordered, immutable view of recorded events.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Trace {
    events: Vec<RecordedEvent>,
}

impl Trace {
    /// Build a trace from events in their observed order.
    pub fn from_events(events: impl IntoIterator<Item = RingEvent>) -> Self {
        Self {
            events: events
                .into_iter()
                .enumerate()
                .map(|(seq, event)| RecordedEvent {
                    seq,
                    elapsed: Duration::ZERO,
                    event,
                })
                .collect(),
        }
    }

    /// All recorded events in order.
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the trace is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total events of one kind.
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.event.kind() == kind).count()
    }

    /// Events of one kind emitted by one agent.
    pub fn count_for(&self, agent: AgentId, kind: EventKind) -> usize {
        self.events
            .iter()
            .filter(|e| e.event.agent() == agent && e.event.kind() == kind)
            .count()
    }

    /// Most agents ever simultaneously between `Admitted` and `CycleComplete`.
    pub fn max_concurrent_admitted(&self) -> usize {
        self.max_open(EventKind::Admitted, EventKind::CycleComplete)
    }

    /// Most agents ever simultaneously between `Starting` and `Finishing`.
    pub fn max_concurrent_working(&self) -> usize {
        self.max_open(EventKind::Starting, EventKind::Finishing)
    }

    fn max_open(&self, open: EventKind, close: EventKind) -> usize {
        let mut current = 0usize;
        let mut max = 0usize;
        for recorded in &self.events {
            let kind = recorded.event.kind();
            if kind == open {
                current += 1;
                max = max.max(current);
            } else if kind == close {
                current = current.saturating_sub(1);
            }
        }
        max
    }

    /// Overlapping work intervals on a shared resource in a ring of `ring_size`.
    ///
    /// An empty ring has no resources and so no conflicts.
    pub fn resource_conflicts(&self, ring_size: usize) -> Vec<ResourceConflict> {
        if ring_size == 0 {
            return Vec::new();
        }

        let resources_of = |agent: AgentId| {
            let left = agent.position() % ring_size;
            [left, (left + 1) % ring_size]
        };

        let mut working: BTreeSet<AgentId> = BTreeSet::new();
        let mut conflicts = Vec::new();

        for recorded in &self.events {
            match recorded.event {
                RingEvent::Starting { agent, .. } => {
                    let mine = resources_of(agent);
                    for &holder in &working {
                        let theirs = resources_of(holder);
                        for resource in mine.iter().filter(|r| theirs.contains(r)) {
                            conflicts.push(ResourceConflict {
                                resource: *resource,
                                holder,
                                intruder: agent,
                                seq: recorded.seq,
                            });
                        }
                    }
                    working.insert(agent);
                }
                RingEvent::Finishing { agent, .. } => {
                    working.remove(&agent);
                }
                _ => {}
            }
        }

        conflicts
    }

    /// Agents whose own events break the cycle order
    /// `Requesting, Admitted, Starting, Finishing, CycleComplete, ..., Done`.
    pub fn out_of_order_agents(&self) -> Vec<AgentId> {
        let mut last: BTreeMap<AgentId, EventKind> = BTreeMap::new();
        let mut broken: BTreeSet<AgentId> = BTreeSet::new();

        for recorded in &self.events {
            let agent = recorded.event.agent();
            let kind = recorded.event.kind();
            let ok = match (last.get(&agent), kind) {
                (None, EventKind::Requesting) => true,
                (Some(EventKind::CycleComplete), EventKind::Requesting | EventKind::Done) => true,
                (Some(EventKind::Requesting), EventKind::Admitted) => true,
                (Some(EventKind::Admitted), EventKind::Starting) => true,
                (Some(EventKind::Starting), EventKind::Finishing) => true,
                (Some(EventKind::Finishing), EventKind::CycleComplete) => true,
                _ => false,
            };
            if !ok {
                broken.insert(agent);
            }
            last.insert(agent, kind);
        }

        broken.into_iter().collect()
    }

    /// Distinct agents that emitted `Done`.
    pub fn done_agents(&self) -> BTreeSet<AgentId> {
        self.events
            .iter()
            .filter(|e| e.event.kind() == EventKind::Done)
            .map(|e| e.event.agent())
            .collect()
    }

    /// Whether agents `1..=ring_size` have all emitted `Done`.
    pub fn all_done(&self, ring_size: usize) -> bool {
        let done = self.done_agents();
        (1..=ring_size).all(|n| done.contains(&AgentId::new(n)))
    }

    /// Check every run-level property against the configuration that produced the trace.
    pub fn violations(&self, config: &RingConfig) -> Vec<Violation> {
        let mut violations = Vec::new();

        for position in 0..config.ring_size {
            let agent = AgentId::from_position(position);
            let starting = self.count_for(agent, EventKind::Starting);
            let finishing = self.count_for(agent, EventKind::Finishing);
            if starting != config.quota || finishing != config.quota {
                violations.push(Violation::QuotaMismatch {
                    agent,
                    starting,
                    finishing,
                    quota: config.quota,
                });
            }
        }

        let peak = self.max_concurrent_admitted();
        if peak > config.capacity {
            violations.push(Violation::CapacityExceeded {
                peak,
                capacity: config.capacity,
            });
        }

        violations.extend(
            self.resource_conflicts(config.ring_size)
                .into_iter()
                .map(Violation::ResourceOverlap),
        );
        violations.extend(self.out_of_order_agents().into_iter().map(Violation::OutOfOrder));

        if !self.all_done(config.ring_size) {
            violations.push(Violation::Unfinished {
                done: self.done_agents().len(),
                expected: config.ring_size,
            });
        }

        violations
    }
}
