// ABOUTME: Agent identity and life-cycle states.
// ABOUTME: StateCell gives lock-free reads of an agent's current state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Stable 1-based identity of an agent in the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(usize);

impl AgentId {
    /// Wrap a 1-based agent number.
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Identity for the agent seated at 0-based ring position `position`.
    pub fn from_position(position: usize) -> Self {
        Self(position + 1)
    }

    /// The 1-based number.
    pub fn get(self) -> usize {
        self.0
    }

    /// The 0-based ring position; the agent's left resource has this index.
    ///
    /// Id 0 is not a valid seat and maps to position 0.
    pub fn position(self) -> usize {
        self.0.saturating_sub(1)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an agent is in its work cycle.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Constructed, not yet started.
    Idle = 0,
    /// Waiting on the arbiter.
    RequestingAdmission = 1,
    /// Holding an admission slot.
    Admitted = 2,
    /// Waiting on the left resource.
    AcquiringLeft = 3,
    /// Waiting on the right resource.
    AcquiringRight = 4,
    /// Both resources held; performing the unit of work.
    Working = 5,
    /// Giving resources back.
    Releasing = 6,
    /// Resources released; returning the admission slot.
    CycleComplete = 7,
    /// Quota met. Terminal.
    Done = 8,
}

impl AgentState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => AgentState::Idle,
            1 => AgentState::RequestingAdmission,
            2 => AgentState::Admitted,
            3 => AgentState::AcquiringLeft,
            4 => AgentState::AcquiringRight,
            5 => AgentState::Working,
            6 => AgentState::Releasing,
            7 => AgentState::CycleComplete,
            _ => AgentState::Done,
        }
    }

    /// Whether the agent has finished its quota.
    pub fn is_done(self) -> bool {
        self == AgentState::Done
    }

    /// Whether the agent currently holds an admission slot.
    pub fn is_admitted(self) -> bool {
        matches!(
            self,
            AgentState::Admitted
                | AgentState::AcquiringLeft
                | AgentState::AcquiringRight
                | AgentState::Working
                | AgentState::Releasing
                | AgentState::CycleComplete
        )
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Idle => write!(f, "idle"),
            AgentState::RequestingAdmission => write!(f, "requesting admission"),
            AgentState::Admitted => write!(f, "admitted"),
            AgentState::AcquiringLeft => write!(f, "acquiring left"),
            AgentState::AcquiringRight => write!(f, "acquiring right"),
            AgentState::Working => write!(f, "working"),
            AgentState::Releasing => write!(f, "releasing"),
            AgentState::CycleComplete => write!(f, "cycle complete"),
            AgentState::Done => write!(f, "done"),
        }
    }
}

/// Shared, atomically updated agent state. The owning agent is the only writer.
#[derive(Clone, Debug)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    /// A cell starting in [`AgentState::Idle`].
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(AgentState::Idle as u8)))
    }

    /// Current state.
    pub fn get(&self) -> AgentState {
        AgentState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn set(&self, state: AgentState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
