// ABOUTME: Agent runner - drives one agent through its admission/acquire/work/release cycles.
// ABOUTME: Resources and the admission slot are RAII guards, so release is unconditional.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::state::{AgentId, AgentState, StateCell};
use crate::config::AcquireOrder;
use crate::coordinator::{Arbiter, Resource, ResourceGuard};
use crate::hook::{HookRegistry, RingEvent};

/// Synchronous unit of work run while both resources are held.
///
/// Receives the agent and the 1-based cycle number. It must not block on
/// other agents; nothing yields while an agent is working.
pub type WorkFn = Arc<dyn Fn(AgentId, usize) + Send + Sync>;

/// A [`WorkFn`] that does nothing.
pub fn noop_work() -> WorkFn {
    Arc::new(|_, _| {})
}

/// Outcome of one agent's run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReport {
    /// Agent identity.
    pub id: AgentId,
    /// Work cycles completed; equals the quota once the agent is done.
    pub cycles: usize,
}

/// A worker bound to two adjacent resources in the ring.
pub struct Agent {
    id: AgentId,
    left: Arc<Resource>,
    right: Arc<Resource>,
    order: AcquireOrder,
    quota: usize,
    cycles: usize,
    state: StateCell,
}

impl Agent {
    /// Create an idle agent with zero completed cycles.
    pub fn new(
        id: AgentId,
        left: Arc<Resource>,
        right: Arc<Resource>,
        quota: usize,
        order: AcquireOrder,
    ) -> Self {
        Self {
            id,
            left,
            right,
            order,
            quota,
            cycles: 0,
            state: StateCell::new(),
        }
    }

    /// Get the agent ID.
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Cycles completed so far.
    pub fn cycles(&self) -> usize {
        self.cycles
    }

    /// Target cycle count.
    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Handle to this agent's live state, readable from other tasks.
    pub fn state(&self) -> StateCell {
        self.state.clone()
    }

    /// Ring positions of the (left, right) resources.
    pub fn resources(&self) -> (usize, usize) {
        (self.left.index(), self.right.index())
    }

    /// Run cycles until the quota is met, then report.
    pub async fn run(
        mut self,
        arbiter: &Arbiter,
        hooks: &HookRegistry,
        work: &WorkFn,
    ) -> AgentReport {
        debug!(agent = %self.id, quota = self.quota, "agent started");

        while self.cycles < self.quota {
            self.run_cycle(arbiter, hooks, work).await;
        }

        self.state.set(AgentState::Done);
        hooks.fire(&RingEvent::Done { agent: self.id });
        debug!(agent = %self.id, cycles = self.cycles, "agent done");

        AgentReport {
            id: self.id,
            cycles: self.cycles,
        }
    }

    /// One full cycle: admission, acquisition, work, release.
    pub async fn run_cycle(&mut self, arbiter: &Arbiter, hooks: &HookRegistry, work: &WorkFn) {
        debug_assert!(self.cycles < self.quota, "cycle past quota");

        self.state.set(AgentState::RequestingAdmission);
        hooks.fire(&RingEvent::Requesting { agent: self.id });
        let admission = arbiter.request_admission(self.id).await;

        self.state.set(AgentState::Admitted);
        hooks.fire(&RingEvent::Admitted { agent: self.id });

        let (first, second) = self.acquire_both().await;

        // Work runs with both resources held; the counter and the finishing
        // event land before either guard is released.
        self.state.set(AgentState::Working);
        let cycle = self.cycles + 1;
        hooks.fire(&RingEvent::Starting {
            agent: self.id,
            cycle,
        });
        work(self.id, cycle);
        self.cycles = cycle;
        hooks.fire(&RingEvent::Finishing {
            agent: self.id,
            cycle,
        });

        self.state.set(AgentState::Releasing);
        second.release();
        first.release();

        self.state.set(AgentState::CycleComplete);
        hooks.fire(&RingEvent::CycleComplete {
            agent: self.id,
            count: self.cycles,
        });
        admission.release();
    }

    /// Take both resources in the configured order. Returns (first, second).
    async fn acquire_both(&self) -> (ResourceGuard, ResourceGuard) {
        match self.order {
            AcquireOrder::LeftFirst => {
                self.state.set(AgentState::AcquiringLeft);
                let left = self.left.acquire().await;
                self.state.set(AgentState::AcquiringRight);
                let right = self.right.acquire().await;
                (left, right)
            }
            AcquireOrder::RightFirst => {
                self.state.set(AgentState::AcquiringRight);
                let right = self.right.acquire().await;
                self.state.set(AgentState::AcquiringLeft);
                let left = self.left.acquire().await;
                (right, left)
            }
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("left", &self.left.index())
            .field("right", &self.right.index())
            .field("cycles", &self.cycles)
            .field("quota", &self.quota)
            .field("state", &self.state.get())
            .finish()
    }
}
