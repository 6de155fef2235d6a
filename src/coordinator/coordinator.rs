// ABOUTME: Coordinator that wires agents into the resource ring and runs them to completion.
// ABOUTME: Owns the ring and arbiter for each run; no state is shared between runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::info;

use super::arbiter::Arbiter;
use super::resource::Ring;
use crate::agent::{Agent, AgentId, AgentReport, AgentState, StateCell, WorkFn, noop_work};
use crate::config::RingConfig;
use crate::error::{ConfigError, RingError};
use crate::hook::HookRegistry;

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Configuration the run used.
    pub config: RingConfig,
    /// Per-agent outcomes, ordered by agent id.
    pub agents: Vec<AgentReport>,
    /// Sum of cycles over all agents.
    pub total_cycles: usize,
    /// Highest number of agents admitted at once.
    pub peak_admitted: usize,
    /// Admissions granted over the run.
    pub grants: u64,
    /// Wall-clock time from start to the last agent finishing.
    pub elapsed: Duration,
}

impl RunReport {
    /// Whether every agent met its quota.
    pub fn is_complete(&self) -> bool {
        self.agents.len() == self.config.ring_size
            && self.agents.iter().all(|a| a.cycles == self.config.quota)
    }
}

/// Builds the ring, starts every agent, and waits for all of them to finish.
///
/// # Example
///
/// ```no_run
/// # async fn demo() -> Result<(), ringlock::RingError> {
/// use ringlock::prelude::*;
///
/// let config = RingConfig::builder().ring_size(5).capacity(2).quota(3).build()?;
/// let report = Coordinator::new(config)?.run().await?;
/// assert_eq!(report.total_cycles, 15);
/// # Ok(())
/// # }
/// ```
pub struct Coordinator {
    config: RingConfig,
    hooks: Arc<HookRegistry>,
    work: WorkFn,
}

impl Coordinator {
    /// Validate the configuration and create a coordinator.
    pub fn new(config: RingConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            config,
            hooks: Arc::new(HookRegistry::new()),
            work: noop_work(),
        })
    }

    /// Hooks that observe every agent event.
    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Unit of work run while an agent holds both resources.
    pub fn with_work(mut self, work: WorkFn) -> Self {
        self.work = work;
        self
    }

    /// The validated configuration.
    pub fn config(&self) -> &RingConfig {
        &self.config
    }

    /// Run every agent to its quota and wait for all of them. No timeout.
    ///
    /// Each call builds a fresh ring and arbiter.
    pub async fn run(&self) -> Result<RunReport, RingError> {
        self.start().finish().await
    }

    /// Start the run in the background and return a handle to it.
    pub fn spawn(self) -> RunHandle {
        let run = self.start();
        let states = run.states.clone();
        let arbiter = run.arbiter.clone();

        RunHandle {
            states,
            arbiter,
            task: tokio::spawn(run.finish()),
        }
    }

    fn start(&self) -> Run {
        let config = self.config.clone();
        let ring = Ring::new(config.ring_size);
        let arbiter = Arbiter::new(config.arbiter, config.capacity);

        info!(
            agents = config.ring_size,
            capacity = config.capacity,
            quota = config.quota,
            arbiter = %config.arbiter,
            order = %config.acquire_order,
            "starting ring run"
        );

        let mut states = Vec::with_capacity(config.ring_size);
        let mut tasks = Vec::with_capacity(config.ring_size);

        for position in 0..config.ring_size {
            let (left, right) = ring.neighbors(position);
            let id = AgentId::from_position(position);
            let agent = Agent::new(id, left, right, config.quota, config.acquire_order);
            states.push((id, agent.state()));

            let arbiter = arbiter.clone();
            let hooks = Arc::clone(&self.hooks);
            let work = Arc::clone(&self.work);
            let handle = tokio::spawn(async move { agent.run(&arbiter, &hooks, &work).await });
            tasks.push((id, handle));
        }

        Run {
            config,
            arbiter,
            states,
            tasks: AgentTasks(tasks),
            started: Instant::now(),
            _ring: ring,
        }
    }
}

/// Agent tasks of one run. Aborts whatever is still running when dropped.
struct AgentTasks(Vec<(AgentId, JoinHandle<AgentReport>)>);

impl Drop for AgentTasks {
    fn drop(&mut self) {
        for (_, handle) in &self.0 {
            handle.abort();
        }
    }
}

struct Run {
    config: RingConfig,
    arbiter: Arbiter,
    states: Vec<(AgentId, StateCell)>,
    tasks: AgentTasks,
    started: Instant,
    _ring: Ring,
}

impl Run {
    async fn finish(mut self) -> Result<RunReport, RingError> {
        let mut agents = Vec::with_capacity(self.tasks.0.len());
        let mut first_error = None;

        for (agent, handle) in self.tasks.0.iter_mut() {
            match handle.await {
                Ok(report) => agents.push(report),
                Err(source) => {
                    if first_error.is_none() {
                        first_error = Some(RingError::AgentPanicked {
                            agent: *agent,
                            source,
                        });
                    }
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        let stats = self.arbiter.stats();
        let report = RunReport {
            total_cycles: agents.iter().map(|a| a.cycles).sum(),
            peak_admitted: stats.peak(),
            grants: stats.grants(),
            elapsed: self.started.elapsed(),
            config: self.config.clone(),
            agents,
        };

        info!(
            total_cycles = report.total_cycles,
            peak_admitted = report.peak_admitted,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "ring run complete"
        );

        Ok(report)
    }
}

/// Handle to a run started with [`Coordinator::spawn`].
///
/// Dropping the handle detaches the run; it keeps going in the background.
pub struct RunHandle {
    states: Vec<(AgentId, StateCell)>,
    arbiter: Arbiter,
    task: JoinHandle<Result<RunReport, RingError>>,
}

impl RunHandle {
    /// Snapshot of every agent's current state.
    pub fn states(&self) -> Vec<(AgentId, AgentState)> {
        self.states.iter().map(|(id, cell)| (*id, cell.get())).collect()
    }

    /// Agents currently holding an admission slot.
    pub fn admitted(&self) -> usize {
        self.arbiter.stats().admitted()
    }

    /// Whether every agent has reported done.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for every agent to finish. No timeout.
    pub async fn wait(self) -> Result<RunReport, RingError> {
        self.task.await?
    }

    /// Wait at most `timeout`; on expiry the run is aborted.
    pub async fn wait_with_timeout(mut self, timeout: Duration) -> Result<RunReport, RingError> {
        match tokio::time::timeout(timeout, &mut self.task).await {
            Ok(joined) => joined?,
            Err(_) => {
                self.task.abort();
                Err(RingError::Timeout(timeout))
            }
        }
    }
}
