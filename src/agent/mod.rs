// ABOUTME: Agent module - identity, life-cycle state, and the cycle runner.
// ABOUTME: Each agent is the single writer of its own counter and state.

mod runner;
mod state;

pub use runner::{Agent, AgentReport, WorkFn, noop_work};
pub use state::{AgentId, AgentState, StateCell};

#[cfg(test)]
mod runner_test;
