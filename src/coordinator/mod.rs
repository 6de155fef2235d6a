// ABOUTME: Coordinator module for arbitrating a ring of shared resources.
// ABOUTME: Contains resources, the admission arbiter, and the run coordinator.

mod arbiter;
mod coordinator;
mod resource;

pub use arbiter::{Admission, Arbiter, ArbiterStats};
pub use coordinator::{Coordinator, RunHandle, RunReport};
pub use resource::{Resource, ResourceGuard, Ring};

#[cfg(test)]
mod arbiter_test;
