// ABOUTME: Tests for the agent cycle runner.
// ABOUTME: Covers event order, acquisition order, held-lock work, and release on panic.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio_test::{assert_pending, assert_ready};

use super::runner::{Agent, WorkFn, noop_work};
use super::state::{AgentId, AgentState};
use crate::config::AcquireOrder;
use crate::coordinator::{Arbiter, Resource};
use crate::hook::{EventKind, EventRecorder, HookRegistry};

fn pair() -> (Arc<Resource>, Arc<Resource>) {
    (Arc::new(Resource::new(0)), Arc::new(Resource::new(1)))
}

#[tokio::test]
async fn test_run_meets_quota_with_ordered_events() {
    let (left, right) = pair();
    let agent = Agent::new(
        AgentId::new(1),
        left.clone(),
        right.clone(),
        3,
        AcquireOrder::LeftFirst,
    );
    let state = agent.state();
    let arbiter = Arbiter::gate(1);
    let recorder = EventRecorder::new();
    let mut hooks = HookRegistry::new();
    hooks.register(recorder.clone());

    let report = agent.run(&arbiter, &hooks, &noop_work()).await;

    assert_eq!(report.cycles, 3);
    assert_eq!(state.get(), AgentState::Done);
    assert!(!left.is_held());
    assert!(!right.is_held());
    assert_eq!(arbiter.stats().admitted(), 0);

    let trace = recorder.trace();
    let kinds: Vec<EventKind> = trace.events().iter().map(|e| e.event.kind()).collect();
    let cycle = [
        EventKind::Requesting,
        EventKind::Admitted,
        EventKind::Starting,
        EventKind::Finishing,
        EventKind::CycleComplete,
    ];
    let mut expected: Vec<EventKind> = cycle.iter().copied().cycle().take(15).collect();
    expected.push(EventKind::Done);
    assert_eq!(kinds, expected);
    assert!(trace.out_of_order_agents().is_empty());
}

#[test]
fn test_agent_reports_its_wiring() {
    let (left, right) = pair();
    let agent = Agent::new(AgentId::new(2), left, right, 4, AcquireOrder::RightFirst);

    assert_eq!(agent.id(), AgentId::new(2));
    assert_eq!(agent.quota(), 4);
    assert_eq!(agent.resources(), (0, 1));
    assert_eq!(agent.cycles(), 0);
    assert_eq!(agent.state().get(), AgentState::Idle);
}

#[tokio::test]
async fn test_left_first_waits_on_right_while_holding_left() {
    let (left, right) = pair();
    let mut agent = Agent::new(
        AgentId::new(1),
        left.clone(),
        right.clone(),
        1,
        AcquireOrder::LeftFirst,
    );
    let state = agent.state();
    let arbiter = Arbiter::gate(1);
    let hooks = HookRegistry::new();
    let work = noop_work();

    let blocker = right.acquire().await;
    {
        let mut cycle = tokio_test::task::spawn(agent.run_cycle(&arbiter, &hooks, &work));
        assert_pending!(cycle.poll());
        assert_eq!(state.get(), AgentState::AcquiringRight);
        assert!(left.is_held());
        assert_eq!(arbiter.stats().admitted(), 1);

        drop(blocker);
        assert_ready!(cycle.poll());
    }

    assert_eq!(agent.cycles(), 1);
    assert_eq!(state.get(), AgentState::CycleComplete);
    assert!(!left.is_held());
}

#[tokio::test]
async fn test_right_first_waits_on_left_while_holding_right() {
    let (left, right) = pair();
    let mut agent = Agent::new(
        AgentId::new(2),
        left.clone(),
        right.clone(),
        1,
        AcquireOrder::RightFirst,
    );
    let state = agent.state();
    let arbiter = Arbiter::gate(1);
    let hooks = HookRegistry::new();
    let work = noop_work();

    let blocker = left.acquire().await;
    {
        let mut cycle = tokio_test::task::spawn(agent.run_cycle(&arbiter, &hooks, &work));
        assert_pending!(cycle.poll());
        assert_eq!(state.get(), AgentState::AcquiringLeft);
        assert!(right.is_held());

        drop(blocker);
        assert_ready!(cycle.poll());
    }

    assert!(!right.is_held());
}

#[tokio::test]
async fn test_agent_waits_for_admission_before_touching_resources() {
    let (left, right) = pair();
    let mut agent = Agent::new(
        AgentId::new(1),
        left.clone(),
        right.clone(),
        1,
        AcquireOrder::LeftFirst,
    );
    let state = agent.state();
    let arbiter = Arbiter::gate(1);
    let hooks = HookRegistry::new();
    let work = noop_work();

    let slot = arbiter.request_admission(AgentId::new(9)).await;
    {
        let mut cycle = tokio_test::task::spawn(agent.run_cycle(&arbiter, &hooks, &work));
        assert_pending!(cycle.poll());
        assert_eq!(state.get(), AgentState::RequestingAdmission);
        assert!(!left.is_held());
        assert!(!right.is_held());

        slot.release();
        assert_ready!(cycle.poll());
    }

    assert_eq!(agent.cycles(), 1);
}

#[tokio::test]
async fn test_work_runs_with_both_resources_held() {
    let (left, right) = pair();
    let calls = Arc::new(AtomicUsize::new(0));
    let work: WorkFn = {
        let (left, right, calls) = (left.clone(), right.clone(), calls.clone());
        Arc::new(move |agent: AgentId, cycle: usize| {
            assert_eq!(agent, AgentId::new(1));
            assert!(left.is_held() && right.is_held());
            assert_eq!(calls.fetch_add(1, Ordering::SeqCst) + 1, cycle);
        })
    };

    let agent = Agent::new(AgentId::new(1), left, right, 4, AcquireOrder::LeftFirst);
    let report = agent
        .run(&Arbiter::gate(1), &HookRegistry::new(), &work)
        .await;

    assert_eq!(report.cycles, 4);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_panicking_work_releases_everything() {
    let (left, right) = pair();
    let arbiter = Arbiter::gate(1);
    let work: WorkFn = Arc::new(|_: AgentId, _: usize| panic!("boom"));
    let agent = Agent::new(
        AgentId::new(1),
        left.clone(),
        right.clone(),
        1,
        AcquireOrder::LeftFirst,
    );

    let task = {
        let arbiter = arbiter.clone();
        tokio::spawn(async move { agent.run(&arbiter, &HookRegistry::new(), &work).await })
    };
    let err = task.await.unwrap_err();

    assert!(err.is_panic());
    assert!(!left.is_held());
    assert!(!right.is_held());
    assert_eq!(arbiter.stats().admitted(), 0);
}
