// ABOUTME: Tests for the admission arbiter.
// ABOUTME: Covers the capacity bound, blocking, release, and both backends.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio_test::{assert_pending, assert_ready};

use super::arbiter::Arbiter;
use crate::agent::AgentId;
use crate::config::ArbiterKind;

fn id(n: usize) -> AgentId {
    AgentId::new(n)
}

#[tokio::test]
async fn test_gate_blocks_when_full_and_wakes_on_release() {
    let arbiter = Arbiter::gate(2);

    let first = arbiter.request_admission(id(1)).await;
    let _second = arbiter.request_admission(id(2)).await;
    assert_eq!(arbiter.stats().admitted(), 2);

    let mut third = tokio_test::task::spawn(arbiter.request_admission(id(3)));
    assert_pending!(third.poll());

    first.release();
    assert!(third.is_woken());
    let admission = assert_ready!(third.poll());

    assert_eq!(admission.agent(), id(3));
    assert_eq!(arbiter.stats().admitted(), 2);
    assert_eq!(arbiter.stats().peak(), 2);
    assert_eq!(arbiter.stats().grants(), 3);
}

#[tokio::test]
async fn test_drop_returns_slot() {
    let arbiter = Arbiter::gate(1);

    {
        let _admission = arbiter.request_admission(id(1)).await;
        assert_eq!(arbiter.stats().admitted(), 1);
    }

    assert_eq!(arbiter.stats().admitted(), 0);
    let _again = arbiter.request_admission(id(2)).await;
    assert_eq!(arbiter.stats().admitted(), 1);
}

#[tokio::test]
async fn test_host_blocks_when_full_and_wakes_on_release() {
    let arbiter = Arbiter::host(1);
    let first = arbiter.request_admission(id(1)).await;

    let waiter = {
        let arbiter = arbiter.clone();
        tokio::spawn(async move { arbiter.request_admission(id(2)).await.agent() })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished(), "second agent admitted past capacity");
    assert_eq!(arbiter.stats().admitted(), 1);

    first.release();
    let granted = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter should be admitted after release")
        .unwrap();
    assert_eq!(granted, id(2));
}

#[tokio::test]
async fn test_host_grants_in_request_order() {
    let arbiter = Arbiter::host(1);
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let holder = arbiter.request_admission(id(1)).await;

    let mut handles = Vec::new();
    for n in 2..=4 {
        let arbiter = arbiter.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move {
            let admission = arbiter.request_admission(id(n)).await;
            order.lock().push(n);
            admission.release();
        }));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    holder.release();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    assert_eq!(*order.lock(), vec![2, 3, 4]);
}

#[tokio::test]
async fn test_host_reclaims_grant_when_requester_is_dropped() {
    let arbiter = Arbiter::host(1);
    let first = arbiter.request_admission(id(1)).await;

    let mut second = tokio_test::task::spawn(arbiter.request_admission(id(2)));
    assert_pending!(second.poll());

    // The host grants agent 2 while its future sits unpolled.
    first.release();
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(second);
    assert_eq!(arbiter.stats().admitted(), 0);

    let third = tokio::time::timeout(
        Duration::from_millis(500),
        arbiter.request_admission(id(3)),
    )
    .await
    .expect("slot leaked by abandoned request");
    assert_eq!(third.agent(), id(3));
    assert_eq!(arbiter.stats().admitted(), 1);
}

#[tokio::test]
async fn test_host_skips_requester_dropped_while_queued() {
    let arbiter = Arbiter::host(1);
    let first = arbiter.request_admission(id(1)).await;

    let mut second = tokio_test::task::spawn(arbiter.request_admission(id(2)));
    assert_pending!(second.poll());
    drop(second);

    first.release();
    let third = tokio::time::timeout(
        Duration::from_millis(500),
        arbiter.request_admission(id(3)),
    )
    .await
    .expect("queued slot not skipped");
    assert_eq!(third.agent(), id(3));
    assert_eq!(arbiter.stats().admitted(), 1);
    assert_eq!(arbiter.stats().grants(), 2);
}

#[tokio::test]
async fn test_admission_debug_names_agent_and_backend() {
    let gate = Arbiter::gate(1);
    let admission = gate.request_admission(id(4)).await;
    let rendered = format!("{:?}", admission);
    assert!(rendered.contains("Admission"));
    assert!(rendered.contains("Gate"));
}

async fn hammer(kind: ArbiterKind) {
    let capacity = 3;
    let arbiter = Arbiter::new(kind, capacity);
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for n in 1..=20 {
        let arbiter = arbiter.clone();
        let inside = inside.clone();
        let max_inside = max_inside.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..5 {
                let admission = arbiter.request_admission(id(n)).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                assert!(arbiter.stats().admitted() <= capacity);
                tokio::task::yield_now().await;
                inside.fetch_sub(1, Ordering::SeqCst);
                admission.release();
            }
        }));
    }

    for handle in handles {
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("arbiter stalled")
            .unwrap();
    }

    assert!(max_inside.load(Ordering::SeqCst) <= capacity);
    assert!(arbiter.stats().peak() <= capacity);
    assert_eq!(arbiter.stats().grants(), 100);
    assert_eq!(arbiter.stats().admitted(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_gate_bound_holds_under_contention() {
    hammer(ArbiterKind::Gate).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_host_bound_holds_under_contention() {
    hammer(ArbiterKind::Host).await;
}

#[tokio::test]
async fn test_kind_and_capacity() {
    let gate = Arbiter::new(ArbiterKind::Gate, 2);
    assert_eq!(gate.kind(), ArbiterKind::Gate);
    assert_eq!(gate.capacity(), 2);

    let host = Arbiter::new(ArbiterKind::Host, 4);
    assert_eq!(host.kind(), ArbiterKind::Host);
    assert_eq!(host.capacity(), 4);
    assert!(format!("{:?}", host).contains("Host"));
}

#[test]
#[should_panic(expected = "capacity must be positive")]
fn test_zero_capacity_panics() {
    let _ = Arbiter::gate(0);
}
