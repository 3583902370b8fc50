// tests/dynamic_failures.rs

mod common;

use std::time::Duration;

use common::*;
use dynatask::{Task, TaskBuilder, TaskError, TaskState, sequential};

fn panicking_task(name: &str) -> Task<u32> {
    TaskBuilder::new()
        .name(name)
        .body(|_ctx| async move {
            let explode = true;
            if explode {
                panic!("kaboom");
            }
            Ok(0)
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_child_failure_fails_the_composite_by_default() {
    init_tracing();
    let exec = execution();

    let composite = TaskBuilder::new()
        .name("parent")
        .dynamic(true)
        .coordinator_tick(TEST_TICK)
        .body(|ctx| async move {
            ctx.queue(failing_task::<()>("bad", "disk full"))?;
            Ok(7u32)
        })
        .build()
        .unwrap();
    exec.submit(&composite).unwrap();

    match with_timeout(composite.get()).await {
        Err(TaskError::ChildFailure { parent, child, cause }) => {
            assert_eq!(parent, "parent");
            assert_eq!(child, "bad");
            assert!(cause.to_string().contains("disk full"), "cause: {cause}");
        }
        other => panic!("expected child failure, got {other:?}"),
    }
    assert_eq!(composite.state(), TaskState::Error);
    assert!(composite.error().is_some());
}

#[tokio::test]
async fn test_primary_failure_wins_over_child_failure() {
    init_tracing();
    let exec = execution();

    let composite = TaskBuilder::<u32>::new()
        .name("parent")
        .dynamic(true)
        .swallow_children_failures(true)
        .coordinator_tick(TEST_TICK)
        .body(|ctx| async move {
            let bad = ctx.queue(failing_task::<()>("bad", "child broke"))?;
            bad.core().wait_done().await;
            anyhow::bail!("primary broke")
        })
        .build()
        .unwrap();
    exec.submit(&composite).unwrap();

    let err = with_timeout(composite.get()).await.unwrap_err();
    assert!(matches!(err, TaskError::PrimaryFailure { ref task, .. } if task == "parent"));
    assert!(err.to_string().contains("primary broke"));
}

#[tokio::test]
async fn test_swallowed_child_failure_keeps_primary_result() {
    init_tracing();
    let exec = execution();

    let composite = TaskBuilder::new()
        .name("tolerant")
        .dynamic(true)
        .swallow_children_failures(true)
        .coordinator_tick(TEST_TICK)
        .body(|ctx| async move {
            ctx.queue(failing_task::<()>("bad", "ignored"))?;
            Ok(42u32)
        })
        .build()
        .unwrap();
    exec.submit(&composite).unwrap();

    assert_eq!(with_timeout(composite.get()).await.unwrap(), 42);
    assert_eq!(composite.state(), TaskState::Ended);
    assert_eq!(composite.children()[0].state(), TaskState::Error);
}

#[tokio::test]
async fn test_drain_surfaces_swallowed_child_failure() {
    init_tracing();
    let exec = execution();

    let composite = TaskBuilder::new()
        .name("tolerant")
        .dynamic(true)
        .swallow_children_failures(true)
        .coordinator_tick(TEST_TICK)
        .body(|ctx| async move {
            ctx.queue(failing_task::<()>("bad", "still visible"))?;
            Ok(())
        })
        .build()
        .unwrap();
    exec.submit(&composite).unwrap();
    with_timeout(composite.get()).await.unwrap();

    let err = composite.drain(None, true, true).await.unwrap_err();
    assert_eq!(err.origin(), Some("bad"));

    // Without throw_first_error the same drain is fine.
    assert!(composite.drain(None, true, false).await.is_ok());
}

#[tokio::test]
async fn test_swallow_never_hides_primary_failure() {
    init_tracing();
    let exec = execution();

    let composite = TaskBuilder::<()>::new()
        .name("parent")
        .dynamic(true)
        .swallow_children_failures(true)
        .coordinator_tick(TEST_TICK)
        .body(|_ctx| async move { anyhow::bail!("own failure") })
        .build()
        .unwrap();
    exec.submit(&composite).unwrap();

    let err = with_timeout(composite.get()).await.unwrap_err();
    assert_eq!(err.origin(), Some("parent"));
    assert_eq!(composite.state(), TaskState::Error);
}

#[tokio::test]
async fn test_cancel_remaining_on_failure() {
    init_tracing();
    let exec = execution();
    let log = EventLog::new();

    let seq = sequential::<()>("pipeline")
        .cancel_remaining_on_failure(true)
        .coordinator_tick(TEST_TICK)
        .build()
        .unwrap();
    seq.queue(failing_task::<()>("first", "nope")).unwrap();
    let second = seq
        .queue(logged_task("second", &log, Duration::from_secs(2), ()))
        .unwrap();
    exec.submit(&seq).unwrap();

    match with_timeout(seq.get()).await {
        Err(TaskError::ChildFailure { child, .. }) => assert_eq!(child, "first"),
        other => panic!("expected failure of 'first', got {other:?}"),
    }
    assert_eq!(second.state(), TaskState::Cancelled);
    assert!(log.events().is_empty());
}

#[tokio::test]
async fn test_without_cancel_remaining_later_jobs_never_run() {
    init_tracing();
    let exec = execution();
    let log = EventLog::new();

    let seq = sequential::<()>("pipeline")
        .coordinator_tick(TEST_TICK)
        .build()
        .unwrap();
    seq.queue(failing_task::<()>("first", "nope")).unwrap();
    let second = seq
        .queue(logged_task("second", &log, Duration::ZERO, ()))
        .unwrap();
    exec.submit(&seq).unwrap();

    assert!(with_timeout(seq.get()).await.is_err());
    assert_eq!(second.state(), TaskState::Queued);
    assert!(log.events().is_empty());

    // The composite stopped taking jobs.
    let late = seq.queue(logged_task("late", &log, Duration::ZERO, ()));
    assert!(matches!(late, Err(TaskError::InvalidState(_))));
}

#[tokio::test]
async fn test_child_panic_is_fatal_and_not_swallowed() {
    init_tracing();
    let exec = execution();

    let composite = TaskBuilder::new()
        .name("parent")
        .dynamic(true)
        .swallow_children_failures(true)
        .coordinator_tick(TEST_TICK)
        .body(|ctx| async move {
            ctx.queue(panicking_task("explodes"))?;
            Ok(())
        })
        .build()
        .unwrap();
    exec.submit(&composite).unwrap();

    let err = with_timeout(composite.get()).await.unwrap_err();
    assert!(err.is_fatal(), "expected fatal error, got {err:?}");
    assert_eq!(err.origin(), Some("explodes"));
    assert!(err.to_string().contains("kaboom"));
}

#[tokio::test]
async fn test_primary_panic_abandons_pending_children() {
    init_tracing();
    let exec = execution();
    let log = EventLog::new();

    let seq_log = log.clone();
    let composite = TaskBuilder::<u32>::new()
        .name("parent")
        .dynamic(true)
        .coordinator_tick(TEST_TICK)
        .body(move |ctx| async move {
            ctx.queue(sleeping_task("busy", Duration::from_secs(30)))?;
            ctx.queue(logged_task("pending", &seq_log, Duration::ZERO, ()))?;
            let explode = true;
            if explode {
                panic!("primary exploded");
            }
            Ok(0)
        })
        .build()
        .unwrap();
    exec.submit(&composite).unwrap();

    let err = with_timeout(composite.get()).await.unwrap_err();
    assert!(matches!(err, TaskError::Fatal { ref task, .. } if task == "parent"));

    let pending = &composite.children()[1];
    assert_eq!(pending.state(), TaskState::Cancelled);
    assert!(log.events().is_empty());

    let busy = &composite.children()[0];
    with_timeout(busy.core().wait_done()).await;
    assert_eq!(busy.state(), TaskState::Cancelled);

    let coordinator = composite.coordinator().expect("coordinator started");
    with_timeout(coordinator.core().wait_done()).await;
}

#[tokio::test]
async fn test_primary_keeps_queueing_after_swallowed_child_failure() {
    init_tracing();
    let exec = execution();
    let log = EventLog::new();

    let composite = {
        let log = log.clone();
        TaskBuilder::new()
            .name("swallowing")
            .dynamic(true)
            .swallow_children_failures(true)
            .coordinator_tick(TEST_TICK)
            .body(move |ctx| async move {
                let bad = ctx.queue(failing_task::<()>("bad", "broken"))?;
                bad.core().wait_done().await;
                ctx.queue(logged_task("later", &log, Duration::ZERO, ()))?;
                Ok("primary-ok")
            })
            .build()
            .unwrap()
    };
    exec.submit(&composite).unwrap();

    assert_eq!(with_timeout(composite.get()).await.unwrap(), "primary-ok");
    assert_eq!(composite.state(), TaskState::Ended);

    let children = composite.children();
    let names: Vec<&str> = children.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["bad", "later"]);
    // Recorded, but the coordinator stopped at the first failure.
    assert_eq!(children[1].state(), TaskState::Queued);
    assert!(log.events().is_empty());
}

#[tokio::test]
async fn test_job_queued_after_failure_is_cancelled_under_cancel_remaining() {
    init_tracing();
    let exec = execution();
    let log = EventLog::new();

    let composite = {
        let log = log.clone();
        TaskBuilder::new()
            .name("strict")
            .dynamic(true)
            .cancel_remaining_on_failure(true)
            .coordinator_tick(TEST_TICK)
            .body(move |ctx| async move {
                let bad = ctx.queue(failing_task::<()>("bad", "broken"))?;
                bad.core().wait_done().await;
                let later = ctx.queue(logged_task("later", &log, Duration::ZERO, ()))?;
                Ok(later.state())
            })
            .build()
            .unwrap()
    };
    exec.submit(&composite).unwrap();

    match with_timeout(composite.get()).await {
        Err(TaskError::ChildFailure { child, .. }) => assert_eq!(child, "bad"),
        other => panic!("expected failure of 'bad', got {other:?}"),
    }
    assert_eq!(composite.children()[1].state(), TaskState::Cancelled);
    assert!(log.events().is_empty());
}
