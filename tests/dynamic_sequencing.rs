// tests/dynamic_sequencing.rs

mod common;

use std::time::Duration;

use common::*;
use dynatask::task::{COMPOUND_TAG, SUB_TASK_TAG};
use dynatask::{TaskBuilder, TaskState, sequential};
use tokio::sync::oneshot;

#[tokio::test]
async fn test_primary_result_with_no_children() {
    init_tracing();
    let exec = execution();

    let task = TaskBuilder::new()
        .name("lonely")
        .dynamic(true)
        .coordinator_tick(TEST_TICK)
        .body(|_ctx| async { Ok("X".to_string()) })
        .build()
        .unwrap();
    exec.submit(&task).unwrap();

    assert_eq!(with_timeout(task.get()).await.unwrap(), "X");
    assert_eq!(task.state(), TaskState::Ended);
    assert!(task.children().is_empty());
    assert!(task.tags().contains(COMPOUND_TAG));
}

#[tokio::test]
async fn test_primary_less_composite_collects_results_in_order() {
    init_tracing();
    let exec = execution();
    let log = EventLog::new();

    let seq = sequential::<i32>("numbers")
        .coordinator_tick(TEST_TICK)
        .build()
        .unwrap();
    for (i, delay) in [30u64, 10, 0].into_iter().enumerate() {
        let value = i as i32 + 1;
        seq.queue(logged_task(&format!("n{value}"), &log, Duration::from_millis(delay), value))
            .unwrap();
    }
    exec.submit(&seq).unwrap();

    assert_eq!(with_timeout(seq.get()).await.unwrap(), Some(vec![1, 2, 3]));
    assert_eq!(
        log.events(),
        vec!["start:n1", "end:n1", "start:n2", "end:n2", "start:n3", "end:n3"]
    );
}

#[tokio::test]
async fn test_sequential_result_is_none_on_type_mismatch() {
    init_tracing();
    let exec = execution();
    let log = EventLog::new();

    let seq = sequential::<i32>("mixed")
        .coordinator_tick(TEST_TICK)
        .build()
        .unwrap();
    seq.queue(logged_task("int", &log, Duration::ZERO, 1i32)).unwrap();
    seq.queue(logged_task("text", &log, Duration::ZERO, "two".to_string()))
        .unwrap();
    exec.submit(&seq).unwrap();

    assert_eq!(with_timeout(seq.get()).await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_children_run_one_at_a_time_in_queue_order() {
    init_tracing();
    let exec = execution();
    let log = EventLog::new();
    let probe = ConcurrencyProbe::new();

    let composite = {
        let log = log.clone();
        let probe = probe.clone();
        TaskBuilder::new()
            .name("fifo")
            .dynamic(true)
            .coordinator_tick(TEST_TICK)
            .body(move |ctx| async move {
                // Later children are faster; order must still hold.
                for i in 0..5u64 {
                    let delay = Duration::from_millis(40 - i * 8);
                    ctx.queue(probed_task(&format!("c{i}"), &log, &probe, delay))?;
                }
                Ok(())
            })
            .build()
            .unwrap()
    };
    exec.submit(&composite).unwrap();
    with_timeout(composite.get()).await.unwrap();

    let expected: Vec<String> = (0..5)
        .flat_map(|i| [format!("start:c{i}"), format!("end:c{i}")])
        .collect();
    assert_eq!(log.events(), expected);
    assert_eq!(probe.max_concurrency(), 1);

    let names: Vec<String> = composite
        .children()
        .iter()
        .map(|child| child.name().to_string())
        .collect();
    assert_eq!(names, vec!["c0", "c1", "c2", "c3", "c4"]);
}

#[tokio::test]
async fn test_children_run_while_primary_is_still_running() {
    init_tracing();
    let exec = execution();
    let (started_tx, started_rx) = oneshot::channel::<()>();

    let child = TaskBuilder::new()
        .name("child")
        .body(move |_ctx| async move {
            let _ = started_tx.send(());
            Ok(())
        })
        .build()
        .unwrap();

    let composite = TaskBuilder::new()
        .name("overlap")
        .dynamic(true)
        .coordinator_tick(TEST_TICK)
        .body(move |ctx| async move {
            ctx.queue(child)?;
            // Returns only once the child has started, so the child cannot
            // wait for the primary to finish.
            started_rx.await?;
            Ok("primary done")
        })
        .build()
        .unwrap();
    exec.submit(&composite).unwrap();

    assert_eq!(with_timeout(composite.get()).await.unwrap(), "primary done");
}

#[tokio::test]
async fn test_composite_waits_for_late_children() {
    init_tracing();
    let exec = execution();
    let log = EventLog::new();

    let composite = {
        let log = log.clone();
        TaskBuilder::new()
            .name("late")
            .dynamic(true)
            .coordinator_tick(TEST_TICK)
            .body(move |ctx| async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                ctx.queue(logged_task("slow", &log, Duration::from_millis(100), ()))?;
                Ok(())
            })
            .build()
            .unwrap()
    };
    exec.submit(&composite).unwrap();
    with_timeout(composite.get()).await.unwrap();

    assert!(log.contains("end:slow"));
    let children = composite.children();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].state(), TaskState::Ended);
}

#[tokio::test]
async fn test_queued_children_are_tagged_and_parented() {
    init_tracing();
    let log = EventLog::new();

    let composite = sequential::<()>("parent").build().unwrap();
    let child = composite
        .queue(logged_task("kid", &log, Duration::ZERO, ()))
        .unwrap();

    assert_eq!(child.state(), TaskState::Queued);
    assert!(child.tags().contains(SUB_TASK_TAG));
    let parent = child.core().parent().expect("parent recorded");
    assert_eq!(parent.id, composite.id());
    assert_eq!(parent.name, "parent");
}

#[tokio::test]
async fn test_child_queueing_goes_to_enclosing_composite() {
    init_tracing();
    let exec = execution();
    let log = EventLog::new();

    let composite = {
        let log = log.clone();
        TaskBuilder::new()
            .name("outer")
            .dynamic(true)
            .coordinator_tick(TEST_TICK)
            .body(move |ctx| async move {
                let nested_log = log.clone();
                let spawner = TaskBuilder::new()
                    .name("spawner")
                    .body(move |ctx| async move {
                        ctx.queue(logged_task("spawned", &nested_log, Duration::ZERO, ()))?;
                        Ok(())
                    })
                    .build()?;
                ctx.queue(spawner)?;
                Ok(())
            })
            .build()
            .unwrap()
    };
    exec.submit(&composite).unwrap();
    with_timeout(composite.get()).await.unwrap();

    let children = composite.children();
    let names: Vec<&str> = children.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["spawner", "spawned"]);
    assert!(log.contains("end:spawned"));
    assert_eq!(
        children[1].core().parent().map(|p| p.id),
        Some(composite.id())
    );
}

#[tokio::test]
async fn test_nested_composite_owns_its_own_children() {
    init_tracing();
    let exec = execution();
    let log = EventLog::new();

    let outer = {
        let log = log.clone();
        TaskBuilder::new()
            .name("outer")
            .dynamic(true)
            .coordinator_tick(TEST_TICK)
            .body(move |ctx| async move {
                let inner_log = log.clone();
                let inner = TaskBuilder::new()
                    .name("inner")
                    .dynamic(true)
                    .coordinator_tick(TEST_TICK)
                    .body(move |ctx| async move {
                        ctx.queue(logged_task("leaf-a", &inner_log, Duration::ZERO, 1u8))?;
                        ctx.queue(logged_task("leaf-b", &inner_log, Duration::ZERO, 2u8))?;
                        Ok(())
                    })
                    .build()?;
                ctx.queue(inner)?;
                ctx.queue(logged_task("after-inner", &log, Duration::ZERO, ()))?;
                Ok(())
            })
            .build()
            .unwrap()
    };
    exec.submit(&outer).unwrap();
    with_timeout(outer.get()).await.unwrap();

    let outer_children: Vec<String> = outer.children().iter().map(|c| c.name().to_string()).collect();
    assert_eq!(outer_children, vec!["inner", "after-inner"]);

    let inner = &outer.children()[0];
    let inner_children: Vec<String> = inner.children().iter().map(|c| c.name().to_string()).collect();
    assert_eq!(inner_children, vec!["leaf-a", "leaf-b"]);

    // The inner composite finishes (including its leaves) before the next
    // outer child starts.
    let events = log.events();
    let leaf_b_end = events.iter().position(|e| e == "end:leaf-b").unwrap();
    let after_start = events.iter().position(|e| e == "start:after-inner").unwrap();
    assert!(leaf_b_end < after_start, "events: {events:?}");
}
