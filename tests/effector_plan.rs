// tests/effector_plan.rs
#![cfg(unix)]

mod common;

use common::builders::{PlanFileBuilder, StepConfigBuilder};
use common::*;
use dynatask::engine::{Engine, StepOutput};
use dynatask::exec::CommandOutput;
use dynatask::introspect::{TaskSummary, render_tree};
use dynatask::{DynamicPolicy, TaskError, TaskState};

fn engine(policy: DynamicPolicy) -> Engine {
    Engine::new(execution(), policy)
}

fn test_policy() -> DynamicPolicy {
    DynamicPolicy {
        coordinator_tick: TEST_TICK,
        ..DynamicPolicy::default()
    }
}

#[tokio::test]
async fn test_plan_runs_primary_then_steps_in_order() {
    init_tracing();
    let plan = PlanFileBuilder::new("deploy")
        .primary("echo starting")
        .with_step(StepConfigBuilder::command("install", "echo installed").build())
        .with_step(
            StepConfigBuilder::group("configure")
                .with_step(StepConfigBuilder::command("write", "echo written").build())
                .with_step(StepConfigBuilder::command("reload", "echo reloaded").build())
                .build(),
        )
        .build();

    let effector = engine(test_policy()).invoke(&plan).unwrap();
    let output = with_timeout(effector.get()).await.unwrap();

    assert_eq!(
        output.primary,
        Some(CommandOutput {
            exit_code: 0,
            stdout: "starting".to_string()
        })
    );
    assert_eq!(output.steps_queued, 2);

    let children = effector.children();
    let names: Vec<&str> = children.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["install", "configure"]);

    let group = children[1]
        .value()
        .and_then(|v| v.downcast_ref::<StepOutput>().cloned())
        .expect("group output");
    let StepOutput::Group(outputs) = group else {
        panic!("expected group output, got {group:?}");
    };
    let stdout: Vec<String> = outputs
        .into_iter()
        .map(|o| match o {
            StepOutput::Command(out) => out.stdout,
            StepOutput::Group(_) => panic!("unexpected nested group"),
        })
        .collect();
    assert_eq!(stdout, vec!["written", "reloaded"]);

    let summary = TaskSummary::of(effector.as_task_ref().as_ref());
    assert_eq!(summary.count(), 5);
    assert_eq!(summary.find("reload").map(|s| s.state), Some(TaskState::Ended));
    let tree = render_tree(&summary);
    assert!(tree.starts_with("- deploy [ENDED]"), "tree:\n{tree}");
    assert!(tree.contains("\n    - reload [ENDED]"), "tree:\n{tree}");
}

#[tokio::test]
async fn test_failing_step_fails_the_effector() {
    init_tracing();
    let plan = PlanFileBuilder::new("deploy")
        .with_step(StepConfigBuilder::command("broken", "echo oops >&2; exit 3").build())
        .with_step(StepConfigBuilder::command("never", "echo never").build())
        .cancel_remaining_on_failure(true)
        .build();

    let policy = DynamicPolicy {
        cancel_remaining_on_failure: true,
        ..test_policy()
    };
    let effector = engine(policy).invoke(&plan).unwrap();

    let err = with_timeout(effector.get()).await.unwrap_err();
    match &err {
        TaskError::ChildFailure { parent, child, .. } => {
            assert_eq!(parent, "deploy");
            assert_eq!(child, "broken");
        }
        other => panic!("expected child failure, got {other:?}"),
    }
    assert!(err.to_string().contains("code 3"), "error: {err}");
    assert_eq!(effector.children()[1].state(), TaskState::Cancelled);

    let tree = render_tree(&TaskSummary::of(effector.as_task_ref().as_ref()));
    assert!(tree.contains("broken [ERROR]"), "tree:\n{tree}");
    assert!(tree.contains("never [CANCELLED]"), "tree:\n{tree}");
}

#[tokio::test]
async fn test_group_can_swallow_its_own_failures() {
    init_tracing();
    let plan = PlanFileBuilder::new("deploy")
        .with_step(
            StepConfigBuilder::group("optional")
                .swallow_children_failures(true)
                .with_step(StepConfigBuilder::command("flaky", "exit 1").build())
                .build(),
        )
        .with_step(StepConfigBuilder::command("after", "echo after").build())
        .build();

    let effector = engine(test_policy()).invoke(&plan).unwrap();
    with_timeout(effector.get()).await.unwrap();

    let children = effector.children();
    assert_eq!(children[0].state(), TaskState::Ended);
    assert_eq!(children[1].state(), TaskState::Ended);
    let optional = children[0]
        .value()
        .and_then(|v| v.downcast_ref::<StepOutput>().cloned());
    assert_eq!(optional, Some(StepOutput::Group(vec![])));
}

#[tokio::test]
async fn test_failing_primary_command_fails_the_effector() {
    init_tracing();
    let plan = PlanFileBuilder::new("deploy")
        .primary("exit 2")
        .with_step(StepConfigBuilder::command("skipped", "echo skipped").build())
        .build();

    let effector = engine(test_policy()).invoke(&plan).unwrap();
    let err = with_timeout(effector.get()).await.unwrap_err();

    assert!(matches!(err, TaskError::PrimaryFailure { ref task, .. } if task == "deploy"));
    // The primary failed before queueing anything.
    assert!(effector.children().is_empty());
}
