// src/lib.rs

pub mod cli;
pub mod config;
pub mod dynamic;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod introspect;
pub mod logging;
pub mod task;
pub mod types;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::{PlanFile, StepConfig};
use crate::engine::Engine;
use crate::introspect::{TaskSummary, render_tree};
use crate::types::JoinStatus;

pub use crate::dynamic::DynamicPolicy;
pub use crate::errors::{DynataskError, TaskError, TaskResult};
pub use crate::exec::ExecutionContext;
pub use crate::task::{AnyTask, Task, TaskBuilder, TaskContext, TaskRef, sequential};
pub use crate::types::TaskState;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan loading
/// - the engine and its execution context
/// - Ctrl-C handling (cancels the effector, interrupting running commands)
/// - the optional overall timeout
pub async fn run(args: CliArgs) -> Result<()> {
    let plan_path = PathBuf::from(&args.plan);
    let plan = load_and_validate(&plan_path)?;

    if args.dry_run {
        print_dry_run(&plan);
        return Ok(());
    }

    let engine = Engine::from_config(&plan.engine)?;
    let effector = engine.invoke(&plan)?;

    // Ctrl-C → cancel with interruption.
    {
        let effector = effector.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!(effector = %effector.name(), "Ctrl-C received; cancelling");
            effector.cancel(true);
        });
    }

    let timeout = args
        .timeout
        .or(plan.engine.drain_timeout_secs)
        .map(Duration::from_secs);
    if effector.drain(timeout, true, false).await? == JoinStatus::TimedOut {
        warn!(effector = %effector.name(), ?timeout, "effector did not finish in time; cancelling");
        effector.cancel(true);
    }

    let outcome = effector.get().await;
    print!("{}", render_tree(&TaskSummary::of(effector.as_task_ref().as_ref())));

    let output = outcome?;
    info!(
        effector = %effector.name(),
        steps = output.steps_queued,
        "effector finished"
    );
    Ok(())
}

/// Simple dry-run output: print the effector and its steps.
fn print_dry_run(plan: &PlanFile) {
    let policy = plan.engine.policy();
    println!("dynatask dry-run");
    println!("  engine.coordinator_tick_ms = {}", plan.engine.coordinator_tick_ms);
    println!(
        "  engine.swallow_children_failures = {}",
        policy.swallow_children_failures
    );
    println!(
        "  engine.cancel_remaining_on_failure = {}",
        policy.cancel_remaining_on_failure
    );
    println!();

    let effector = &plan.effector;
    println!("effector {} ({} steps):", effector.name, plan.step_count());
    if let Some(ref primary) = effector.primary {
        println!("  primary: {primary}");
    }
    print_steps(&effector.step, 1);

    debug!("dry-run complete (no execution)");
}

fn print_steps(steps: &[StepConfig], depth: usize) {
    let indent = "  ".repeat(depth);
    for step in steps {
        match &step.cmd {
            Some(cmd) => println!("{indent}- {}: {cmd}", step.name),
            None => println!("{indent}- {} (group)", step.name),
        }
        print_steps(&step.step, depth + 1);
    }
}
