// src/engine/effector.rs

//! Turn a plan's effector and steps into tasks.

use tracing::debug;

use crate::config::{EffectorConfig, StepConfig};
use crate::dynamic::DynamicPolicy;
use crate::errors::TaskResult;
use crate::exec::{COMMAND_TAG, CommandOutput, run_command};
use crate::task::{AnyValue, Task, TaskBuilder};

/// Tag carried by the top-level task of a plan.
pub const EFFECTOR_TAG: &str = "effector";

/// Result of one step: a command's output, or a group's outputs in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutput {
    Command(CommandOutput),
    Group(Vec<StepOutput>),
}

impl StepOutput {
    fn collect(values: Option<Vec<AnyValue>>) -> Self {
        let outputs = values
            .unwrap_or_default()
            .iter()
            .filter_map(|value| (**value).downcast_ref::<StepOutput>().cloned())
            .collect();
        StepOutput::Group(outputs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectorOutput {
    /// Output of the `primary` command, if one was configured.
    pub primary: Option<CommandOutput>,
    pub steps_queued: usize,
}

/// Build the effector: a dynamic task whose primary runs the optional
/// `primary` command and then queues every top-level step.
pub fn effector_task(
    effector: &EffectorConfig,
    defaults: DynamicPolicy,
) -> TaskResult<Task<EffectorOutput>> {
    let policy = effector.policy(defaults);
    let steps = effector.step.clone();
    let primary = effector.primary.clone();

    TaskBuilder::new()
        .name(effector.name.clone())
        .tags(effector.tags.iter().cloned())
        .tag(EFFECTOR_TAG)
        .dynamic(true)
        .policy(policy)
        .body(move |ctx| async move {
            let name = ctx.current_task().name().to_string();
            let primary = match primary {
                Some(cmd) => Some(run_command(&name, &cmd).await?),
                None => None,
            };
            for step in &steps {
                ctx.queue(step_task(step, policy)?)?;
            }
            debug!(effector = %name, steps = steps.len(), "queued effector steps");
            Ok(EffectorOutput {
                primary,
                steps_queued: steps.len(),
            })
        })
        .build()
}

/// Build a step: a command task, or a body-less dynamic task with its
/// nested steps already queued.
pub fn step_task(step: &StepConfig, defaults: DynamicPolicy) -> TaskResult<Task<StepOutput>> {
    let builder = TaskBuilder::new()
        .name(step.name.clone())
        .tags(step.tags.iter().cloned());

    if let Some(cmd) = step.cmd.clone() {
        return builder
            .tag(COMMAND_TAG)
            .body(move |ctx| async move {
                let output = run_command(ctx.current_task().name(), &cmd).await?;
                Ok(StepOutput::Command(output))
            })
            .build();
    }

    let policy = step.policy(defaults);
    let group = builder
        .dynamic(true)
        .policy(policy)
        .collect_children(StepOutput::collect)
        .build()?;
    for child in &step.step {
        group.queue(step_task(child, policy)?)?;
    }
    Ok(group)
}
