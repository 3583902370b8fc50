// src/dynamic/coordinator.rs

//! The secondary-job manager: an internal task that runs a composite's
//! queued jobs one at a time, in queue order.

use std::sync::{Arc, Weak};

use tracing::{debug, trace};

use crate::dynamic::DynamicPolicy;
use crate::dynamic::jobs::{FinishedGuard, JobQueue};
use crate::errors::{TaskError, TaskResult};
use crate::exec::Submission;
use crate::task::{AnyTask, AnyValue, INTERNAL_TAG, Task, TaskBuilder, TaskContext, TaskLink, TaskRef};

pub const MANAGER_NAME: &str = "secondary job manager (internal)";

/// Build the coordinator for `owner`. It is submitted by the composite when
/// its primary starts.
pub(crate) fn secondary_job_manager(
    owner: &TaskRef,
    jobs: &Arc<JobQueue>,
    policy: DynamicPolicy,
) -> TaskResult<Task<Vec<AnyValue>>> {
    let owner_link = owner.core().link();
    let owner = Arc::downgrade(owner);
    let jobs = Arc::clone(jobs);
    let finished = FinishedGuard::new(Arc::clone(&jobs));

    TaskBuilder::new()
        .name(MANAGER_NAME)
        .tag(INTERNAL_TAG)
        .body(move |ctx| async move {
            let _finished = finished;
            run_secondary_jobs(ctx, owner_link, owner, jobs, policy)
                .await
                .map_err(anyhow::Error::from)
        })
        .build()
}

async fn run_secondary_jobs(
    ctx: TaskContext,
    owner: TaskLink,
    owner_ref: Weak<dyn AnyTask>,
    jobs: Arc<JobQueue>,
    policy: DynamicPolicy,
) -> TaskResult<Vec<AnyValue>> {
    let mut results = Vec::new();

    loop {
        let mut changes = jobs.subscribe();
        let next = {
            let mut state = jobs.lock();
            if state.primary_finished && state.remaining.is_empty() {
                // Under the same lock as `queue`, so nothing slips in after the last check.
                state.current = None;
                state.finished = true;
                jobs.notify_all();
                break;
            }
            let next = state.remaining.pop_front();
            // Waiters only care about changes; an idle manager must not wake itself.
            let changed = next.is_some() || state.current.is_some();
            state.current = next.clone();
            if changed {
                jobs.notify_all();
            }
            next
        };

        let Some(job) = next else {
            if ctx.current_task().is_done() {
                debug!(parent = %owner.name, "secondary job manager cancelled; stopping");
                jobs.mark_finished();
                return Err(TaskError::Cancelled {
                    task: ctx.current_task().name().to_string(),
                });
            }
            jobs.wait_for_change(&mut changes, jobs.tick()).await;
            continue;
        };

        submit_if_needed(&ctx, &owner_ref, &job);
        trace!(parent = %owner.name, child = %job.name(), "waiting on secondary job");
        match job.wait().await {
            Ok(value) => results.push(value),
            Err(err) => {
                debug!(
                    parent = %owner.name,
                    child = %job.name(),
                    error = %err,
                    "secondary job failed; no further jobs will be started"
                );
                jobs.mark_finished();
                if policy.cancel_remaining_on_failure {
                    cancel_remaining(&jobs);
                }
                return Err(TaskError::ChildFailure {
                    parent: owner.name.clone(),
                    child: job.name().to_string(),
                    cause: Box::new(err),
                });
            }
        }
    }

    debug!(parent = %owner.name, jobs = results.len(), "all secondary jobs finished");
    Ok(results)
}

/// Submit `job` with the composite as its queueing context, unless someone
/// else already did (or it was cancelled while queued).
fn submit_if_needed(ctx: &TaskContext, owner: &Weak<dyn AnyTask>, job: &TaskRef) {
    let state = job.state();
    if state.is_submitted() {
        debug!(child = %job.name(), %state, "secondary job already submitted; waiting on it");
        return;
    }

    let submission = Submission {
        submitted_by: Some(ctx.current_task().core().link()),
        queueing: owner.upgrade(),
    };
    if let Err(err) = ctx.execution().submit_with(Arc::clone(job), submission) {
        debug!(child = %job.name(), error = %err, "could not submit secondary job; waiting on it");
    }
}

fn cancel_remaining(jobs: &JobQueue) {
    let pending: Vec<TaskRef> = jobs.lock().remaining.iter().cloned().collect();
    for job in pending {
        if job.cancel(false) {
            debug!(child = %job.name(), "cancelled queued secondary job");
        }
    }
}
