// src/dynamic/mod.rs

//! Dynamic (composite) tasks.
//!
//! A dynamic task runs a *primary* computation and accepts *secondary jobs*
//! queued while it runs, from its own body, from its children, or from
//! outside. Secondary jobs run one at a time, in queue order, concurrently
//! with the primary, driven by an internal coordinator task
//! ([`coordinator`]). The composite finishes once the primary has returned
//! and every secondary job has finished (or the first one failed).
//!
//! Outcome precedence:
//!
//! 1. a failed primary wins; child errors are logged and ignored
//! 2. otherwise the first child failure, unless swallowed by policy
//!    (fatal failures are never swallowed)
//! 3. otherwise the primary's result, or the collected child results for a
//!    composite built without a body

mod coordinator;
mod jobs;
mod join;

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tracing::{debug, error, info, trace};

use crate::errors::{TaskError, TaskResult};
use crate::exec::{ExecutionContext, Submission};
use crate::task::core::{SUB_TASK_TAG, TaskCore, lock};
use crate::task::handle::{Body, TaskInner, log_outcome};
use crate::task::runner::run_body;
use crate::task::{AnyValue, TaskContext, TaskRef, TaskValue};

pub use coordinator::MANAGER_NAME;
pub(crate) use jobs::JobQueue;
pub(crate) use join::{drain, join};

pub const DEFAULT_COORDINATOR_TICK: Duration = Duration::from_secs(1);

/// Per-composite failure handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicPolicy {
    /// Finish normally even if a secondary job fails (unless it is fatal).
    pub swallow_children_failures: bool,
    /// When a secondary job fails, cancel every job still queued.
    pub cancel_remaining_on_failure: bool,
    /// Upper bound on how long the coordinator and joiners sleep before
    /// re-checking the queue.
    pub coordinator_tick: Duration,
}

impl Default for DynamicPolicy {
    fn default() -> Self {
        Self {
            swallow_children_failures: false,
            cancel_remaining_on_failure: false,
            coordinator_tick: DEFAULT_COORDINATOR_TICK,
        }
    }
}

pub(crate) type Collector<T> = Box<dyn FnOnce(Option<Vec<AnyValue>>) -> T + Send>;

pub(crate) enum Primary<T> {
    Body(Body<T>),
    Collect(Collector<T>),
}

pub(crate) struct DynamicTask<T> {
    pub(crate) jobs: Arc<JobQueue>,
    primary: Mutex<Option<Primary<T>>>,
    policy: DynamicPolicy,
    coordinator: OnceLock<TaskRef>,
}

impl<T: TaskValue> DynamicTask<T> {
    pub(crate) fn new(primary: Primary<T>, policy: DynamicPolicy) -> Self {
        Self {
            jobs: Arc::new(JobQueue::new(policy.coordinator_tick)),
            primary: Mutex::new(Some(primary)),
            policy,
            coordinator: OnceLock::new(),
        }
    }

    pub(crate) fn coordinator(&self) -> Option<TaskRef> {
        self.coordinator.get().cloned()
    }

    /// Append `child` to the secondary jobs of the composite owning `owner`.
    ///
    /// Rejected once the composite is done, or once its primary has returned
    /// and the coordinator has stopped. A job accepted after the coordinator
    /// stopped on a failure is recorded but never run.
    pub(crate) fn queue(&self, owner: &TaskCore, child: TaskRef) -> TaskResult<()> {
        let abandoned = {
            let mut jobs = self.jobs.lock();
            if owner.is_done() || (jobs.finished && jobs.primary_finished) {
                return Err(TaskError::InvalidState(format!(
                    "cannot add task '{}' to '{}' when it is already finished",
                    child.name(),
                    owner.name()
                )));
            }
            child.core().set_parent(owner.link())?;
            child.core().add_tag(SUB_TASK_TAG);
            child.core().mark_queued();

            if jobs.finished {
                debug!(
                    parent = %owner.name(),
                    child = %child.name(),
                    "secondary job manager already stopped; job will not run"
                );
            } else {
                debug!(
                    parent = %owner.name(),
                    child = %child.name(),
                    position = jobs.all.len(),
                    "queued secondary job"
                );
            }
            jobs.all.push(Arc::clone(&child));
            jobs.remaining.push_back(Arc::clone(&child));
            self.jobs.notify_all();
            jobs.finished
        };

        if abandoned && self.policy.cancel_remaining_on_failure {
            child.cancel(false);
        }
        Ok(())
    }
}

/// Run a submitted composite: start the coordinator, run the primary, wait
/// for the secondary jobs and record the combined outcome.
pub(crate) async fn run<T: TaskValue>(task: Arc<TaskInner<T>>, execution: ExecutionContext) {
    let Some(dynamic) = task.dynamic() else {
        return;
    };
    let primary = lock(&dynamic.primary).take();
    let Some(primary) = primary else {
        debug!(task = %task.core.name(), "dynamic task already started; ignoring duplicate start");
        return;
    };
    if !task.core.mark_started() || task.has_outcome() {
        debug!(task = %task.core.name(), state = %task.core.state(), "dynamic task finished before it started");
        return;
    }
    info!(task = %task.core.name(), id = %task.core.id(), "dynamic task started");

    let me: TaskRef = task.clone();
    {
        let mut jobs = dynamic.jobs.lock();
        jobs.primary_started = true;
        for child in &jobs.all {
            child.core().mark_queued();
        }
    }

    let coordinator = match start_coordinator(&me, dynamic, &execution) {
        Ok(coordinator) => coordinator,
        Err(err) => {
            error!(task = %task.core.name(), error = %err, "could not start secondary job manager");
            dynamic.jobs.mark_finished();
            task.complete(Err(err));
            return;
        }
    };

    let (primary_result, collector) = match primary {
        Primary::Body(body) => {
            trace!(task = %task.core.name(), "running primary job");
            let ctx = TaskContext::new(me.clone(), execution.clone(), Some(me.clone()));
            (Some(run_body(&task.core, body(ctx)).await), None)
        }
        Primary::Collect(collect) => (None, Some(collect)),
    };

    {
        let mut jobs = dynamic.jobs.lock();
        jobs.primary_finished = true;
        dynamic.jobs.notify_all();
    }

    if let Some(Err(err)) = &primary_result {
        if err.is_fatal() {
            error!(task = %task.core.name(), error = %err, "primary job hit a fatal error; abandoning secondary jobs");
            abandon_secondaries(dynamic, &coordinator);
            task.complete(Err(err.clone()));
            return;
        }
    }

    if task.has_outcome() {
        debug!(task = %task.core.name(), "dynamic task cancelled while running; discarding its result");
        return;
    }

    trace!(task = %task.core.name(), "primary job finished; waiting for secondary jobs");
    join(&dynamic.jobs, &task.core, Some(&task.core), true, None).await;
    task.core
        .set_blocking_details(format!("waiting on task {}", coordinator.name()));
    let secondaries = coordinator.wait().await.and_then(|value| {
        value.downcast_ref::<Vec<AnyValue>>().cloned().ok_or_else(|| {
            TaskError::InvalidState("secondary job manager returned an unexpected value".into())
        })
    });
    task.core.reset_blocking_details();

    if task.has_outcome() {
        debug!(task = %task.core.name(), "dynamic task cancelled while draining; discarding its result");
        return;
    }
    let outcome = resolve_outcome(&task.core, dynamic.policy, primary_result, collector, Some(secondaries));
    log_outcome(&task.core, &outcome);
    task.complete(outcome);
}

fn start_coordinator<T: TaskValue>(
    me: &TaskRef,
    dynamic: &DynamicTask<T>,
    execution: &ExecutionContext,
) -> TaskResult<TaskRef> {
    let coordinator = coordinator::secondary_job_manager(me, &dynamic.jobs, dynamic.policy)?.as_task_ref();
    let _ = dynamic.coordinator.set(Arc::clone(&coordinator));
    let submission = Submission {
        submitted_by: Some(me.core().link()),
        queueing: Some(Arc::clone(me)),
    };
    execution.submit_with(Arc::clone(&coordinator), submission)?;
    Ok(coordinator)
}

fn abandon_secondaries<T: TaskValue>(dynamic: &DynamicTask<T>, coordinator: &TaskRef) {
    let (current, pending) = {
        let jobs = dynamic.jobs.lock();
        (jobs.current.clone(), jobs.remaining.iter().cloned().collect::<Vec<_>>())
    };
    if let Some(job) = current {
        job.cancel(true);
    }
    for job in pending {
        job.cancel(false);
    }
    coordinator.cancel(true);
}

fn resolve_outcome<T>(
    core: &TaskCore,
    policy: DynamicPolicy,
    primary: Option<TaskResult<T>>,
    collector: Option<Collector<T>>,
    secondaries: Option<TaskResult<Vec<AnyValue>>>,
) -> TaskResult<T> {
    let (children, child_error) = match secondaries {
        Some(Ok(values)) => (Some(values), None),
        Some(Err(err)) => (None, Some(err)),
        None => (None, None),
    };

    match (primary, child_error) {
        (Some(Err(own)), Some(child)) => {
            debug!(task = %core.name(), own = %own, child = %child, "ignoring child error in presence of own error");
            Err(own)
        }
        (Some(Err(own)), None) => Err(own),
        (primary, Some(child)) if policy.swallow_children_failures && !child.is_fatal() => {
            debug!(task = %core.name(), error = %child, "swallowing child failure");
            finish_value(core, primary, collector, None)
        }
        (_, Some(child)) => Err(child),
        (primary, None) => finish_value(core, primary, collector, children),
    }
}

fn finish_value<T>(
    core: &TaskCore,
    primary: Option<TaskResult<T>>,
    collector: Option<Collector<T>>,
    children: Option<Vec<AnyValue>>,
) -> TaskResult<T> {
    match (primary, collector) {
        (Some(result), _) => result,
        (None, Some(collect)) => Ok(collect(children)),
        (None, None) => Err(TaskError::InvalidState(format!(
            "dynamic task '{}' has neither a primary result nor a collector",
            core.name()
        ))),
    }
}

/// Cancel a composite: itself, every child it knows about, and its
/// coordinator. The primary is interrupted last.
pub(crate) fn cancel<T: TaskValue>(task: &TaskInner<T>, dynamic: &DynamicTask<T>, interrupt: bool) -> bool {
    if task.core.is_done() || task.has_outcome() {
        return false;
    }
    trace!(task = %task.core.name(), interrupt, "cancelling dynamic task");
    let mut cancelled = task.cancel_self(false);

    let children = {
        let mut jobs = dynamic.jobs.lock();
        if !jobs.primary_started {
            jobs.primary_finished = true;
            jobs.finished = true;
        }
        dynamic.jobs.notify_all();
        jobs.all.clone()
    };
    for child in children {
        cancelled |= child.cancel(interrupt);
    }
    if let Some(coordinator) = dynamic.coordinator.get() {
        cancelled |= coordinator.cancel(interrupt);
    }
    if interrupt && task.core.interrupt() {
        cancelled = true;
    }
    cancelled
}
