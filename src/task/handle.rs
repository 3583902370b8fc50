// src/task/handle.rs

//! Task handles.
//!
//! - [`AnyTask`] is the object-safe view of a task used wherever tasks of
//!   different result types meet: children of a composite, introspection,
//!   the execution context.
//! - [`Task<T>`] is the typed, cloneable handle returned by the builder.
//!
//! A task's outcome is written exactly once. The terminal state is published
//! after the outcome, so anyone observing a terminal state can read it.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dynamic::{self, DynamicPolicy, DynamicTask, Primary};
use crate::errors::{TaskError, TaskResult};
use crate::exec::{ExecutionContext, Job};
use crate::task::context::TaskContext;
use crate::task::core::{TaskCore, TaskId, lock};
use crate::task::runner::run_body;
use crate::types::{JoinStatus, TaskState};

/// Bound for task results. Results are cloned out to every caller of `get()`.
pub trait TaskValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> TaskValue for T {}

/// A type-erased task result, as seen by a composite collecting its children.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

pub type TaskRef = Arc<dyn AnyTask>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub(crate) type BodyFuture<T> = BoxFuture<'static, anyhow::Result<T>>;
pub(crate) type Body<T> = Box<dyn FnOnce(TaskContext) -> BodyFuture<T> + Send>;

/// Object-safe view of a task of any result type.
pub trait AnyTask: Send + Sync {
    fn core(&self) -> &TaskCore;

    fn is_dynamic(&self) -> bool {
        false
    }

    /// Tasks queued into this one, in queue order. Empty for simple tasks.
    fn children(&self) -> Vec<TaskRef> {
        Vec::new()
    }

    /// The internal secondary-job manager, once a dynamic task has started.
    fn coordinator(&self) -> Option<TaskRef> {
        None
    }

    /// Cancel the task (and, for a composite, everything it knows about).
    ///
    /// Returns `false` if nothing was cancelled, e.g. it was already done.
    fn cancel(&self, interrupt: bool) -> bool;

    /// The outcome, once recorded.
    fn outcome_any(&self) -> Option<TaskResult<AnyValue>>;

    /// Append `child` to this task's secondary jobs.
    fn queue_child(&self, child: TaskRef) -> TaskResult<()> {
        Err(TaskError::InvalidState(format!(
            "task '{}' is not dynamic; cannot queue '{}' into it",
            self.core().name(),
            child.core().name()
        )))
    }

    /// Wait for the task's secondary jobs (or, for a simple task, for the
    /// task itself). `caller` receives blocking details while waiting.
    fn join<'a>(
        &'a self,
        caller: Option<&'a TaskCore>,
        include_primary: bool,
        timeout: Option<Duration>,
    ) -> BoxFuture<'a, JoinStatus>;

    /// Produce the job an execution context runs for this task.
    fn start(self: Arc<Self>, execution: ExecutionContext, queueing: Option<TaskRef>) -> Job;
}

impl dyn AnyTask + '_ {
    pub fn id(&self) -> TaskId {
        self.core().id()
    }

    pub fn name(&self) -> &str {
        self.core().name()
    }

    pub fn state(&self) -> TaskState {
        self.core().state()
    }

    pub fn is_done(&self) -> bool {
        self.core().is_done()
    }

    /// The error, only while the task is in `ERROR`.
    pub fn error(&self) -> Option<TaskError> {
        if self.state() != TaskState::Error {
            return None;
        }
        self.outcome_any()?.err()
    }

    pub fn value(&self) -> Option<AnyValue> {
        self.outcome_any()?.ok()
    }

    /// Wait for the task to finish and return its type-erased outcome.
    pub async fn wait(&self) -> TaskResult<AnyValue> {
        self.core().wait_done().await;
        self.outcome_any().unwrap_or_else(|| {
            Err(TaskError::InvalidState(format!(
                "task '{}' is terminal but has no outcome",
                self.name()
            )))
        })
    }
}

impl fmt::Debug for dyn AnyTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

pub(crate) enum TaskKind<T> {
    Simple(Mutex<Option<Body<T>>>),
    Dynamic(DynamicTask<T>),
}

pub(crate) struct TaskInner<T> {
    pub(crate) core: TaskCore,
    pub(crate) kind: TaskKind<T>,
    pub(crate) outcome: OnceLock<TaskResult<T>>,
}

impl<T: TaskValue> TaskInner<T> {
    pub(crate) fn dynamic(&self) -> Option<&DynamicTask<T>> {
        match &self.kind {
            TaskKind::Dynamic(dynamic) => Some(dynamic),
            TaskKind::Simple(_) => None,
        }
    }

    pub(crate) fn has_outcome(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// Record the outcome. Returns `false` if one was already recorded
    /// (typically by a cancellation that won the race).
    pub(crate) fn complete(&self, result: TaskResult<T>) -> bool {
        let terminal = if result.is_ok() {
            TaskState::Ended
        } else {
            TaskState::Error
        };
        if self.outcome.set(result).is_err() {
            debug!(task = %self.core.name(), "outcome already recorded; dropping late result");
            return false;
        }
        self.core.finish(terminal);
        true
    }

    /// Cancel this task only.
    pub(crate) fn cancel_self(&self, interrupt: bool) -> bool {
        let cancelled = self
            .outcome
            .set(Err(TaskError::Cancelled {
                task: self.core.name().to_string(),
            }))
            .is_ok();
        if cancelled {
            self.core.finish(TaskState::Cancelled);
            info!(task = %self.core.name(), id = %self.core.id(), interrupt, "task cancelled");
        }
        if interrupt {
            self.core.interrupt();
        }
        cancelled
    }

    async fn run_simple(self: Arc<Self>, execution: ExecutionContext, queueing: Option<TaskRef>) {
        let TaskKind::Simple(slot) = &self.kind else {
            return;
        };
        let body = lock(slot).take();
        let Some(body) = body else {
            warn!(task = %self.core.name(), "task body already taken; ignoring duplicate start");
            return;
        };
        if !self.core.mark_started() || self.has_outcome() {
            debug!(task = %self.core.name(), state = %self.core.state(), "task finished before it started; skipping body");
            return;
        }

        info!(task = %self.core.name(), id = %self.core.id(), "task started");
        let me: TaskRef = self.clone();
        let ctx = TaskContext::new(me, execution, queueing);
        let result = run_body(&self.core, body(ctx)).await;
        if self.has_outcome() {
            debug!(task = %self.core.name(), "task cancelled while running; discarding its result");
            return;
        }
        log_outcome(&self.core, &result);
        self.complete(result);
    }
}

pub(crate) fn log_outcome<T>(core: &TaskCore, result: &TaskResult<T>) {
    let elapsed_ms = core
        .timestamps()
        .elapsed()
        .map(|d| d.as_millis())
        .unwrap_or_default();
    match result {
        Ok(_) => info!(task = %core.name(), elapsed_ms, "task ended"),
        Err(err) => warn!(task = %core.name(), elapsed_ms, error = %err, "task failed"),
    }
}

impl<T: TaskValue> AnyTask for TaskInner<T> {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn is_dynamic(&self) -> bool {
        matches!(self.kind, TaskKind::Dynamic(_))
    }

    fn children(&self) -> Vec<TaskRef> {
        self.dynamic()
            .map(|dynamic| dynamic.jobs.children())
            .unwrap_or_default()
    }

    fn coordinator(&self) -> Option<TaskRef> {
        self.dynamic()?.coordinator()
    }

    fn cancel(&self, interrupt: bool) -> bool {
        match &self.kind {
            TaskKind::Simple(_) => {
                if self.core.is_done() {
                    return false;
                }
                self.cancel_self(interrupt)
            }
            TaskKind::Dynamic(dynamic) => dynamic::cancel(self, dynamic, interrupt),
        }
    }

    fn outcome_any(&self) -> Option<TaskResult<AnyValue>> {
        let outcome = self.outcome.get()?;
        Some(match outcome {
            Ok(value) => Ok(Arc::new(value.clone()) as AnyValue),
            Err(err) => Err(err.clone()),
        })
    }

    fn queue_child(&self, child: TaskRef) -> TaskResult<()> {
        match &self.kind {
            TaskKind::Dynamic(dynamic) => dynamic.queue(&self.core, child),
            TaskKind::Simple(_) => Err(TaskError::InvalidState(format!(
                "task '{}' is not dynamic; cannot queue '{}' into it",
                self.core.name(),
                child.core().name()
            ))),
        }
    }

    fn join<'a>(
        &'a self,
        caller: Option<&'a TaskCore>,
        include_primary: bool,
        timeout: Option<Duration>,
    ) -> BoxFuture<'a, JoinStatus> {
        match &self.kind {
            TaskKind::Dynamic(dynamic) => Box::pin(dynamic::join(
                &dynamic.jobs,
                &self.core,
                caller,
                include_primary,
                timeout,
            )),
            TaskKind::Simple(_) => Box::pin(async move {
                let finished = match timeout {
                    Some(limit) => self.core.wait_done_for(limit).await,
                    None => {
                        self.core.wait_done().await;
                        true
                    }
                };
                if finished {
                    JoinStatus::Finished
                } else {
                    JoinStatus::TimedOut
                }
            }),
        }
    }

    fn start(self: Arc<Self>, execution: ExecutionContext, queueing: Option<TaskRef>) -> Job {
        Box::pin(async move {
            if self.is_dynamic() {
                dynamic::run(self, execution).await;
            } else {
                self.run_simple(execution, queueing).await;
            }
        })
    }
}

/// Typed handle to a task. Cheap to clone; all clones refer to the same task.
pub struct Task<T> {
    inner: Arc<TaskInner<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: TaskValue> Task<T> {
    pub(crate) fn simple(name: String, tags: BTreeSet<String>, body: Body<T>) -> Self {
        Self::from_kind(name, tags, TaskKind::Simple(Mutex::new(Some(body))))
    }

    pub(crate) fn dynamic(
        name: String,
        tags: BTreeSet<String>,
        primary: Primary<T>,
        policy: DynamicPolicy,
    ) -> Self {
        Self::from_kind(name, tags, TaskKind::Dynamic(DynamicTask::new(primary, policy)))
    }

    fn from_kind(name: String, tags: BTreeSet<String>, kind: TaskKind<T>) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                core: TaskCore::new(name, tags),
                kind,
                outcome: OnceLock::new(),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.inner.core.id()
    }

    pub fn name(&self) -> &str {
        self.inner.core.name()
    }

    pub fn core(&self) -> &TaskCore {
        &self.inner.core
    }

    pub fn state(&self) -> TaskState {
        self.inner.core.state()
    }

    pub fn tags(&self) -> BTreeSet<String> {
        self.inner.core.tags()
    }

    pub fn is_done(&self) -> bool {
        self.inner.core.is_done()
    }

    pub fn is_error(&self) -> bool {
        self.state() == TaskState::Error
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == TaskState::Cancelled
    }

    pub fn is_dynamic(&self) -> bool {
        self.inner.is_dynamic()
    }

    pub fn as_task_ref(&self) -> TaskRef {
        self.inner.clone()
    }

    pub fn children(&self) -> Vec<TaskRef> {
        self.inner.children()
    }

    pub fn coordinator(&self) -> Option<TaskRef> {
        self.inner.coordinator()
    }

    pub fn cancel(&self, interrupt: bool) -> bool {
        self.inner.cancel(interrupt)
    }

    /// The error, only while the task is in `ERROR`.
    pub fn error(&self) -> Option<TaskError> {
        if !self.is_error() {
            return None;
        }
        self.inner.outcome.get()?.as_ref().err().cloned()
    }

    /// The outcome if the task is already terminal.
    pub fn try_get(&self) -> Option<TaskResult<T>> {
        if !self.is_done() {
            return None;
        }
        self.inner.outcome.get().cloned()
    }

    /// Wait for the task to finish and return its outcome.
    pub async fn get(&self) -> TaskResult<T> {
        self.inner.core.wait_done().await;
        self.inner.outcome.get().cloned().unwrap_or_else(|| {
            Err(TaskError::InvalidState(format!(
                "task '{}' is terminal but has no outcome",
                self.name()
            )))
        })
    }

    /// Like [`Task::get`], giving up after `timeout`.
    pub async fn get_timeout(&self, timeout: Duration) -> Option<TaskResult<T>> {
        tokio::time::timeout(timeout, self.get()).await.ok()
    }

    /// Queue `child` as a secondary job of this dynamic task.
    ///
    /// Allowed from creation until the composite is done, or its primary
    /// has returned and the coordinator has stopped. While the primary is
    /// still running after a job failed, new jobs are recorded but not run.
    pub fn queue<U: TaskValue>(&self, child: Task<U>) -> TaskResult<Task<U>> {
        self.inner.queue_child(child.as_task_ref())?;
        Ok(child)
    }

    /// Wait for the secondary jobs to finish. See [`crate::dynamic`] for the
    /// exact stopping rules.
    pub async fn join(&self, include_primary: bool, timeout: Option<Duration>) -> JoinStatus {
        self.inner.join(None, include_primary, timeout).await
    }

    /// [`Task::join`], then optionally surface the first error found on this
    /// task or its children.
    pub async fn drain(
        &self,
        timeout: Option<Duration>,
        include_primary: bool,
        throw_first_error: bool,
    ) -> TaskResult<JoinStatus> {
        let task: &dyn AnyTask = self.inner.as_ref();
        dynamic::drain(task, None, timeout, include_primary, throw_first_error).await
    }
}

impl<T: TaskValue> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}
