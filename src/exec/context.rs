// src/exec/context.rs

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::errors::TaskResult;
use crate::exec::backend::{ExecutorBackend, TokioBackend};
use crate::task::{Task, TaskLink, TaskRef, TaskValue};

/// How a task reached the execution context.
#[derive(Clone, Default)]
pub struct Submission {
    /// The task that submitted it, if any.
    pub submitted_by: Option<TaskLink>,
    /// The dynamic task its body should queue into.
    pub queueing: Option<TaskRef>,
}

/// Something that accepts tasks and runs them concurrently.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct ExecutionContext {
    backend: Arc<dyn ExecutorBackend>,
}

impl ExecutionContext {
    pub fn new(backend: impl ExecutorBackend + 'static) -> Self {
        Self::from_backend(Arc::new(backend))
    }

    pub fn from_backend(backend: Arc<dyn ExecutorBackend>) -> Self {
        Self { backend }
    }

    /// An execution context on the current tokio runtime.
    pub fn tokio() -> TaskResult<Self> {
        Ok(Self::new(TokioBackend::current()?))
    }

    /// Submit a top-level task.
    pub fn submit<T: TaskValue>(&self, task: &Task<T>) -> TaskResult<()> {
        self.submit_with(task.as_task_ref(), Submission::default())
    }

    /// Submit any task. Fails if it was already submitted or is finished.
    pub fn submit_with(&self, task: TaskRef, submission: Submission) -> TaskResult<()> {
        task.core().mark_submitted()?;
        if let Some(submitter) = submission.submitted_by {
            task.core().set_submitted_by(submitter);
        }
        debug!(task = %task.name(), id = %task.id(), "submitting task");
        let job = task.start(self.clone(), submission.queueing);
        self.backend.spawn(job);
        Ok(())
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext").finish_non_exhaustive()
    }
}
