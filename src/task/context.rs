// src/task/context.rs

//! The handle a running body uses to reach its surroundings.

use std::fmt;
use std::time::Duration;

use crate::dynamic;
use crate::errors::{TaskError, TaskResult};
use crate::exec::{ExecutionContext, Submission};
use crate::task::handle::{Task, TaskRef, TaskValue};
use crate::types::JoinStatus;

/// Passed to every task body.
///
/// Carries the task being run, the execution context it runs on, and the
/// queueing context: the innermost dynamic task enclosing it, if any. For
/// the primary body of a dynamic task that is the task itself; secondary
/// jobs inherit their composite.
#[derive(Clone)]
pub struct TaskContext {
    task: TaskRef,
    execution: ExecutionContext,
    queueing: Option<TaskRef>,
}

impl TaskContext {
    pub(crate) fn new(task: TaskRef, execution: ExecutionContext, queueing: Option<TaskRef>) -> Self {
        Self {
            task,
            execution,
            queueing,
        }
    }

    pub fn current_task(&self) -> &TaskRef {
        &self.task
    }

    pub fn execution(&self) -> &ExecutionContext {
        &self.execution
    }

    pub fn queueing_task(&self) -> Option<&TaskRef> {
        self.queueing.as_ref()
    }

    /// Queue `task` into the enclosing dynamic task.
    pub fn queue<U: TaskValue>(&self, task: Task<U>) -> TaskResult<Task<U>> {
        let owner = self.require_queueing(task.name())?;
        owner.queue_child(task.as_task_ref())?;
        Ok(task)
    }

    /// Queue into the enclosing dynamic task if there is one, otherwise
    /// submit `task` directly.
    pub fn queue_if_possible<U: TaskValue>(&self, task: Task<U>) -> TaskResult<Task<U>> {
        if self.queueing.is_some() {
            self.queue(task)
        } else {
            self.submit(task)
        }
    }

    /// Submit `task` to this execution context, outside any composite. It
    /// runs concurrently and inherits this task's queueing context.
    pub fn submit<U: TaskValue>(&self, task: Task<U>) -> TaskResult<Task<U>> {
        let submission = Submission {
            submitted_by: Some(self.task.core().link()),
            queueing: self.queueing.clone(),
        };
        self.execution.submit_with(task.as_task_ref(), submission)?;
        Ok(task)
    }

    /// Drain the enclosing dynamic task. Blocking details are reported on the
    /// current task while waiting.
    ///
    /// A primary body draining its own composite should pass
    /// `include_primary = false`, otherwise it waits for itself.
    pub async fn drain(
        &self,
        timeout: Option<Duration>,
        include_primary: bool,
        throw_first_error: bool,
    ) -> TaskResult<JoinStatus> {
        let owner = self.require_queueing("drain")?;
        dynamic::drain(
            owner.as_ref(),
            Some(self.task.core()),
            timeout,
            include_primary,
            throw_first_error,
        )
        .await
    }

    pub fn set_blocking_details(&self, details: impl Into<String>) {
        self.task.core().set_blocking_details(details);
    }

    pub fn reset_blocking_details(&self) {
        self.task.core().reset_blocking_details();
    }

    fn require_queueing(&self, what: &str) -> TaskResult<&TaskRef> {
        self.queueing.as_ref().ok_or_else(|| {
            TaskError::InvalidState(format!(
                "task '{}' has no enclosing dynamic task (for '{}')",
                self.task.name(),
                what
            ))
        })
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("task", &self.task.name())
            .field(
                "queueing",
                &self.queueing.as_ref().map(|owner| owner.name().to_string()),
            )
            .finish()
    }
}
