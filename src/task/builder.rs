// src/task/builder.rs

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use crate::dynamic::{DynamicPolicy, Primary};
use crate::errors::{TaskError, TaskResult};
use crate::task::context::TaskContext;
use crate::task::core::COMPOUND_TAG;
use crate::task::handle::{AnyValue, Body, Task, TaskValue};

/// Builder for simple and dynamic tasks.
///
/// ```ignore
/// let task = TaskBuilder::new()
///     .name("deploy")
///     .dynamic(true)
///     .body(|ctx| async move {
///         ctx.queue(step("install")?)?;
///         Ok("started")
///     })
///     .build()?;
/// ```
pub struct TaskBuilder<T> {
    name: Option<String>,
    tags: BTreeSet<String>,
    dynamic: bool,
    body: Option<Body<T>>,
    collector: Option<Box<dyn FnOnce(Option<Vec<AnyValue>>) -> T + Send>>,
    policy: DynamicPolicy,
}

impl<T: TaskValue> TaskBuilder<T> {
    pub fn new() -> Self {
        Self {
            name: None,
            tags: BTreeSet::new(),
            dynamic: false,
            body: None,
            collector: None,
            policy: DynamicPolicy::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Build a dynamic (composite) task that accepts secondary jobs.
    pub fn dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }

    pub fn body<F, Fut>(mut self, body: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.body = Some(Box::new(move |ctx| Box::pin(body(ctx))));
        self
    }

    /// For a dynamic task without a body: build the result from the
    /// children's results, in queue order. Receives `None` if a child failure
    /// was swallowed.
    pub fn collect_children<F>(mut self, collect: F) -> Self
    where
        F: FnOnce(Option<Vec<AnyValue>>) -> T + Send + 'static,
    {
        self.collector = Some(Box::new(collect));
        self
    }

    pub fn policy(mut self, policy: DynamicPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn swallow_children_failures(mut self, swallow: bool) -> Self {
        self.policy.swallow_children_failures = swallow;
        self
    }

    pub fn cancel_remaining_on_failure(mut self, cancel: bool) -> Self {
        self.policy.cancel_remaining_on_failure = cancel;
        self
    }

    pub fn coordinator_tick(mut self, tick: Duration) -> Self {
        self.policy.coordinator_tick = tick;
        self
    }

    pub fn build(self) -> TaskResult<Task<T>> {
        let name = self.name.unwrap_or_else(|| "task".to_string());

        if !self.dynamic {
            let Some(body) = self.body else {
                return Err(TaskError::InvalidState(format!(
                    "task '{name}' has no body"
                )));
            };
            return Ok(Task::simple(name, self.tags, body));
        }

        if self.policy.coordinator_tick.is_zero() {
            return Err(TaskError::InvalidState(format!(
                "dynamic task '{name}' needs a non-zero coordinator tick"
            )));
        }
        let primary = match (self.body, self.collector) {
            (Some(body), _) => Primary::Body(body),
            (None, Some(collect)) => Primary::Collect(collect),
            (None, None) => {
                return Err(TaskError::InvalidState(format!(
                    "dynamic task '{name}' needs a body or a child result collector"
                )));
            }
        };
        let mut tags = self.tags;
        tags.insert(COMPOUND_TAG.to_string());
        Ok(Task::dynamic(name, tags, primary, self.policy))
    }
}

impl<T: TaskValue> Default for TaskBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A primary-less dynamic task that runs its children in order and returns
/// their results.
///
/// The result is `None` if any child's result is not a `U`, or if a child
/// failure was swallowed.
pub fn sequential<U: TaskValue>(name: impl Into<String>) -> TaskBuilder<Option<Vec<U>>> {
    TaskBuilder::new()
        .name(name)
        .dynamic(true)
        .collect_children(|values| {
            values.and_then(|values| {
                values
                    .iter()
                    .map(|value| (**value).downcast_ref::<U>().cloned())
                    .collect()
            })
        })
}
