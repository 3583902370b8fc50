// src/errors.rs

//! Crate-wide error types.
//!
//! - [`TaskError`] is the terminal error recorded on a task. It is `Clone`
//!   so every caller of `get()` can receive its own copy.
//! - [`DynataskError`] is the application-level error used by config loading
//!   and the CLI.

use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// Queueing into a finished composite, submitting twice, and similar
    /// misuse of a task's lifecycle.
    #[error("invalid task state: {0}")]
    InvalidState(String),

    /// The task's own body returned an error.
    #[error("task '{task}' failed: {cause:#}")]
    PrimaryFailure {
        task: String,
        cause: Arc<anyhow::Error>,
    },

    /// A secondary job queued into `parent` failed.
    #[error("child task '{child}' of '{parent}' failed: {cause}")]
    ChildFailure {
        parent: String,
        child: String,
        #[source]
        cause: Box<TaskError>,
    },

    #[error("task '{task}' was cancelled")]
    Cancelled { task: String },

    /// The body panicked. Never swallowed.
    #[error("task '{task}' aborted with a fatal error: {message}")]
    Fatal { task: String, message: String },
}

impl TaskError {
    /// Convert the error returned by a task body.
    ///
    /// A body that propagates another task's error with `?` keeps the original
    /// `TaskError` instead of wrapping it a second time.
    pub fn from_body(task: &str, err: anyhow::Error) -> Self {
        match err.downcast::<TaskError>() {
            Ok(task_err) => task_err,
            Err(err) => TaskError::PrimaryFailure {
                task: task.to_string(),
                cause: Arc::new(err),
            },
        }
    }

    /// True if this error, or any child failure it wraps, is fatal.
    pub fn is_fatal(&self) -> bool {
        match self {
            TaskError::Fatal { .. } => true,
            TaskError::ChildFailure { cause, .. } => cause.is_fatal(),
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled { .. })
    }

    /// Name of the task the failure originated in, following child failures
    /// down to the innermost one.
    pub fn origin(&self) -> Option<&str> {
        match self {
            TaskError::InvalidState(_) => None,
            TaskError::PrimaryFailure { task, .. }
            | TaskError::Cancelled { task }
            | TaskError::Fatal { task, .. } => Some(task),
            TaskError::ChildFailure { cause, child, .. } => {
                cause.origin().or(Some(child.as_str()))
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum DynataskError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DynataskError>;
pub type TaskResult<T> = std::result::Result<T, TaskError>;
