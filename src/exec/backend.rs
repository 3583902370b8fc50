// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The execution context hands every submitted task to an `ExecutorBackend`
//! as a ready-to-run job. Production code uses [`TokioBackend`]; tests can
//! provide their own implementation that, for example, records what was
//! submitted before running it.

use std::future::Future;
use std::pin::Pin;

use tokio::runtime::Handle;

use crate::errors::{TaskError, TaskResult};

/// A submitted task, ready to run to completion.
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Trait abstracting where submitted tasks run.
pub trait ExecutorBackend: Send + Sync {
    /// Start running `job`. Must not block waiting for it.
    fn spawn(&self, job: Job);
}

/// Runs jobs on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioBackend {
    handle: Handle,
}

impl TokioBackend {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime we are currently running on.
    pub fn current() -> TaskResult<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|err| TaskError::InvalidState(format!("no tokio runtime available: {err}")))
    }
}

impl ExecutorBackend for TokioBackend {
    fn spawn(&self, job: Job) {
        // Detached: completion is observed through the task itself.
        drop(self.handle.spawn(job));
    }
}
