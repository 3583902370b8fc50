// src/task/core.rs

//! Type-erased task metadata and the lifecycle state machine.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::trace;
use uuid::Uuid;

use crate::errors::{TaskError, TaskResult};
use crate::types::TaskState;

/// Added to every task queued into a dynamic task.
pub const SUB_TASK_TAG: &str = "sub-task";
/// Carried by every dynamic (composite) task.
pub const COMPOUND_TAG: &str = "compound";
/// Carried by engine-internal helper tasks such as the secondary-job manager.
pub const INTERNAL_TAG: &str = "internal";

/// Opaque, unique task identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Lightweight reference to another task (parent, submitter) that does not
/// keep it alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLink {
    pub id: TaskId,
    pub name: String,
}

impl fmt::Display for TaskLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Timestamps {
    pub submitted: Option<Instant>,
    pub started: Option<Instant>,
    pub ended: Option<Instant>,
}

impl Timestamps {
    /// Time spent running: start to end, or start to now while still running.
    pub fn elapsed(&self) -> Option<Duration> {
        let started = self.started?;
        Some(self.ended.unwrap_or_else(Instant::now).saturating_duration_since(started))
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Metadata and state shared by every task regardless of its result type.
pub struct TaskCore {
    id: TaskId,
    name: String,
    tags: Mutex<BTreeSet<String>>,
    state: watch::Sender<TaskState>,
    parent: OnceLock<TaskLink>,
    submitted_by: OnceLock<TaskLink>,
    blocking: Mutex<Option<String>>,
    /// Abort handle of the body while it runs; used to interrupt it.
    running: Mutex<Option<AbortHandle>>,
    interrupt_requested: AtomicBool,
    times: Mutex<Timestamps>,
}

impl TaskCore {
    pub(crate) fn new(name: String, tags: BTreeSet<String>) -> Self {
        let (state, _) = watch::channel(TaskState::Created);
        Self {
            id: TaskId::new(),
            name,
            tags: Mutex::new(tags),
            state,
            parent: OnceLock::new(),
            submitted_by: OnceLock::new(),
            blocking: Mutex::new(None),
            running: Mutex::new(None),
            interrupt_requested: AtomicBool::new(false),
            times: Mutex::new(Timestamps::default()),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn link(&self) -> TaskLink {
        TaskLink {
            id: self.id,
            name: self.name.clone(),
        }
    }

    pub fn tags(&self) -> BTreeSet<String> {
        lock(&self.tags).clone()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        lock(&self.tags).contains(tag)
    }

    /// Tags may be added at any point in the task's life.
    pub fn add_tag(&self, tag: impl Into<String>) -> bool {
        lock(&self.tags).insert(tag.into())
    }

    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.state.subscribe()
    }

    pub fn parent(&self) -> Option<&TaskLink> {
        self.parent.get()
    }

    pub fn submitted_by(&self) -> Option<&TaskLink> {
        self.submitted_by.get()
    }

    pub fn timestamps(&self) -> Timestamps {
        *lock(&self.times)
    }

    /// Why this task is currently blocked, if it said so.
    pub fn blocking_details(&self) -> Option<String> {
        lock(&self.blocking).clone()
    }

    pub fn set_blocking_details(&self, details: impl Into<String>) {
        *lock(&self.blocking) = Some(details.into());
    }

    pub fn reset_blocking_details(&self) {
        lock(&self.blocking).take();
    }

    /// Wait until the task reaches a terminal state.
    pub async fn wait_done(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|state| state.is_terminal()).await;
    }

    /// Returns `false` if the timeout elapsed first.
    pub async fn wait_done_for(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_done()).await.is_ok()
    }

    pub(crate) fn set_parent(&self, parent: TaskLink) -> TaskResult<()> {
        self.parent.set(parent).map_err(|rejected| {
            let existing = self
                .parent
                .get()
                .map(|p| p.name.clone())
                .unwrap_or_default();
            TaskError::InvalidState(format!(
                "task '{}' already belongs to '{}' (cannot add it to '{}')",
                self.name, existing, rejected.name
            ))
        })
    }

    /// First submitter wins.
    pub(crate) fn set_submitted_by(&self, submitter: TaskLink) {
        let _ = self.submitted_by.set(submitter);
    }

    pub(crate) fn mark_queued(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == TaskState::Created {
                *state = TaskState::Queued;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn mark_submitted(&self) -> TaskResult<()> {
        let mut rejected_from = None;
        let changed = self.state.send_if_modified(|state| match state {
            TaskState::Created | TaskState::Queued => {
                *state = TaskState::Submitted;
                true
            }
            other => {
                rejected_from = Some(*other);
                false
            }
        });

        if changed {
            lock(&self.times).submitted = Some(Instant::now());
            return Ok(());
        }

        Err(TaskError::InvalidState(format!(
            "cannot submit task '{}' in state {}",
            self.name,
            rejected_from.unwrap_or(TaskState::Submitted)
        )))
    }

    pub(crate) fn mark_started(&self) -> bool {
        let started = self.state.send_if_modified(|state| {
            if *state == TaskState::Submitted {
                *state = TaskState::Started;
                true
            } else {
                false
            }
        });
        if started {
            lock(&self.times).started = Some(Instant::now());
        }
        started
    }

    /// Move to a terminal state. Only the first call has any effect.
    pub(crate) fn finish(&self, terminal: TaskState) -> bool {
        let finished = self.state.send_if_modified(|state| {
            if state.is_terminal() {
                false
            } else {
                *state = terminal;
                true
            }
        });
        if finished {
            lock(&self.times).ended = Some(Instant::now());
            self.reset_blocking_details();
        }
        finished
    }

    pub(crate) fn attach_running(&self, handle: AbortHandle) {
        let mut running = lock(&self.running);
        if self.interrupt_requested.load(Ordering::SeqCst) {
            trace!(task = %self.name, "interrupt already requested; aborting body on start");
            handle.abort();
        }
        *running = Some(handle);
    }

    pub(crate) fn detach_running(&self) {
        lock(&self.running).take();
    }

    /// Interrupt the running body, or the body as soon as it starts.
    ///
    /// Returns true if a running body was found.
    pub(crate) fn interrupt(&self) -> bool {
        let running = lock(&self.running);
        self.interrupt_requested.store(true, Ordering::SeqCst);
        match running.as_ref() {
            Some(handle) => {
                trace!(task = %self.name, "interrupting running body");
                handle.abort();
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for TaskCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
