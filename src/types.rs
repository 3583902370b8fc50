use std::fmt;

/// Lifecycle state of a task.
///
/// ```text
/// CREATED -> QUEUED -> SUBMITTED -> STARTED -> { ENDED | ERROR | CANCELLED }
/// ```
///
/// `Queued` only applies to secondary jobs of a composite that have not been
/// submitted yet. A task may skip it (and may be cancelled from any
/// non-terminal state). Once terminal, the state never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Created,
    Queued,
    Submitted,
    Started,
    Ended,
    Error,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Ended | TaskState::Error | TaskState::Cancelled)
    }

    /// True once the task has been handed to an execution context (including
    /// every terminal state reached after that).
    pub fn is_submitted(self) -> bool {
        !matches!(self, TaskState::Created | TaskState::Queued)
    }
}

impl Default for TaskState {
    fn default() -> Self {
        TaskState::Created
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Created => "CREATED",
            TaskState::Queued => "QUEUED",
            TaskState::Submitted => "SUBMITTED",
            TaskState::Started => "STARTED",
            TaskState::Ended => "ENDED",
            TaskState::Error => "ERROR",
            TaskState::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Non-error outcome of `join` / `drain`.
///
/// A timeout is not a failure: the composite may still be running and the
/// caller decides what to do by re-querying its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStatus {
    /// The composite's secondary-job coordinator has finished.
    Finished,
    /// No secondary job is running or queued, and the caller did not ask to
    /// wait for the primary computation.
    SecondariesDrained,
    /// The timeout elapsed first.
    TimedOut,
}
