// src/dynamic/join.rs

//! Waiting for a composite's secondary jobs.

use std::time::Duration;

use tokio::time::Instant;

use crate::dynamic::jobs::JobQueue;
use crate::errors::TaskResult;
use crate::task::{AnyTask, TaskCore};
use crate::types::JoinStatus;

/// Sets blocking details on the caller for as long as it lives.
struct Blocked<'a>(Option<&'a TaskCore>);

impl<'a> Blocked<'a> {
    fn on(caller: Option<&'a TaskCore>, details: impl FnOnce() -> String) -> Self {
        if let Some(core) = caller {
            core.set_blocking_details(details());
        }
        Self(caller)
    }
}

impl Drop for Blocked<'_> {
    fn drop(&mut self) {
        if let Some(core) = self.0 {
            core.reset_blocking_details();
        }
    }
}

/// Wait until one of:
///
/// 1. the coordinator has finished ([`JoinStatus::Finished`])
/// 2. the timeout elapsed ([`JoinStatus::TimedOut`])
/// 3. `include_primary` is false and no job is running or queued
///    ([`JoinStatus::SecondariesDrained`])
///
/// While a job runs we wait on it directly; otherwise we wait for the next
/// change to the queue, re-checking at least once per tick.
pub(crate) async fn join(
    jobs: &JobQueue,
    owner: &TaskCore,
    caller: Option<&TaskCore>,
    include_primary: bool,
    timeout: Option<Duration>,
) -> JoinStatus {
    let deadline = timeout.map(|limit| Instant::now() + limit);

    loop {
        let mut changes = jobs.subscribe();
        let (current, remaining) = {
            let state = jobs.lock();
            if state.finished {
                return JoinStatus::Finished;
            }
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => jobs.tick(),
            };
            if remaining.is_zero() {
                return JoinStatus::TimedOut;
            }
            if !include_primary && state.current.is_none() && state.remaining.is_empty() {
                return JoinStatus::SecondariesDrained;
            }
            (state.current.clone(), remaining)
        };

        match current {
            Some(child) if !child.is_done() => {
                let _blocked = Blocked::on(caller, || format!("waiting on task {}", child.name()));
                child.core().wait_done_for(remaining).await;
            }
            _ => {
                let _blocked = Blocked::on(caller, || format!("waiting on task {}", owner.name()));
                jobs.wait_for_change(&mut changes, remaining).await;
            }
        }
    }
}

/// [`AnyTask::join`], then, if asked, surface the first error: the task's own
/// error first, then its children's in queue order.
///
/// With `include_primary`, a `Finished` join also waits for the task itself
/// to record its outcome, which happens just after its coordinator stops.
pub(crate) async fn drain(
    task: &dyn AnyTask,
    caller: Option<&TaskCore>,
    timeout: Option<Duration>,
    include_primary: bool,
    throw_first_error: bool,
) -> TaskResult<JoinStatus> {
    let deadline = timeout.map(|limit| Instant::now() + limit);
    let mut status = task.join(caller, include_primary, timeout).await;
    if include_primary && status == JoinStatus::Finished && !task.is_done() {
        let _blocked = Blocked::on(caller, || format!("waiting on task {}", task.name()));
        let done = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                task.core().wait_done_for(remaining).await
            }
            None => {
                task.core().wait_done().await;
                true
            }
        };
        if !done {
            status = JoinStatus::TimedOut;
        }
    }
    if throw_first_error {
        if let Some(err) = task.error() {
            return Err(err);
        }
        if let Some(err) = task.children().iter().find_map(|child| child.error()) {
            return Err(err);
        }
    }
    Ok(status)
}
