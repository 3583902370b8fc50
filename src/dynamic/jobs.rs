// src/dynamic/jobs.rs

//! Shared bookkeeping for a composite's secondary jobs.
//!
//! All fields live under one lock. Every mutation is followed by
//! [`JobQueue::notify_all`], which bumps a generation counter; waiters
//! subscribe *before* inspecting the state, so a change that happens between
//! the check and the wait still wakes them.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;

use crate::task::TaskRef;
use crate::task::core::lock;

#[derive(Default)]
pub(crate) struct SecondaryJobs {
    /// Every job ever queued, in queue order.
    pub all: Vec<TaskRef>,
    /// Jobs not yet taken by the coordinator.
    pub remaining: VecDeque<TaskRef>,
    pub primary_started: bool,
    pub primary_finished: bool,
    /// The job the coordinator is currently waiting on.
    pub current: Option<TaskRef>,
    /// Set once the coordinator stops taking jobs, for whatever reason.
    /// Nothing can be queued after that.
    pub finished: bool,
}

pub(crate) struct JobQueue {
    state: Mutex<SecondaryJobs>,
    generation: watch::Sender<u64>,
    tick: Duration,
}

impl JobQueue {
    pub fn new(tick: Duration) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            state: Mutex::new(SecondaryJobs::default()),
            generation,
            tick,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, SecondaryJobs> {
        lock(&self.state)
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    pub fn notify_all(&self) {
        self.generation
            .send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    /// Wait for the next change, for at most `limit` and never longer than one
    /// tick. Returns `true` if woken by a change.
    pub async fn wait_for_change(&self, changes: &mut watch::Receiver<u64>, limit: Duration) -> bool {
        matches!(
            tokio::time::timeout(limit.min(self.tick), changes.changed()).await,
            Ok(Ok(()))
        )
    }

    pub fn children(&self) -> Vec<TaskRef> {
        self.lock().all.clone()
    }

    pub fn mark_finished(&self) {
        let mut state = self.lock();
        state.current = None;
        state.finished = true;
        self.notify_all();
    }
}

/// Marks the queue finished when dropped.
///
/// Owned by the coordinator's body, so the flag is set when the coordinator
/// returns, fails, is interrupted, or is dropped without ever running.
pub(crate) struct FinishedGuard(Arc<JobQueue>);

impl FinishedGuard {
    pub fn new(jobs: Arc<JobQueue>) -> Self {
        Self(jobs)
    }
}

impl Drop for FinishedGuard {
    fn drop(&mut self) {
        self.0.mark_finished();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn change_made_after_subscribe_is_not_lost() {
        let jobs = JobQueue::new(Duration::from_secs(10));
        let mut changes = jobs.subscribe();
        jobs.lock().primary_finished = true;
        jobs.notify_all();
        assert!(jobs.wait_for_change(&mut changes, Duration::from_secs(10)).await);
    }

    #[tokio::test]
    async fn wait_is_bounded_by_tick() {
        let jobs = JobQueue::new(Duration::from_millis(20));
        let mut changes = jobs.subscribe();
        let woken = jobs.wait_for_change(&mut changes, Duration::from_secs(10)).await;
        assert!(!woken);
    }

    #[test]
    fn guard_marks_finished_on_drop() {
        let jobs = Arc::new(JobQueue::new(Duration::from_secs(1)));
        drop(FinishedGuard::new(Arc::clone(&jobs)));
        assert!(jobs.lock().finished);
    }
}
