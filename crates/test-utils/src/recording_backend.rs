use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dynatask::exec::{ExecutorBackend, Job};

/// A backend that:
/// - counts every job it is handed
/// - runs them on the current tokio runtime.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    spawned: Arc<AtomicUsize>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs submitted so far.
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

impl ExecutorBackend for RecordingBackend {
    fn spawn(&self, job: Job) {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(job);
    }
}
