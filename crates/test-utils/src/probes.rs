#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dynatask::{Task, TaskBuilder};

/// Shared, ordered record of what happened during a test.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.events.lock().unwrap().iter().any(|e| e == event)
    }
}

/// Tracks how many probed bodies run at the same time.
#[derive(Clone, Default)]
pub struct ConcurrencyProbe {
    active: Arc<AtomicUsize>,
    max: Arc<AtomicUsize>,
}

impl ConcurrencyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> ProbeGuard {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        ProbeGuard(Arc::clone(&self.active))
    }

    pub fn max_concurrency(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

pub struct ProbeGuard(Arc<AtomicUsize>);

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A task that logs `start:<name>`, sleeps, logs `end:<name>` and returns `value`.
pub fn logged_task<T>(name: &str, log: &EventLog, delay: Duration, value: T) -> Task<T>
where
    T: Clone + Send + Sync + 'static,
{
    let log = log.clone();
    let label = name.to_string();
    TaskBuilder::new()
        .name(name)
        .body(move |_ctx| async move {
            log.push(format!("start:{label}"));
            tokio::time::sleep(delay).await;
            log.push(format!("end:{label}"));
            Ok(value)
        })
        .build()
        .unwrap()
}

/// Like [`logged_task`], also recording concurrency in `probe`.
pub fn probed_task(name: &str, log: &EventLog, probe: &ConcurrencyProbe, delay: Duration) -> Task<String> {
    let log = log.clone();
    let probe = probe.clone();
    let label = name.to_string();
    TaskBuilder::new()
        .name(name)
        .body(move |_ctx| async move {
            let _guard = probe.enter();
            log.push(format!("start:{label}"));
            tokio::time::sleep(delay).await;
            log.push(format!("end:{label}"));
            Ok(label)
        })
        .build()
        .unwrap()
}

/// A task whose body fails with `message`.
pub fn failing_task<T>(name: &str, message: &str) -> Task<T>
where
    T: Clone + Send + Sync + 'static,
{
    let message = message.to_string();
    TaskBuilder::new()
        .name(name)
        .body(move |_ctx| async move { Err(anyhow::anyhow!(message)) })
        .build()
        .unwrap()
}

/// A task that sleeps for a long time unless cancelled with interruption.
pub fn sleeping_task(name: &str, duration: Duration) -> Task<()> {
    TaskBuilder::new()
        .name(name)
        .body(move |_ctx| async move {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .build()
        .unwrap()
}
