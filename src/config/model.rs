// src/config/model.rs

use serde::Deserialize;

use crate::dynamic::{DEFAULT_COORDINATOR_TICK, DynamicPolicy};

/// Top-level plan as read from a TOML file:
///
/// ```toml
/// [engine]
/// coordinator_tick_ms = 250
/// cancel_remaining_on_failure = true
///
/// [effector]
/// name = "deploy"
/// primary = "echo starting"
///
/// [[effector.step]]
/// name = "install"
/// cmd = "echo install"
///
/// [[effector.step]]
/// name = "configure"
///
///   [[effector.step.step]]
///   name = "write-config"
///   cmd = "echo config"
/// ```
///
/// This is the unvalidated form; convert it with `PlanFile::try_from`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanFile {
    #[serde(default)]
    pub engine: EngineSection,

    pub effector: EffectorConfig,
}

/// A validated plan.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub engine: EngineSection,
    pub effector: EffectorConfig,
}

impl PlanFile {
    /// Only called after validation.
    pub(crate) fn new_unchecked(engine: EngineSection, effector: EffectorConfig) -> Self {
        Self { engine, effector }
    }

    /// Number of steps at every nesting level.
    pub fn step_count(&self) -> usize {
        count_steps(&self.effector.step)
    }
}

fn count_steps(steps: &[StepConfig]) -> usize {
    steps.iter().map(|step| 1 + count_steps(&step.step)).sum()
}

/// `[engine]` section: defaults for every dynamic task the plan builds.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_coordinator_tick_ms")]
    pub coordinator_tick_ms: u64,

    #[serde(default)]
    pub swallow_children_failures: bool,

    #[serde(default)]
    pub cancel_remaining_on_failure: bool,

    /// How long the CLI waits for the effector before cancelling it.
    #[serde(default)]
    pub drain_timeout_secs: Option<u64>,
}

fn default_coordinator_tick_ms() -> u64 {
    DEFAULT_COORDINATOR_TICK.as_millis() as u64
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            coordinator_tick_ms: default_coordinator_tick_ms(),
            swallow_children_failures: false,
            cancel_remaining_on_failure: false,
            drain_timeout_secs: None,
        }
    }
}

impl EngineSection {
    pub fn policy(&self) -> DynamicPolicy {
        DynamicPolicy {
            swallow_children_failures: self.swallow_children_failures,
            cancel_remaining_on_failure: self.cancel_remaining_on_failure,
            coordinator_tick: std::time::Duration::from_millis(self.coordinator_tick_ms),
        }
    }
}

/// `[effector]` section: the top-level dynamic task.
#[derive(Debug, Clone, Deserialize)]
pub struct EffectorConfig {
    pub name: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Command run as the effector's primary job, before it queues its steps.
    #[serde(default)]
    pub primary: Option<String>,

    #[serde(default)]
    pub swallow_children_failures: Option<bool>,

    #[serde(default)]
    pub cancel_remaining_on_failure: Option<bool>,

    #[serde(default)]
    pub step: Vec<StepConfig>,
}

impl EffectorConfig {
    pub fn policy(&self, defaults: DynamicPolicy) -> DynamicPolicy {
        with_overrides(
            defaults,
            self.swallow_children_failures,
            self.cancel_remaining_on_failure,
        )
    }
}

/// `[[...step]]`: either a command, or a group of nested steps run in order.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    pub name: String,

    #[serde(default)]
    pub cmd: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub swallow_children_failures: Option<bool>,

    #[serde(default)]
    pub cancel_remaining_on_failure: Option<bool>,

    #[serde(default)]
    pub step: Vec<StepConfig>,
}

impl StepConfig {
    pub fn is_group(&self) -> bool {
        !self.step.is_empty()
    }

    pub fn policy(&self, defaults: DynamicPolicy) -> DynamicPolicy {
        with_overrides(
            defaults,
            self.swallow_children_failures,
            self.cancel_remaining_on_failure,
        )
    }
}

fn with_overrides(
    defaults: DynamicPolicy,
    swallow: Option<bool>,
    cancel_remaining: Option<bool>,
) -> DynamicPolicy {
    DynamicPolicy {
        swallow_children_failures: swallow.unwrap_or(defaults.swallow_children_failures),
        cancel_remaining_on_failure: cancel_remaining
            .unwrap_or(defaults.cancel_remaining_on_failure),
        coordinator_tick: defaults.coordinator_tick,
    }
}
