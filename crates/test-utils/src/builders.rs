#![allow(dead_code)]

use dynatask::config::{EffectorConfig, EngineSection, PlanFile, RawPlanFile, StepConfig};

/// Builder for `PlanFile` to simplify test setup.
pub struct PlanFileBuilder {
    plan: RawPlanFile,
}

impl PlanFileBuilder {
    pub fn new(effector: &str) -> Self {
        Self {
            plan: RawPlanFile {
                engine: EngineSection::default(),
                effector: EffectorConfig {
                    name: effector.to_string(),
                    tags: vec![],
                    primary: None,
                    swallow_children_failures: None,
                    cancel_remaining_on_failure: None,
                    step: vec![],
                },
            },
        }
    }

    pub fn primary(mut self, cmd: &str) -> Self {
        self.plan.effector.primary = Some(cmd.to_string());
        self
    }

    pub fn with_step(mut self, step: StepConfig) -> Self {
        self.plan.effector.step.push(step);
        self
    }

    pub fn coordinator_tick_ms(mut self, ms: u64) -> Self {
        self.plan.engine.coordinator_tick_ms = ms;
        self
    }

    pub fn swallow_children_failures(mut self, val: bool) -> Self {
        self.plan.engine.swallow_children_failures = val;
        self
    }

    pub fn cancel_remaining_on_failure(mut self, val: bool) -> Self {
        self.plan.engine.cancel_remaining_on_failure = val;
        self
    }

    pub fn raw(self) -> RawPlanFile {
        self.plan
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.plan).expect("Failed to build valid plan from builder")
    }
}

/// Builder for `StepConfig`.
pub struct StepConfigBuilder {
    step: StepConfig,
}

impl StepConfigBuilder {
    fn empty(name: &str) -> StepConfig {
        StepConfig {
            name: name.to_string(),
            cmd: None,
            tags: vec![],
            swallow_children_failures: None,
            cancel_remaining_on_failure: None,
            step: vec![],
        }
    }

    /// A command step.
    pub fn command(name: &str, cmd: &str) -> Self {
        let mut step = Self::empty(name);
        step.cmd = Some(cmd.to_string());
        Self { step }
    }

    /// A group step; add children with [`StepConfigBuilder::with_step`].
    pub fn group(name: &str) -> Self {
        Self {
            step: Self::empty(name),
        }
    }

    pub fn with_step(mut self, step: StepConfig) -> Self {
        self.step.step.push(step);
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.step.tags.push(tag.to_string());
        self
    }

    pub fn swallow_children_failures(mut self, val: bool) -> Self {
        self.step.swallow_children_failures = Some(val);
        self
    }

    pub fn build(self) -> StepConfig {
        self.step
    }
}
