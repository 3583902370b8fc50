// src/config/validate.rs

use std::collections::BTreeSet;

use crate::config::model::{EffectorConfig, EngineSection, PlanFile, RawPlanFile, StepConfig};
use crate::errors::{DynataskError, Result};

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = crate::errors::DynataskError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw.engine, raw.effector))
    }
}

/// Check a raw plan without converting it.
pub fn validate_plan(plan: &RawPlanFile) -> Result<()> {
    validate_engine(&plan.engine)?;
    validate_effector(&plan.effector)?;
    Ok(())
}

fn validate_engine(engine: &EngineSection) -> Result<()> {
    if engine.coordinator_tick_ms == 0 {
        return Err(DynataskError::ConfigError(
            "[engine].coordinator_tick_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if engine.drain_timeout_secs == Some(0) {
        return Err(DynataskError::ConfigError(
            "[engine].drain_timeout_secs must be >= 1 when set (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_effector(effector: &EffectorConfig) -> Result<()> {
    if effector.name.trim().is_empty() {
        return Err(DynataskError::ConfigError(
            "[effector].name must not be empty".to_string(),
        ));
    }
    if effector.primary.is_none() && effector.step.is_empty() {
        return Err(DynataskError::ConfigError(format!(
            "effector '{}' has neither a `primary` command nor any steps",
            effector.name
        )));
    }
    validate_steps(&effector.name, &effector.step)
}

fn validate_steps(parent: &str, steps: &[StepConfig]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for step in steps {
        if step.name.trim().is_empty() {
            return Err(DynataskError::ConfigError(format!(
                "a step of '{parent}' has an empty name"
            )));
        }
        if !seen.insert(step.name.as_str()) {
            return Err(DynataskError::ConfigError(format!(
                "'{}' has more than one step named '{}'",
                parent, step.name
            )));
        }
        match (&step.cmd, step.is_group()) {
            (Some(_), true) => {
                return Err(DynataskError::ConfigError(format!(
                    "step '{}' has both `cmd` and nested steps",
                    step.name
                )));
            }
            (None, false) => {
                return Err(DynataskError::ConfigError(format!(
                    "step '{}' needs either `cmd` or nested steps",
                    step.name
                )));
            }
            _ => {}
        }
        validate_steps(&step.name, &step.step)?;
    }
    Ok(())
}
