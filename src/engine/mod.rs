// src/engine/mod.rs

//! The engine: an execution context plus the policy defaults applied to the
//! dynamic tasks it builds from plans.

pub mod effector;

use tracing::info;

use crate::config::{EngineSection, PlanFile};
use crate::dynamic::DynamicPolicy;
use crate::errors::TaskResult;
use crate::exec::ExecutionContext;
use crate::task::{Task, TaskValue};

pub use effector::{EFFECTOR_TAG, EffectorOutput, StepOutput, effector_task, step_task};

#[derive(Debug, Clone)]
pub struct Engine {
    execution: ExecutionContext,
    defaults: DynamicPolicy,
}

impl Engine {
    pub fn new(execution: ExecutionContext, defaults: DynamicPolicy) -> Self {
        Self {
            execution,
            defaults,
        }
    }

    /// An engine on the current tokio runtime, configured from `[engine]`.
    pub fn from_config(engine: &EngineSection) -> TaskResult<Self> {
        Ok(Self::new(ExecutionContext::tokio()?, engine.policy()))
    }

    pub fn execution(&self) -> &ExecutionContext {
        &self.execution
    }

    pub fn defaults(&self) -> DynamicPolicy {
        self.defaults
    }

    pub fn submit<T: TaskValue>(&self, task: &Task<T>) -> TaskResult<()> {
        self.execution.submit(task)
    }

    /// Build the plan's effector and submit it.
    pub fn invoke(&self, plan: &PlanFile) -> TaskResult<Task<EffectorOutput>> {
        let task = effector_task(&plan.effector, self.defaults)?;
        self.submit(&task)?;
        info!(
            effector = %task.name(),
            id = %task.id(),
            steps = plan.step_count(),
            "effector invoked"
        );
        Ok(task)
    }
}
