// src/config/mod.rs

//! Plan files: a TOML description of an effector and its steps.
//!
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a plan from disk (`loader.rs`).
//! - Validate it (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_plan_path, load_and_validate, load_from_path};
pub use model::{EffectorConfig, EngineSection, PlanFile, RawPlanFile, StepConfig};
pub use validate::validate_plan;
