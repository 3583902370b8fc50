// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::Result;

/// Load a plan file from a given path and return the raw `RawPlanFile`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] for
/// semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPlanFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let plan: RawPlanFile = toml::from_str(&contents)?;
    Ok(plan)
}

/// Load a plan file and validate it:
///
/// - non-empty effector and step names, unique among siblings
/// - every step is either a command or a group, never both
/// - sane `[engine]` values
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PlanFile> {
    let raw = load_from_path(&path)?;
    let plan = PlanFile::try_from(raw)?;
    Ok(plan)
}

/// `Effector.toml` in the current working directory.
pub fn default_plan_path() -> PathBuf {
    PathBuf::from("Effector.toml")
}
