// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] provides the `ExecutorBackend` trait and the tokio-backed
//!   implementation used in production, which tests can wrap or replace.
//! - [`context`] provides the [`ExecutionContext`] tasks are submitted to.
//! - [`command`] runs shell commands for command tasks.

pub mod backend;
pub mod command;
pub mod context;

pub use backend::{ExecutorBackend, Job, TokioBackend};
pub use command::{COMMAND_TAG, CommandOutput, command_task, run_command};
pub use context::{ExecutionContext, Submission};
