// src/task/mod.rs

//! Tasks: units of work with a lifecycle, a name, tags and a single outcome.
//!
//! - [`core`] holds the type-erased metadata and the state machine.
//! - [`handle`] provides the typed [`Task`] handle and the [`AnyTask`] view.
//! - [`builder`] builds simple and dynamic tasks.
//! - [`context`] is what a running body sees ([`TaskContext`]).
//! - [`runner`] runs a body so it can be interrupted.

pub mod builder;
pub mod context;
pub mod core;
pub mod handle;
pub(crate) mod runner;

pub use builder::{TaskBuilder, sequential};
pub use context::TaskContext;
pub use self::core::{COMPOUND_TAG, INTERNAL_TAG, SUB_TASK_TAG, TaskCore, TaskId, TaskLink, Timestamps};
pub use handle::{AnyTask, AnyValue, BoxFuture, Task, TaskRef, TaskValue};
