// src/introspect.rs

//! Read-only snapshots of task trees, for logging and the CLI.

use std::fmt::Write as _;
use std::time::Duration;

use crate::task::{AnyTask, TaskId, TaskLink};
use crate::types::TaskState;

#[derive(Debug, Clone)]
pub struct TaskSummary {
    pub id: TaskId,
    pub name: String,
    pub state: TaskState,
    pub tags: Vec<String>,
    pub parent: Option<TaskLink>,
    pub submitted_by: Option<TaskLink>,
    pub blocking_details: Option<String>,
    pub error: Option<String>,
    pub elapsed: Option<Duration>,
    pub children: Vec<TaskSummary>,
}

impl TaskSummary {
    /// Snapshot `task` and, recursively, its children.
    pub fn of(task: &dyn AnyTask) -> Self {
        let core = task.core();
        Self {
            id: core.id(),
            name: core.name().to_string(),
            state: core.state(),
            tags: core.tags().into_iter().collect(),
            parent: core.parent().cloned(),
            submitted_by: core.submitted_by().cloned(),
            blocking_details: core.blocking_details(),
            error: task.error().map(|err| err.to_string()),
            elapsed: core.timestamps().elapsed(),
            children: task
                .children()
                .iter()
                .map(|child| TaskSummary::of(child.as_ref()))
                .collect(),
        }
    }

    /// Depth-first search by name.
    pub fn find(&self, name: &str) -> Option<&TaskSummary> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    /// Number of tasks in this tree, including the root.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TaskSummary::count).sum::<usize>()
    }
}

/// Render a summary as an indented tree, one task per line.
pub fn render_tree(summary: &TaskSummary) -> String {
    let mut out = String::new();
    render_into(&mut out, summary, 0);
    out
}

fn render_into(out: &mut String, summary: &TaskSummary, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = write!(out, "{indent}- {} [{}]", summary.name, summary.state);
    if let Some(elapsed) = summary.elapsed {
        let _ = write!(out, " {}ms", elapsed.as_millis());
    }
    if !summary.tags.is_empty() {
        let _ = write!(out, " tags={}", summary.tags.join(","));
    }
    if let Some(details) = &summary.blocking_details {
        let _ = write!(out, " ({details})");
    }
    if let Some(error) = &summary.error {
        let _ = write!(out, " error: {error}");
    }
    out.push('\n');
    for child in &summary.children {
        render_into(out, child, depth + 1);
    }
}
