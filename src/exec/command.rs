// src/exec/command.rs

//! Shell command runner used by command tasks.

use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::task::TaskBuilder;

/// Tag carried by tasks that run a shell command.
pub const COMMAND_TAG: &str = "command";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    /// Captured stdout, trimmed of trailing whitespace.
    pub stdout: String,
}

/// A simple task that runs `cmd` through the platform shell.
pub fn command_task(name: impl Into<String>, cmd: impl Into<String>) -> TaskBuilder<CommandOutput> {
    let cmd = cmd.into();
    TaskBuilder::new()
        .name(name)
        .tag(COMMAND_TAG)
        .body(move |ctx| async move { run_command(ctx.current_task().name(), &cmd).await })
}

/// Run `cmd`, capture stdout and log stderr at debug.
///
/// Dropping the returned future kills the process, so an interrupted task
/// does not leave it behind. A non-zero exit status is an error.
pub async fn run_command(task_name: &str, cmd: &str) -> Result<CommandOutput> {
    info!(task = %task_name, cmd = %cmd, "starting command");

    let mut command = shell(cmd);
    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning process for task '{task_name}'"))?;

    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = child.stderr.take() {
        let task = task_name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task, "stderr: {}", line);
            }
        });
    }

    let stdout = child.stdout.take();
    let (status, stdout) = tokio::join!(child.wait(), collect_stdout(task_name, stdout));
    let status = status.with_context(|| format!("waiting for process of task '{task_name}'"))?;

    let code = status.code().unwrap_or(-1);
    info!(
        task = %task_name,
        exit_code = code,
        success = status.success(),
        "command exited"
    );

    if !status.success() {
        bail!("command `{cmd}` exited with code {code}");
    }

    Ok(CommandOutput {
        exit_code: code,
        stdout: stdout.trim_end().to_string(),
    })
}

fn shell(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

async fn collect_stdout(task_name: &str, stdout: Option<impl AsyncRead + Unpin>) -> String {
    let Some(stdout) = stdout else {
        return String::new();
    };
    let mut out = String::new();
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(task = %task_name, "stdout: {}", line);
        out.push_str(&line);
        out.push('\n');
    }
    out
}
