// src/cli.rs

//! Command line of the `dynatask` plan runner.

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "dynatask",
    version,
    about = "Run a plan of commands as a dynamic task tree.",
    long_about = None
)]
pub struct CliArgs {
    /// Effector plan to run.
    #[arg(long, value_name = "PATH", default_value = "Effector.toml")]
    pub plan: String,

    /// Log verbosity. Takes precedence over `DYNATASK_LOG`; `info` when
    /// neither is given.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the plan and list its steps without running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Cancel the effector if it has not finished after this many seconds.
    ///
    /// Overrides `[engine].drain_timeout_secs`.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
