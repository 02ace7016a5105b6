//! Runs activation commands.

use std::process::Command;

use anyhow::Context;
use tracing::debug;

/// Exit information of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    /// Human-readable exit status, e.g. `exit status: 100`.
    pub status: String,
    pub stderr: String,
}

impl CommandOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            status: "exit status: 0".to_string(),
            stderr: String::new(),
        }
    }
}

pub trait CommandRunner {
    /// Run `argv`. `Err` only if the command could not be started.
    fn run(&self, argv: &[String]) -> anyhow::Result<CommandOutcome>;
}

/// Runs commands as child processes, without a shell.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, argv: &[String]) -> anyhow::Result<CommandOutcome> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("Cannot run an empty command"))?;
        debug!(program = %program, ?args, "running command");
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("Failed to run '{}'", program))?;
        Ok(CommandOutcome {
            success: output.status.success(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
