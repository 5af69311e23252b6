//! Stage worker backed by an external shell command.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use super::{StageContext, StageWorker};
use crate::errors::StageError;

/// Lines of stderr carried into a failure message.
const STDERR_TAIL_LINES: usize = 20;

/// Runs `sh -c <command>` in the project directory.
///
/// Exit 0 is success. Exit 126/127 (not executable / not found) is a fatal
/// configuration error; any other non-zero exit is transient.
pub struct CommandWorker {
    command: String,
}

impl CommandWorker {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn build(&self, ctx: &StageContext) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.command)
            .current_dir(&ctx.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .env("FOUNDRY_STAGE", ctx.stage.as_str())
            .env("FOUNDRY_PROJECT_DIR", &ctx.project_dir)
            .env("FOUNDRY_SIGNALS_DIR", ctx.store.signals_dir())
            .env("FOUNDRY_WORK_ITEMS_DIR", ctx.store.work_items_dir());
        if let Some(rules_file) = &ctx.rules_file {
            cmd.env("FOUNDRY_RULES_FILE", rules_file);
        }
        if let Some(description) = &ctx.description_file {
            cmd.env("FOUNDRY_DESCRIPTION_FILE", description);
        }
        cmd
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[async_trait]
impl StageWorker for CommandWorker {
    async fn execute(&self, ctx: &StageContext) -> Result<(), StageError> {
        tracing::debug!(command = %self.command, "Spawning stage command");

        let output = self.build(ctx).output().await.map_err(|e| {
            StageError::fatal(
                anyhow::Error::new(e)
                    .context(format!("Failed to spawn stage command: {}", self.command)),
            )
        })?;

        if output.status.success() {
            tracing::debug!(
                stdout_bytes = output.stdout.len(),
                "Stage command finished"
            );
            return Ok(());
        }

        let code = output.status.code().unwrap_or(-1);
        let tail = stderr_tail(&output.stderr);
        let message = if tail.is_empty() {
            format!("Stage command '{}' exited with code {}", self.command, code)
        } else {
            format!(
                "Stage command '{}' exited with code {}: {}",
                self.command, code, tail
            )
        };

        match code {
            126 | 127 => Err(StageError::fatal(anyhow::anyhow!(message))),
            _ => Err(StageError::transient(message)),
        }
    }
}
