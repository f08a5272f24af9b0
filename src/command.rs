//! External tool command builder and runner.

use crate::error::PipelineError;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// What counts as a successful invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessPredicate {
    ExitZero,
}

/// Builder for one invocation of an external tool. The argument list is explicit so the
/// decision logic that picks arguments never touches process plumbing.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    /// Stage name used in error reports
    pub stage: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
    pub success: SuccessPredicate,
}

#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolCommand {
    pub fn new(stage: impl Into<String>, program: impl AsRef<Path>) -> Self {
        ToolCommand {
            stage: stage.into(),
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            timeout: None,
            success: SuccessPredicate::ExitZero,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds a `--name value` pair.
    pub fn opt(self, name: &str, value: impl ToString) -> Self {
        self.arg(format!("--{}", name)).arg(value.to_string())
    }

    pub fn path_opt(self, name: &str, value: &Path) -> Self {
        self.opt(name, value.to_string_lossy())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn is_success(&self, output: &ToolOutput) -> bool {
        match self.success {
            SuccessPredicate::ExitZero => output.exit_code == Some(0),
        }
    }

    pub fn display(&self) -> String {
        format!("{} {}", self.program.to_string_lossy(), self.args.join(" "))
    }

    /// The first argument, which for the mesh tools names the sub-step.
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(|s| s.as_str())
    }
}

/// Executes tool commands. The orchestrator only ever talks to this trait, so tests can record
/// or fake invocations.
#[async_trait::async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, cmd: &ToolCommand) -> Result<ToolOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

#[async_trait::async_trait]
impl ToolRunner for SystemRunner {
    async fn run(&self, cmd: &ToolCommand) -> Result<ToolOutput> {
        info!("Running: {}", cmd.display());

        let child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|why| {
                if why.kind() == std::io::ErrorKind::NotFound {
                    PipelineError::MissingDependency(cmd.program.to_string_lossy().to_string())
                        .into()
                } else {
                    anyhow::Error::from(why)
                }
            })?;

        let output = match cmd.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output?,
                Err(_) => {
                    warn!("{} timed out after {} seconds", cmd.display(), limit.as_secs());
                    return Err(PipelineError::Timeout {
                        stage: cmd.stage.clone(),
                        seconds: limit.as_secs(),
                    }
                    .into());
                }
            },
            None => child.wait_with_output().await?,
        };

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Runs `cmd` and turns a failed success predicate into `PipelineError::ExternalTool`.
pub async fn run_checked(runner: &dyn ToolRunner, cmd: &ToolCommand) -> Result<ToolOutput> {
    let output = runner.run(cmd).await?;
    if cmd.is_success(&output) {
        Ok(output)
    } else {
        error!("{} failed: {}", cmd.stage, output.stderr.trim());
        Err(PipelineError::ExternalTool {
            stage: cmd.stage.clone(),
            program: cmd.program.to_string_lossy().to_string(),
            exit_code: output.exit_code,
            stderr: output.stderr.trim().to_owned(),
        }
        .into())
    }
}
