//! Host execution seam.
//!
//! Every side effect the pipeline has on the machine (running a command,
//! writing or appending a file) goes through [`HostExecutor`], so stages can be
//! exercised against a scratch directory or a mock.

mod dry_run;
mod system;

use async_trait::async_trait;
use std::fmt;
use std::path::Path;

use crate::{ProvisionError, ProvisionResult};

pub use dry_run::DryRunHost;
pub use system::SystemHost;

#[cfg(test)]
use mockall::automock;

/// A command line to run on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Needs root; run through sudo when enabled
    pub privileged: bool,
    /// Only inspects host state; safe to run during a dry run
    pub read_only: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            privileged: false,
            read_only: false,
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

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{}={} ", key, value)?;
        }
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait HostExecutor: Send + Sync {
    /// Run a command to completion. A non-zero exit is not an error here;
    /// see [`run_checked`].
    async fn run(&self, command: &CommandSpec) -> ProvisionResult<CommandOutput>;

    /// Replace the whole file
    async fn write_file(&self, path: &Path, contents: &str, privileged: bool) -> ProvisionResult<()>;

    async fn append_file(&self, path: &Path, contents: &str, privileged: bool) -> ProvisionResult<()>;

    /// `Ok(None)` when the file does not exist
    async fn read_file(&self, path: &Path) -> ProvisionResult<Option<String>>;
}

/// Run a command and turn a non-zero exit into an error
pub async fn run_checked(
    host: &dyn HostExecutor,
    command: &CommandSpec,
) -> ProvisionResult<CommandOutput> {
    let output = host.run(command).await?;
    if output.success() {
        return Ok(output);
    }
    Err(failure_error(command, &output))
}

/// Error for a command that exited non-zero; permission problems in stderr
/// become [`ProvisionError::Permission`]
pub(crate) fn failure_error(command: &CommandSpec, output: &CommandOutput) -> ProvisionError {
    let stderr = output.stderr.trim();
    let last_line = stderr.lines().last().unwrap_or("No output available");
    if is_permission_failure(stderr) {
        return ProvisionError::permission(format!("`{}`: {}", command, last_line));
    }

    ProvisionError::command_failed(command.to_string(), output.exit_code, last_line)
}

fn is_permission_failure(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    [
        "permission denied",
        "operation not permitted",
        "are you root",
        "must be root",
        "a password is required",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}
