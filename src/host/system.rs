use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{failure_error, CommandOutput, CommandSpec, HostExecutor};
use crate::{ProvisionError, ProvisionResult};

/// Executes commands and file writes on the local machine
#[derive(Debug, Clone)]
pub struct SystemHost {
    use_sudo: bool,
}

impl SystemHost {
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }

    fn build(&self, spec: &CommandSpec) -> Command {
        let escalate = spec.privileged && self.use_sudo;
        let mut command = if escalate {
            let mut sudo = Command::new("sudo");
            // sudo resets the environment, so variables go through env(1)
            if !spec.env.is_empty() {
                sudo.arg("env");
                sudo.args(spec.env.iter().map(|(k, v)| format!("{}={}", k, v)));
            }
            sudo.arg(&spec.program);
            sudo
        } else {
            let mut direct = Command::new(&spec.program);
            direct.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            direct
        };
        command.args(&spec.args);
        command.stdin(Stdio::null());
        command
    }

    /// Write through `tee`, escalated when sudo is enabled, so the target
    /// can be owned by root
    async fn tee(&self, path: &Path, contents: &str, append: bool) -> ProvisionResult<()> {
        let mut spec = CommandSpec::new("tee");
        if append {
            spec = spec.arg("-a");
        }
        let spec = spec.arg(path.display().to_string()).privileged();

        let mut command = self.build(&spec);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = command.spawn()?;
        let written = match child.stdin.take() {
            Some(mut stdin) => {
                let result = stdin.write_all(contents.as_bytes()).await;
                // tee only exits once its stdin is closed
                drop(stdin);
                result
            }
            None => Ok(()),
        };

        let output = child.wait_with_output().await?;
        let output = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::new(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !output.success() {
            return Err(failure_error(&spec, &output));
        }
        written?;
        Ok(())
    }
}

#[async_trait]
impl HostExecutor for SystemHost {
    async fn run(&self, spec: &CommandSpec) -> ProvisionResult<CommandOutput> {
        debug!(command = %spec, privileged = spec.privileged, "running host command");

        let output = match self.build(spec).output().await {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProvisionError::command_failed(
                    spec.to_string(),
                    None,
                    format!("{} not found on PATH", spec.program),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn write_file(&self, path: &Path, contents: &str, privileged: bool) -> ProvisionResult<()> {
        debug!(path = %path.display(), privileged, "writing file");
        if privileged && self.use_sudo {
            return self.tee(path, contents, false).await;
        }
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    async fn append_file(&self, path: &Path, contents: &str, privileged: bool) -> ProvisionResult<()> {
        debug!(path = %path.display(), privileged, "appending to file");
        if privileged && self.use_sudo {
            return self.tee(path, contents, true).await;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(contents.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> ProvisionResult<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
