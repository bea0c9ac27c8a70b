use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

use super::{CommandOutput, CommandSpec, HostExecutor, SystemHost};
use crate::ProvisionResult;

/// Prints what would happen instead of changing the host.
///
/// Read-only commands still run for real so the plan reflects the current
/// state of the disk and the distribution.
#[derive(Debug)]
pub struct DryRunHost<H = SystemHost> {
    inner: H,
    actions: Mutex<Vec<String>>,
}

impl DryRunHost<SystemHost> {
    pub fn new(use_sudo: bool) -> Self {
        Self::wrapping(SystemHost::new(use_sudo))
    }
}

impl<H: HostExecutor> DryRunHost<H> {
    /// Plan against `inner`: read-only commands and reads go to it, mutations do not
    pub fn wrapping(inner: H) -> Self {
        Self {
            inner,
            actions: Mutex::new(Vec::new()),
        }
    }

    /// Every mutating action that was skipped, in order
    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn record(&self, action: String) {
        println!("  → would {}", action);
        info!(action = %action, "dry run");
        if let Ok(mut actions) = self.actions.lock() {
            actions.push(action);
        }
    }
}

#[async_trait]
impl<H: HostExecutor> HostExecutor for DryRunHost<H> {
    async fn run(&self, command: &CommandSpec) -> ProvisionResult<CommandOutput> {
        if command.read_only {
            return match self.inner.run(command).await {
                Ok(output) => Ok(output),
                Err(e) => {
                    warn!(command = %command, error = %e, "read-only command failed during dry run");
                    Ok(CommandOutput::failed(127, e.to_string()))
                }
            };
        }

        let prefix = if command.privileged { "sudo " } else { "" };
        self.record(format!("run: {}{}", prefix, command));
        Ok(CommandOutput::ok(""))
    }

    async fn write_file(&self, path: &Path, contents: &str, _privileged: bool) -> ProvisionResult<()> {
        self.record(format!("write {} ({} bytes)", path.display(), contents.len()));
        Ok(())
    }

    async fn append_file(&self, path: &Path, contents: &str, _privileged: bool) -> ProvisionResult<()> {
        self.record(format!("append to {}: {}", path.display(), contents.trim_end()));
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> ProvisionResult<Option<String>> {
        self.inner.read_file(path).await
    }
}
