#![allow(dead_code)]

use async_trait::async_trait;
use chroma_provisioner::config::ProvisionSettings;
use chroma_provisioner::host::{CommandOutput, CommandSpec, HostExecutor};
use chroma_provisioner::{ProvisionError, ProvisionResult};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

pub const OS_RELEASE: &str = "NAME=\"Ubuntu\"\nVERSION_ID=\"22.04\"\nVERSION_CODENAME=jammy\nUBUNTU_CODENAME=jammy\n";

/// Host double backed by a scratch directory.
///
/// Commands are recorded and answered from a small simulated machine state:
/// `mkfs.ext4` leaves a filesystem that `blkid` reports, `mount` leaves a
/// mount that `findmnt` reports. Files are read and written for real, so the
/// settings passed to the pipeline must point inside the scratch directory
/// (see [`scratch_settings`]).
#[derive(Default)]
pub struct ScratchHost {
    commands: Mutex<Vec<CommandSpec>>,
    state: Mutex<MachineState>,
    failing: Mutex<Option<(String, String)>>,
}

#[derive(Default)]
struct MachineState {
    filesystem: Option<String>,
    mounted_at: Option<String>,
}

impl ScratchHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every command whose rendered line contains `needle` exit 100
    pub fn fail_on(self, needle: &str, stderr: &str) -> Self {
        *self.failing.lock().unwrap() = Some((needle.to_string(), stderr.to_string()));
        self
    }

    /// Rendered command lines in execution order
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().iter().map(ToString::to_string).collect()
    }

    pub fn count(&self, program: &str) -> usize {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.program == program)
            .count()
    }

    pub fn ran(&self, line: &str) -> bool {
        self.commands().iter().any(|c| c == line)
    }
}

#[async_trait]
impl HostExecutor for ScratchHost {
    async fn run(&self, command: &CommandSpec) -> ProvisionResult<CommandOutput> {
        self.commands.lock().unwrap().push(command.clone());

        if let Some((needle, stderr)) = self.failing.lock().unwrap().as_ref() {
            if command.to_string().contains(needle.as_str()) {
                return Ok(CommandOutput::failed(100, stderr.clone()));
            }
        }

        let mut state = self.state.lock().unwrap();
        let output = match command.program.as_str() {
            "mkfs.ext4" => {
                state.filesystem = Some("ext4".to_string());
                CommandOutput::ok("")
            }
            "blkid" => match &state.filesystem {
                Some(fstype) => CommandOutput::ok(format!("{}\n", fstype)),
                None => CommandOutput::failed(2, ""),
            },
            "mount" => {
                state.mounted_at = command.args.get(1).cloned();
                CommandOutput::ok("")
            }
            "findmnt" => match &state.mounted_at {
                Some(target) => CommandOutput::ok(format!("{}\n", target)),
                None => CommandOutput::failed(1, ""),
            },
            "dpkg" => CommandOutput::ok("amd64\n"),
            _ => CommandOutput::ok(""),
        };
        Ok(output)
    }

    async fn write_file(&self, path: &Path, contents: &str, _privileged: bool) -> ProvisionResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    async fn append_file(&self, path: &Path, contents: &str, _privileged: bool) -> ProvisionResult<()> {
        use tokio::io::AsyncWriteExt;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
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
            Err(e) => Err(ProvisionError::from(e)),
        }
    }
}

/// Default settings with every host path moved under `root`
pub fn scratch_settings(root: &Path) -> ProvisionSettings {
    let under = |path: &str| -> PathBuf { root.join(path.trim_start_matches('/')) };

    let mut settings = ProvisionSettings::default();
    settings.exec.use_sudo = false;
    settings.disk.owner = Some("chroma".to_string());
    settings.disk.mount_point = under("/mnt/chroma-data");
    settings.disk.fstab_path = under("/etc/fstab");
    settings.runtime.keyring_dir = under("/etc/apt/keyrings");
    settings.runtime.source_list = under("/etc/apt/sources.list.d/docker.list");
    settings.runtime.os_release_path = under("/etc/os-release");
    settings.stack.working_dir = under("/opt/chroma");
    settings.service.unit_dir = under("/etc/systemd/system");
    settings
}

/// A scratch root with an os-release and a stock fstab already in place
pub fn scratch_root() -> TempDir {
    let root = TempDir::new().unwrap();
    let etc = root.path().join("etc");
    std::fs::create_dir_all(&etc).unwrap();
    std::fs::write(etc.join("os-release"), OS_RELEASE).unwrap();
    std::fs::write(etc.join("fstab"), "UUID=1111-2222 / ext4 errors=remount-ro 0 1\n").unwrap();
    root
}
