//! Disk preparation: mount point, ext4 filesystem, mount, ownership, fstab.
//!
//! Formatting is destructive. In the default mode every action is preceded by
//! a check of the current state; with `disk.force_format` the checks are
//! skipped, the device is reformatted on every run and every run appends
//! another fstab line.

use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

use super::{ProvisionStep, Stage, StepOutcome};
use crate::config::{DiskConfig, ProvisionSettings};
use crate::host::{run_checked, CommandSpec, HostExecutor};
use crate::models::{MountEntry, DATA_FILESYSTEM};
use crate::{ProvisionError, ProvisionResult};

/// blkid exit status when the device carries no recognised signature
const BLKID_NOTHING_FOUND: i32 = 2;

pub struct DiskPreparation;

#[async_trait]
impl ProvisionStep for DiskPreparation {
    fn stage(&self) -> Stage {
        Stage::Disk
    }

    async fn run(
        &self,
        host: &dyn HostExecutor,
        settings: &ProvisionSettings,
    ) -> ProvisionResult<StepOutcome> {
        let disk = &settings.disk;
        let owner = settings.owner().ok_or_else(|| {
            ProvisionError::configuration("Cannot determine the user that should own the mount point")
        })?;
        let guarded = !disk.force_format;
        let mut actions = Vec::new();

        run_checked(host, &mkdir(&disk.mount_point)).await?;

        if guarded {
            if let Some(existing) = existing_filesystem(host, &disk.device).await? {
                if existing != DATA_FILESYSTEM {
                    return Err(ProvisionError::device(
                        format!(
                            "carries {}, expected {}; set disk.force_format to reformat",
                            existing, DATA_FILESYSTEM
                        ),
                        Some(disk.device.clone()),
                    ));
                }
                info!(device = %disk.device, "filesystem present, not formatting");
            } else {
                format_device(host, disk).await?;
                actions.push("formatted");
            }
        } else {
            warn!(device = %disk.device, "force_format set, reformatting unconditionally");
            format_device(host, disk).await?;
            actions.push("formatted");
        }

        let mounted_here = if guarded {
            check_mount(host, disk).await?
        } else {
            false
        };
        if !mounted_here {
            run_checked(
                host,
                &CommandSpec::new("mount")
                    .arg(&disk.device)
                    .arg(disk.mount_point.display().to_string())
                    .privileged(),
            )
            .await?;
            actions.push("mounted");
        }

        run_checked(
            host,
            &CommandSpec::new("chown")
                .arg(format!("{}:", owner))
                .arg(disk.mount_point.display().to_string())
                .privileged(),
        )
        .await?;

        if persist_mount(host, disk, guarded).await? {
            actions.push("added to fstab");
        }

        if actions.is_empty() {
            Ok(StepOutcome::skipped(format!(
                "{} already mounted at {}",
                disk.device,
                disk.mount_point.display()
            )))
        } else {
            Ok(StepOutcome::applied(format!(
                "{} {} at {}",
                disk.device,
                actions.join(", "),
                disk.mount_point.display()
            )))
        }
    }
}

fn mkdir(path: &Path) -> CommandSpec {
    CommandSpec::new("mkdir")
        .arg("-p")
        .arg(path.display().to_string())
        .privileged()
}

async fn format_device(host: &dyn HostExecutor, disk: &DiskConfig) -> ProvisionResult<()> {
    info!(device = %disk.device, "formatting device with ext4");
    run_checked(
        host,
        &CommandSpec::new("mkfs.ext4")
            .arg("-F")
            .arg(&disk.device)
            .privileged(),
    )
    .await?;
    Ok(())
}

/// Filesystem type on the device, `None` when blkid finds nothing.
/// blkid exits 2 only when no signature was found; any other failure
/// means the device could not be shown to be blank.
async fn existing_filesystem(host: &dyn HostExecutor, device: &str) -> ProvisionResult<Option<String>> {
    let found = host
        .run(
            &CommandSpec::new("blkid")
                .args(["-o", "value", "-s", "TYPE", device])
                .privileged()
                .read_only(),
        )
        .await?;

    match found.exit_code {
        Some(0) => {
            let fstype = found.stdout.trim();
            if fstype.is_empty() {
                Err(ProvisionError::device(
                    "blkid found a signature without a filesystem type; refusing to format",
                    Some(device.to_string()),
                ))
            } else {
                Ok(Some(fstype.to_string()))
            }
        }
        Some(BLKID_NOTHING_FOUND) => Ok(None),
        code => Err(ProvisionError::device(
            format!(
                "blkid could not read the device ({}): {}; refusing to format",
                code.map_or_else(|| "terminated by signal".to_string(), |c| format!("exit {}", c)),
                found.stderr.trim()
            ),
            Some(device.to_string()),
        )),
    }
}

/// `true` when the device is already mounted at the configured mount point.
/// Mounted anywhere else is an error.
async fn check_mount(host: &dyn HostExecutor, disk: &DiskConfig) -> ProvisionResult<bool> {
    let found = host
        .run(
            &CommandSpec::new("findmnt")
                .args(["-n", "-o", "TARGET", "--source", disk.device.as_str()])
                .read_only(),
        )
        .await?;

    if !found.success() {
        return Ok(false);
    }

    let targets: Vec<&str> = found.stdout.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if targets.iter().any(|t| Path::new(t) == disk.mount_point) {
        info!(device = %disk.device, "already mounted");
        return Ok(true);
    }

    match targets.first() {
        Some(other) => Err(ProvisionError::device(
            format!(
                "already mounted at {} instead of {}",
                other,
                disk.mount_point.display()
            ),
            Some(disk.device.clone()),
        )),
        None => Ok(false),
    }
}

/// Append the fstab entry; returns whether a line was written
async fn persist_mount(host: &dyn HostExecutor, disk: &DiskConfig, guarded: bool) -> ProvisionResult<bool> {
    let entry = MountEntry::from_disk_config(disk);
    let mut line = format!("{}\n", entry.to_fstab());

    if guarded {
        let fstab = host.read_file(&disk.fstab_path).await?.unwrap_or_default();
        if entry.count_in(&fstab) > 0 {
            info!(device = %disk.device, "fstab entry already present");
            return Ok(false);
        }
        if !fstab.is_empty() && !fstab.ends_with('\n') {
            line.insert(0, '\n');
        }
    }

    host.append_file(&disk.fstab_path, &line, true).await?;
    Ok(true)
}
