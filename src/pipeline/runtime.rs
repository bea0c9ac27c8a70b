//! Runtime installation: Docker Engine and the compose plugin from Docker's
//! apt repository.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{ProvisionStep, Stage, StepOutcome};
use crate::config::{ProvisionSettings, RuntimeConfig};
use crate::host::{run_checked, CommandSpec, HostExecutor};
use crate::{ProvisionError, ProvisionResult};

pub struct RuntimeInstallation;

#[async_trait]
impl ProvisionStep for RuntimeInstallation {
    fn stage(&self) -> Stage {
        Stage::Runtime
    }

    async fn run(
        &self,
        host: &dyn HostExecutor,
        settings: &ProvisionSettings,
    ) -> ProvisionResult<StepOutcome> {
        let runtime = &settings.runtime;
        let owner = settings.owner().ok_or_else(|| {
            ProvisionError::configuration("Cannot determine the user to add to the docker group")
        })?;

        run_checked(host, &apt_get(["update"])).await?;
        run_checked(
            host,
            &apt_get(["install", "-y"]).args(runtime.prerequisites.iter().cloned()),
        )
        .await?;

        let keyring = keyring_path(runtime);
        run_checked(
            host,
            &CommandSpec::new("install")
                .args(["-m", "0755", "-d"])
                .arg(runtime.keyring_dir.display().to_string())
                .privileged(),
        )
        .await?;
        run_checked(
            host,
            &CommandSpec::new("curl")
                .arg("-fsSL")
                .arg(format!("{}/gpg", runtime.repository_url.trim_end_matches('/')))
                .arg("-o")
                .arg(keyring.display().to_string())
                .privileged(),
        )
        .await?;
        run_checked(
            host,
            &CommandSpec::new("chmod")
                .arg("a+r")
                .arg(keyring.display().to_string())
                .privileged(),
        )
        .await?;

        let architecture = resolve_architecture(host, runtime).await?;
        let codename = resolve_codename(host, runtime).await?;
        let source = docker_source_line(&architecture, &keyring, &runtime.repository_url, &codename);
        info!(source = %source.trim_end(), "registering docker apt repository");
        host.write_file(&runtime.source_list, &source, true).await?;

        run_checked(host, &apt_get(["update"])).await?;
        run_checked(
            host,
            &apt_get(["install", "-y"]).args(runtime.engine_packages.iter().cloned()),
        )
        .await
        .map_err(|e| {
            on_command_failure(e, |message| {
                ProvisionError::package(message, Some(runtime.engine_packages.join(" ")))
            })
        })?;

        run_checked(
            host,
            &CommandSpec::new("systemctl")
                .args(["enable", "--now", runtime.engine_service.as_str()])
                .privileged(),
        )
        .await
        .map_err(|e| {
            on_command_failure(e, |message| {
                ProvisionError::service_manager(message, Some(format!("{}.service", runtime.engine_service)))
            })
        })?;

        run_checked(
            host,
            &CommandSpec::new("usermod")
                .args(["-aG", runtime.engine_group.as_str(), owner.as_str()])
                .privileged(),
        )
        .await?;

        Ok(StepOutcome::applied(format!(
            "Docker Engine installed for {} {}; {} added to the {} group (effective at next login)",
            codename, architecture, owner, runtime.engine_group
        )))
    }
}

fn apt_get<const N: usize>(args: [&str; N]) -> CommandSpec {
    CommandSpec::new("apt-get")
        .env("DEBIAN_FRONTEND", "noninteractive")
        .args(args)
        .privileged()
}

/// Replace a bare command failure with a more specific error; keep anything else
fn on_command_failure(err: ProvisionError, specific: impl FnOnce(String) -> ProvisionError) -> ProvisionError {
    match err {
        ProvisionError::CommandFailed { .. } => specific(err.to_string()),
        other => other,
    }
}

pub fn keyring_path(runtime: &RuntimeConfig) -> PathBuf {
    runtime.keyring_dir.join("docker.asc")
}

/// The single line written to the apt source list
pub fn docker_source_line(architecture: &str, keyring: &Path, repository_url: &str, codename: &str) -> String {
    format!(
        "deb [arch={} signed-by={}] {} {} stable\n",
        architecture,
        keyring.display(),
        repository_url.trim_end_matches('/'),
        codename
    )
}

/// `VERSION_CODENAME` from os-release, falling back to `UBUNTU_CODENAME`
pub fn parse_os_release_codename(os_release: &str) -> Option<String> {
    let lookup = |key: &str| {
        os_release.lines().find_map(|line| {
            let (k, v) = line.trim().split_once('=')?;
            if k != key {
                return None;
            }
            let value = v.trim().trim_matches('"').trim_matches('\'');
            (!value.is_empty()).then(|| value.to_string())
        })
    };
    lookup("VERSION_CODENAME").or_else(|| lookup("UBUNTU_CODENAME"))
}

async fn resolve_architecture(host: &dyn HostExecutor, runtime: &RuntimeConfig) -> ProvisionResult<String> {
    if let Some(arch) = &runtime.architecture {
        return Ok(arch.clone());
    }

    let output = run_checked(
        host,
        &CommandSpec::new("dpkg").arg("--print-architecture").read_only(),
    )
    .await?;
    let arch = output.stdout.trim();
    if arch.is_empty() {
        return Err(ProvisionError::package(
            "dpkg did not report an architecture; set runtime.architecture",
            None,
        ));
    }
    Ok(arch.to_string())
}

async fn resolve_codename(host: &dyn HostExecutor, runtime: &RuntimeConfig) -> ProvisionResult<String> {
    if let Some(codename) = &runtime.codename {
        return Ok(codename.clone());
    }

    let os_release = host
        .read_file(&runtime.os_release_path)
        .await?
        .unwrap_or_default();
    parse_os_release_codename(&os_release).ok_or_else(|| {
        ProvisionError::configuration(format!(
            "No VERSION_CODENAME in {}; set runtime.codename",
            runtime.os_release_path.display()
        ))
    })
}
