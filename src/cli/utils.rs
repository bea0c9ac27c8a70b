//! CLI utility functions.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::ProvisionSettings;
use crate::ProvisionError;

/// Load settings with hierarchy (env > file > defaults)
pub fn load_settings(config_path: Option<PathBuf>) -> Result<ProvisionSettings> {
    if let Some(path) = &config_path {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
    }

    let settings = ProvisionSettings::load(config_path.as_deref())?;
    info!(
        device = %settings.disk.device,
        mount_point = %settings.disk.mount_point.display(),
        working_dir = %settings.stack.working_dir.display(),
        "Configuration loaded"
    );
    Ok(settings)
}

/// Write one rendered file into `dir` and report it
pub async fn write_local_file(dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    tokio::fs::write(&path, contents)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    println!("✓ Wrote {}", path.display());
    Ok(path)
}

/// Process exit status for an error returned by a command
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ProvisionError>())
        .map(ProvisionError::exit_code)
        .unwrap_or(1)
}
