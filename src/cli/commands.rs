//! CLI command implementations.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::config::{ConfigurationValidator, ProvisionSettings};
use crate::host::{DryRunHost, HostExecutor, SystemHost};
use crate::pipeline::artifacts::render_artifacts;
use crate::pipeline::service::render_unit;
use crate::pipeline::{Pipeline, Stage};

use super::utils::{load_settings, write_local_file};

/// Run the provisioning pipeline against this host
pub async fn provision(
    config: Option<PathBuf>,
    dry_run: bool,
    stages: Vec<Stage>,
    report_path: Option<PathBuf>,
) -> Result<()> {
    let settings = load_settings(config)?;
    let mut validator = ConfigurationValidator::new(false);
    validator.validate_settings(&settings)?;

    let pipeline = Pipeline::with_stages(&stages);
    info!(
        run_id = %pipeline.run_id(),
        stages = ?pipeline.stages(),
        dry_run,
        "Provisioning {}",
        settings.disk.device
    );

    if pipeline.stages().contains(&Stage::Disk) && !dry_run {
        if settings.disk.force_format {
            warn!("{} will be reformatted; any data on it is lost", settings.disk.device);
        } else {
            info!("{} is formatted only if it carries no filesystem", settings.disk.device);
        }
    }

    let dry_run_host;
    let system_host;
    let host: &dyn HostExecutor = if dry_run {
        println!("Dry run: no changes will be made to this host");
        dry_run_host = DryRunHost::new(settings.exec.use_sudo);
        &dry_run_host
    } else {
        system_host = SystemHost::new(settings.exec.use_sudo);
        &system_host
    };

    let (report, result) = pipeline.run_with_report(host, &settings).await;

    if let Some(path) = report_path {
        report
            .write_to(&path)
            .await
            .with_context(|| format!("writing run report to {}", path.display()))?;
        info!("Run report written to {}", path.display());
    }

    result?;

    if dry_run {
        println!("✓ Dry run complete: {} stage(s) planned", report.steps.len());
    }
    Ok(())
}

/// Render the generated files into a local directory without touching the host
pub async fn render(config: Option<PathBuf>, output: PathBuf) -> Result<()> {
    let settings = load_settings(config)?;
    let artifacts = render_artifacts(&settings)?;
    let unit = render_unit(&settings);

    tokio::fs::create_dir_all(&output)
        .await
        .with_context(|| format!("creating {}", output.display()))?;

    write_local_file(&output, &settings.stack.compose_file, &artifacts.compose).await?;
    write_local_file(&output, &settings.stack.collector_config_file, &artifacts.collector).await?;
    write_local_file(&output, &settings.service.unit_file_name(), &unit).await?;

    Ok(())
}

/// Initialize default configuration
pub async fn init(force: bool) -> Result<()> {
    let config_path = ProvisionSettings::config_path();

    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at {:?}. Use --force to overwrite.",
            config_path
        );
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let toml_content = ProvisionSettings::default().to_toml()?;
    std::fs::write(&config_path, toml_content)?;

    println!("✓ Configuration initialized at {:?}", config_path);
    Ok(())
}

/// Inspect configuration (show, validate)
pub async fn config_command(
    config: Option<PathBuf>,
    show: bool,
    validate: bool,
    strict: bool,
) -> Result<()> {
    let settings = load_settings(config)?;

    if show {
        println!("{}", settings.to_toml()?);
    }

    if validate {
        let mut validator = ConfigurationValidator::new(strict);
        match validator.validate_settings(&settings) {
            Ok(()) => {
                println!("✓ Configuration is valid");
                for warning in validator.warnings() {
                    println!("  warning: {}", warning);
                }
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                for issue in validator.errors().iter().chain(validator.warnings()) {
                    println!("  ✗ {}", issue);
                }
                return Err(e.into());
            }
        }
    }

    Ok(())
}

/// Show version information
pub async fn version() -> Result<()> {
    println!("chroma-provisioner {}", env!("CARGO_PKG_VERSION"));
    match rustc_version::version() {
        Ok(rustc) => println!("Rust toolchain {}", rustc),
        Err(e) => warn!("Could not determine rustc version: {}", e),
    }
    Ok(())
}
