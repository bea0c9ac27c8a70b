//! Artifact generation: the compose stack and the collector configuration.
//! Both files are rewritten in full on every run.

use async_trait::async_trait;
use tracing::info;

use super::{ProvisionStep, Stage, StepOutcome};
use crate::config::ProvisionSettings;
use crate::host::{run_checked, CommandSpec, HostExecutor};
use crate::models::{CollectorConfig, ComposeFile};
use crate::{ProvisionError, ProvisionResult};

/// Rendered file contents, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifacts {
    pub compose: String,
    pub collector: String,
}

/// Serialize both documents from the settings. Pure: the same settings
/// always produce the same bytes.
pub fn render_artifacts(settings: &ProvisionSettings) -> ProvisionResult<RenderedArtifacts> {
    let compose = ComposeFile::chroma_stack(&settings.stack, &settings.disk);
    let collector = CollectorConfig::for_stack(&settings.stack);

    let missing = collector.undeclared_references();
    if !missing.is_empty() {
        return Err(ProvisionError::artifact(
            format!("collector pipeline references undeclared components: {}", missing.join(", ")),
            Some(settings.stack.collector_config_path().display().to_string()),
        ));
    }

    Ok(RenderedArtifacts {
        compose: compose.to_yaml()?,
        collector: collector.to_yaml()?,
    })
}

pub struct ArtifactGeneration;

#[async_trait]
impl ProvisionStep for ArtifactGeneration {
    fn stage(&self) -> Stage {
        Stage::Artifacts
    }

    async fn run(
        &self,
        host: &dyn HostExecutor,
        settings: &ProvisionSettings,
    ) -> ProvisionResult<StepOutcome> {
        let stack = &settings.stack;
        let rendered = render_artifacts(settings)?;

        run_checked(
            host,
            &CommandSpec::new("mkdir")
                .arg("-p")
                .arg(stack.working_dir.display().to_string())
                .privileged(),
        )
        .await?;

        let compose_path = stack.compose_path();
        let collector_path = stack.collector_config_path();

        info!(path = %compose_path.display(), "writing compose file");
        host.write_file(&compose_path, &rendered.compose, true).await?;
        info!(path = %collector_path.display(), "writing collector configuration");
        host.write_file(&collector_path, &rendered.collector, true).await?;

        Ok(StepOutcome::applied(format!(
            "Wrote {} and {} in {}",
            stack.compose_file,
            stack.collector_config_file,
            stack.working_dir.display()
        )))
    }
}
