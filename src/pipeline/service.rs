use async_trait::async_trait;
use tracing::info;

use super::{ProvisionStep, Stage, StepOutcome};
use crate::config::ProvisionSettings;
use crate::host::HostExecutor;
use crate::models::SystemdUnit;
use crate::ProvisionResult;

pub fn render_unit(settings: &ProvisionSettings) -> String {
    SystemdUnit::compose_stack(&settings.service, &settings.stack, &settings.runtime).render()
}

/// Installs the systemd unit file. Reload, enable and start happen in
/// the activation stage.
pub struct ServiceRegistration;

#[async_trait]
impl ProvisionStep for ServiceRegistration {
    fn stage(&self) -> Stage {
        Stage::Service
    }

    async fn run(
        &self,
        host: &dyn HostExecutor,
        settings: &ProvisionSettings,
    ) -> ProvisionResult<StepOutcome> {
        let path = settings.service.unit_path();
        info!(path = %path.display(), "installing systemd unit");
        host.write_file(&path, &render_unit(settings), true).await?;

        Ok(StepOutcome::applied(format!("Installed {}", path.display())))
    }
}
