use async_trait::async_trait;

use super::{ProvisionStep, Stage, StepOutcome};
use crate::config::ProvisionSettings;
use crate::host::{run_checked, CommandSpec, HostExecutor};
use crate::ProvisionResult;

/// Reload systemd, enable and start the stack unit, then print the summary
pub struct Activation;

#[async_trait]
impl ProvisionStep for Activation {
    fn stage(&self) -> Stage {
        Stage::Activate
    }

    async fn run(
        &self,
        host: &dyn HostExecutor,
        settings: &ProvisionSettings,
    ) -> ProvisionResult<StepOutcome> {
        let unit = settings.service.unit_file_name();

        run_checked(host, &systemctl(["daemon-reload"])).await?;
        run_checked(host, &systemctl(["enable", unit.as_str()])).await?;
        run_checked(host, &systemctl(["start", unit.as_str()])).await?;

        println!();
        print!("{}", render_summary(settings));

        Ok(StepOutcome::applied(format!("{} enabled and started", unit)))
    }
}

fn systemctl<const N: usize>(args: [&str; N]) -> CommandSpec {
    CommandSpec::new("systemctl").args(args).privileged()
}

pub fn render_summary(settings: &ProvisionSettings) -> String {
    format!(
        "\
Chroma stack is up.
  Data volume : {}
  Chroma API  : http://localhost:{}
  Jaeger UI   : http://localhost:{}
The stack starts automatically on reboot via {}.
Log out and back in for {} group membership to take effect.
",
        settings.disk.mount_point.display(),
        settings.stack.chroma_port,
        settings.stack.jaeger_ui_port,
        settings.service.unit_file_name(),
        settings.runtime.engine_group,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CommandOutput, MockHostExecutor};
    use crate::ProvisionError;
    use mockall::Sequence;

    #[test]
    fn test_summary_format() {
        let summary = render_summary(&ProvisionSettings::default());
        assert_eq!(
            summary,
            "Chroma stack is up.\n  Data volume : /mnt/chroma-data\n  Chroma API  : http://localhost:8000\n  Jaeger UI   : http://localhost:16686\nThe stack starts automatically on reboot via chroma-stack.service.\nLog out and back in for docker group membership to take effect.\n"
        );
    }

    #[tokio::test]
    async fn test_reload_enable_start_in_order() {
        let mut host = MockHostExecutor::new();
        let mut seq = Sequence::new();
        for expected in [
            "systemctl daemon-reload",
            "systemctl enable chroma-stack.service",
            "systemctl start chroma-stack.service",
        ] {
            host.expect_run()
                .withf(move |c| c.to_string() == expected && c.privileged)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(CommandOutput::ok("")));
        }

        Activation.run(&host, &ProvisionSettings::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_enable_skips_start() {
        let mut host = MockHostExecutor::new();
        host.expect_run()
            .withf(|c| c.args[0] == "daemon-reload")
            .times(1)
            .returning(|_| Ok(CommandOutput::ok("")));
        host.expect_run()
            .withf(|c| c.args[0] == "enable")
            .times(1)
            .returning(|_| Ok(CommandOutput::failed(1, "Failed to enable unit: Unit file chroma-stack.service does not exist.")));
        host.expect_run().withf(|c| c.args[0] == "start").times(0);

        let err = Activation.run(&host, &ProvisionSettings::default()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::CommandFailed { .. }));
    }
}
