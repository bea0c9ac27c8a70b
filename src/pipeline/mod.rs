//! The provisioning pipeline: five ordered stages, executed one after another,
//! stopping at the first failure. Nothing is rolled back; effects of completed
//! stages stay in place.

pub mod activation;
pub mod artifacts;
pub mod disk;
pub mod report;
pub mod runtime;
pub mod service;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::config::ProvisionSettings;
use crate::host::HostExecutor;
use crate::{ProvisionError, ProvisionResult};

pub use activation::Activation;
pub use artifacts::ArtifactGeneration;
pub use disk::DiskPreparation;
pub use report::{ProvisionReport, StepReport};
pub use runtime::RuntimeInstallation;
pub use service::ServiceRegistration;

/// Pipeline stages in dependency order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Disk,
    Runtime,
    Artifacts,
    Service,
    Activate,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Disk,
        Stage::Runtime,
        Stage::Artifacts,
        Stage::Service,
        Stage::Activate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Disk => "disk",
            Stage::Runtime => "runtime",
            Stage::Artifacts => "artifacts",
            Stage::Service => "service",
            Stage::Activate => "activate",
        }
    }

    /// Human-readable stage name used in status lines
    pub fn title(&self) -> &'static str {
        match self {
            Stage::Disk => "Disk preparation",
            Stage::Runtime => "Runtime installation",
            Stage::Artifacts => "Artifact generation",
            Stage::Service => "Service registration",
            Stage::Activate => "Activation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Applied,
    Skipped,
    Failed,
}

/// What a step did, for the status line and the run report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub status: StepStatus,
    pub message: String,
}

impl StepOutcome {
    pub fn applied(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Applied,
            message: message.into(),
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Skipped,
            message: message.into(),
        }
    }
}

/// One provisioning stage
#[async_trait]
pub trait ProvisionStep: Send + Sync {
    fn stage(&self) -> Stage;

    async fn run(
        &self,
        host: &dyn HostExecutor,
        settings: &ProvisionSettings,
    ) -> ProvisionResult<StepOutcome>;
}

/// Ordered, fail-fast sequence of provisioning steps
pub struct Pipeline {
    run_id: Uuid,
    steps: Vec<Box<dyn ProvisionStep>>,
}

impl Pipeline {
    pub fn new(steps: Vec<Box<dyn ProvisionStep>>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            steps,
        }
    }

    /// All five stages in order
    pub fn standard() -> Self {
        Self::new(Stage::ALL.iter().map(|stage| step_for(*stage)).collect())
    }

    /// The named stages, always in pipeline order; an empty list means all
    pub fn with_stages(stages: &[Stage]) -> Self {
        if stages.is_empty() {
            return Self::standard();
        }
        Self::new(
            Stage::ALL
                .iter()
                .filter(|stage| stages.contains(stage))
                .map(|stage| step_for(*stage))
                .collect(),
        )
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.steps.iter().map(|step| step.stage()).collect()
    }

    pub async fn run(
        &self,
        host: &dyn HostExecutor,
        settings: &ProvisionSettings,
    ) -> ProvisionResult<ProvisionReport> {
        let (report, result) = self.run_with_report(host, settings).await;
        result.map(|_| report)
    }

    /// Run every step in order and stop at the first failure. The report
    /// covers the steps that ran, including the failed one.
    pub async fn run_with_report(
        &self,
        host: &dyn HostExecutor,
        settings: &ProvisionSettings,
    ) -> (ProvisionReport, ProvisionResult<()>) {
        let mut report = ProvisionReport::new(self.run_id);
        let total = self.steps.len();

        info!(run_id = %self.run_id, stages = total, "Starting provisioning run");

        for (index, step) in self.steps.iter().enumerate() {
            let stage = step.stage();
            println!("[{}/{}] {}...", index + 1, total, stage.title());

            let span = tracing::info_span!("stage", run_id = %self.run_id, stage = %stage);
            let started = chrono::Utc::now();
            let result = step.run(host, settings).instrument(span).await;

            match result {
                Ok(outcome) => {
                    let mark = match outcome.status {
                        StepStatus::Skipped => "-",
                        _ => "✓",
                    };
                    println!("  {} {}", mark, outcome.message);
                    info!(stage = %stage, status = ?outcome.status, "{}", outcome.message);
                    report.record(StepReport::finished(stage, started, &outcome));
                }
                Err(e) => {
                    let e = classify(stage, e, settings).in_stage(stage);
                    println!("  ✗ {}", e.user_message());
                    error!(stage = %stage, error = %e, "Stage failed, aborting run");
                    report.record(StepReport::failed(stage, started, &e));
                    report.finish();
                    return (report, Err(e));
                }
            }
        }

        report.finish();
        info!(run_id = %self.run_id, "Provisioning run complete");
        (report, Ok(()))
    }
}

fn step_for(stage: Stage) -> Box<dyn ProvisionStep> {
    match stage {
        Stage::Disk => Box::new(DiskPreparation),
        Stage::Runtime => Box::new(RuntimeInstallation),
        Stage::Artifacts => Box::new(ArtifactGeneration),
        Stage::Service => Box::new(ServiceRegistration),
        Stage::Activate => Box::new(Activation),
    }
}

/// Give a bare command failure the category of the stage it happened in
fn classify(stage: Stage, err: ProvisionError, settings: &ProvisionSettings) -> ProvisionError {
    if !matches!(err, ProvisionError::CommandFailed { .. }) {
        return err;
    }

    let message = err.to_string();
    match stage {
        Stage::Disk => ProvisionError::device(message, Some(settings.disk.device.clone())),
        Stage::Runtime => ProvisionError::package(message, None),
        Stage::Artifacts => ProvisionError::artifact(
            message,
            Some(settings.stack.working_dir.display().to_string()),
        ),
        Stage::Service | Stage::Activate => {
            ProvisionError::service_manager(message, Some(settings.service.unit_file_name()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CommandOutput, MockHostExecutor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingStep {
        stage: Stage,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl ProvisionStep for CountingStep {
        fn stage(&self) -> Stage {
            self.stage
        }

        async fn run(
            &self,
            _host: &dyn HostExecutor,
            _settings: &ProvisionSettings,
        ) -> ProvisionResult<StepOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ProvisionError::command_failed("apt-get update", Some(100), "Could not resolve host"))
            } else {
                Ok(StepOutcome::applied(format!("{} done", self.stage)))
            }
        }
    }

    fn counting(stage: Stage, fail: bool) -> (Box<dyn ProvisionStep>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(CountingStep {
                stage,
                calls: calls.clone(),
                fail,
            }),
            calls,
        )
    }

    #[test]
    fn test_with_stages_keeps_pipeline_order() {
        let pipeline = Pipeline::with_stages(&[Stage::Activate, Stage::Artifacts]);
        assert_eq!(pipeline.stages(), vec![Stage::Artifacts, Stage::Activate]);
        assert_eq!(Pipeline::with_stages(&[]).stages(), Stage::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_fail_fast_stops_later_stages() {
        let (disk, disk_calls) = counting(Stage::Disk, false);
        let (runtime, runtime_calls) = counting(Stage::Runtime, true);
        let (artifacts, artifact_calls) = counting(Stage::Artifacts, false);
        let pipeline = Pipeline::new(vec![disk, runtime, artifacts]);

        let host = MockHostExecutor::new();
        let (report, result) = pipeline
            .run_with_report(&host, &ProvisionSettings::default())
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Runtime));
        assert!(matches!(
            err,
            ProvisionError::Stage { ref source, .. } if matches!(**source, ProvisionError::Package { .. })
        ));
        assert_eq!(disk_calls.load(Ordering::SeqCst), 1);
        assert_eq!(runtime_calls.load(Ordering::SeqCst), 1);
        assert_eq!(artifact_calls.load(Ordering::SeqCst), 0);

        let statuses: Vec<StepStatus> = report.steps.iter().map(|s| s.status).collect();
        assert_eq!(statuses, vec![StepStatus::Applied, StepStatus::Failed]);
        assert!(report.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_first_host_failure_aborts_standard_pipeline() {
        let mut host = MockHostExecutor::new();
        // mkdir succeeds, blkid finds nothing, mkfs fails
        host.expect_run()
            .withf(|c| c.program == "mkdir")
            .times(1)
            .returning(|_| Ok(CommandOutput::ok("")));
        host.expect_run()
            .withf(|c| c.program == "blkid")
            .times(1)
            .returning(|_| Ok(CommandOutput::failed(2, "")));
        host.expect_run()
            .withf(|c| c.program == "mkfs.ext4")
            .times(1)
            .returning(|_| Ok(CommandOutput::failed(1, "mkfs.ext4: No such file or directory while trying to determine filesystem size")));
        host.expect_append_file().times(0);
        host.expect_write_file().times(0);

        let mut settings = ProvisionSettings::default();
        settings.disk.owner = Some("ubuntu".to_string());

        let err = Pipeline::standard().run(&host, &settings).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Disk));
        assert_eq!(err.exit_code(), 4);
        assert!(err.user_message().starts_with("Disk preparation failed."));
    }
}
