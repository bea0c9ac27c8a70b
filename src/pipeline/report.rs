use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use super::{Stage, StepOutcome, StepStatus};
use crate::ProvisionError;

/// Machine-readable record of one provisioning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub stage: Stage,
    pub status: StepStatus,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl StepReport {
    pub fn finished(stage: Stage, started_at: DateTime<Utc>, outcome: &StepOutcome) -> Self {
        Self {
            stage,
            status: outcome.status,
            message: outcome.message.clone(),
            started_at,
            duration_ms: (Utc::now() - started_at).num_milliseconds(),
        }
    }

    pub fn failed(stage: Stage, started_at: DateTime<Utc>, error: &ProvisionError) -> Self {
        Self {
            stage,
            status: StepStatus::Failed,
            message: error.to_string(),
            started_at,
            duration_ms: (Utc::now() - started_at).num_milliseconds(),
        }
    }
}

impl ProvisionReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::new(),
        }
    }

    pub fn record(&mut self, step: StepReport) {
        self.steps.push(step);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn succeeded(&self) -> bool {
        self.steps.iter().all(|s| s.status != StepStatus::Failed)
    }

    /// Stage that stopped the run, if any
    pub fn failed_stage(&self) -> Option<Stage> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::Failed)
            .map(|s| s.stage)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub async fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        let json = self.to_json_pretty()?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serialization() {
        let mut report = ProvisionReport::new(Uuid::new_v4());
        let started = Utc::now();
        report.record(StepReport::finished(
            Stage::Disk,
            started,
            &StepOutcome::skipped("/dev/sdb already prepared"),
        ));
        report.record(StepReport::failed(
            Stage::Runtime,
            started,
            &ProvisionError::package("apt-get update failed", None),
        ));
        report.finish();

        assert!(!report.succeeded());
        assert_eq!(report.failed_stage(), Some(Stage::Runtime));

        let value: serde_json::Value = serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["steps"][0]["stage"], "disk");
        assert_eq!(value["steps"][0]["status"], "skipped");
        assert_eq!(value["steps"][1]["status"], "failed");
        assert!(value["finished_at"].is_string());
    }
}
