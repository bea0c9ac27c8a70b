use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::StackConfig;
use crate::models::compose::JAEGER_SERVICE;

pub const OTLP_RECEIVER: &str = "otlp";
pub const BATCH_PROCESSOR: &str = "batch";
pub const DEBUG_EXPORTER: &str = "debug";
pub const JAEGER_EXPORTER: &str = "otlp/jaeger";
pub const TRACES_PIPELINE: &str = "traces";

/// Jaeger all-in-one accepts OTLP/gRPC on this port inside the network
const JAEGER_OTLP_PORT: u16 = 4317;

/// OpenTelemetry collector configuration: one OTLP receiver, a batch
/// processor and two exporters wired into a single traces pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    pub receivers: Receivers,
    pub processors: BTreeMap<String, Processor>,
    pub exporters: BTreeMap<String, Exporter>,
    pub service: CollectorService,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receivers {
    pub otlp: OtlpReceiver,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtlpReceiver {
    pub protocols: BTreeMap<String, ProtocolEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolEndpoint {
    pub endpoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Processor {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exporter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsSettings {
    pub insecure: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorService {
    pub pipelines: BTreeMap<String, Pipeline>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub receivers: Vec<String>,
    pub processors: Vec<String>,
    pub exporters: Vec<String>,
}

impl CollectorConfig {
    pub fn for_stack(stack: &StackConfig) -> Self {
        let mut protocols = BTreeMap::new();
        protocols.insert(
            "grpc".to_string(),
            ProtocolEndpoint {
                endpoint: format!("0.0.0.0:{}", stack.otlp_grpc_port),
            },
        );
        protocols.insert(
            "http".to_string(),
            ProtocolEndpoint {
                endpoint: format!("0.0.0.0:{}", stack.otlp_http_port),
            },
        );

        let mut processors = BTreeMap::new();
        processors.insert(BATCH_PROCESSOR.to_string(), Processor::default());

        let mut exporters = BTreeMap::new();
        exporters.insert(DEBUG_EXPORTER.to_string(), Exporter::default());
        exporters.insert(
            JAEGER_EXPORTER.to_string(),
            Exporter {
                endpoint: Some(format!("{}:{}", JAEGER_SERVICE, JAEGER_OTLP_PORT)),
                tls: Some(TlsSettings { insecure: true }),
            },
        );

        let mut pipelines = BTreeMap::new();
        pipelines.insert(
            TRACES_PIPELINE.to_string(),
            Pipeline {
                receivers: vec![OTLP_RECEIVER.to_string()],
                processors: vec![BATCH_PROCESSOR.to_string()],
                exporters: exporters.keys().cloned().collect(),
            },
        );

        Self {
            receivers: Receivers {
                otlp: OtlpReceiver { protocols },
            },
            processors,
            exporters,
            service: CollectorService { pipelines },
        }
    }

    /// Every component a pipeline references must be declared
    pub fn undeclared_references(&self) -> Vec<String> {
        let mut missing = Vec::new();
        for (name, pipeline) in &self.service.pipelines {
            for receiver in &pipeline.receivers {
                if receiver != OTLP_RECEIVER {
                    missing.push(format!("{name}: receiver {receiver}"));
                }
            }
            for processor in &pipeline.processors {
                if !self.processors.contains_key(processor) {
                    missing.push(format!("{name}: processor {processor}"));
                }
            }
            for exporter in &pipeline.exporters {
                if !self.exporters.contains_key(exporter) {
                    missing.push(format!("{name}: exporter {exporter}"));
                }
            }
        }
        missing
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}
