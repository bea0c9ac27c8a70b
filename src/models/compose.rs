//! Typed compose stack definition.
//!
//! `depends_on` in compose only orders container start. Chroma may come up
//! before the collector accepts spans; nothing here waits for readiness.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{DiskConfig, StackConfig};

pub const CHROMA_SERVICE: &str = "chroma";
pub const JAEGER_SERVICE: &str = "jaeger";
pub const COLLECTOR_SERVICE: &str = "otel-collector";

/// Path the collector reads its configuration from inside the container
pub const COLLECTOR_CONFIG_MOUNT: &str = "/etc/otel-collector-config.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeFile {
    pub services: BTreeMap<String, ComposeService>,
    pub networks: BTreeMap<String, ComposeNetwork>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeService {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeNetwork {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
}

impl ComposeFile {
    /// Build the three-service stack: Chroma, Jaeger and the OpenTelemetry collector
    pub fn chroma_stack(stack: &StackConfig, disk: &DiskConfig) -> Self {
        let network = vec![stack.network.clone()];

        let chroma = ComposeService {
            image: stack.chroma_image.clone(),
            ports: vec![publish(stack.chroma_port)],
            volumes: vec![format!(
                "{}:{}",
                disk.mount_point.display(),
                stack.chroma_data_path
            )],
            environment: vec![
                format!(
                    "CHROMA_OPEN_TELEMETRY__ENDPOINT=http://{}:{}",
                    COLLECTOR_SERVICE, stack.otlp_grpc_port
                ),
                format!("CHROMA_OPEN_TELEMETRY__SERVICE_NAME={}", stack.chroma_service_name),
            ],
            networks: network.clone(),
            depends_on: vec![COLLECTOR_SERVICE.to_string(), JAEGER_SERVICE.to_string()],
            ..ComposeService::default()
        };

        let jaeger = ComposeService {
            image: stack.jaeger_image.clone(),
            ports: vec![publish(stack.jaeger_ui_port)],
            networks: network.clone(),
            ..ComposeService::default()
        };

        let collector = ComposeService {
            image: stack.collector_image.clone(),
            command: Some(vec![format!("--config={}", COLLECTOR_CONFIG_MOUNT)]),
            volumes: vec![format!(
                "{}:{}",
                stack.collector_config_path().display(),
                COLLECTOR_CONFIG_MOUNT
            )],
            networks: network,
            depends_on: vec![JAEGER_SERVICE.to_string()],
            ..ComposeService::default()
        };

        let mut services = BTreeMap::new();
        services.insert(CHROMA_SERVICE.to_string(), chroma);
        services.insert(JAEGER_SERVICE.to_string(), jaeger);
        services.insert(COLLECTOR_SERVICE.to_string(), collector);

        let mut networks = BTreeMap::new();
        networks.insert(stack.network.clone(), ComposeNetwork::default());

        Self { services, networks }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

fn publish(port: u16) -> String {
    format!("{port}:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> ComposeFile {
        ComposeFile::chroma_stack(&StackConfig::default(), &DiskConfig::default())
    }

    #[test]
    fn test_three_services_on_one_network() {
        let compose = stack();
        let names: Vec<&str> = compose.services.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["chroma", "jaeger", "otel-collector"]);
        assert_eq!(compose.networks.len(), 1);
        for service in compose.services.values() {
            assert_eq!(service.networks, vec!["internal".to_string()]);
        }
    }

    #[test]
    fn test_chroma_bindings() {
        let compose = stack();
        let chroma = &compose.services["chroma"];
        assert_eq!(chroma.ports, vec!["8000:8000"]);
        assert_eq!(chroma.volumes, vec!["/mnt/chroma-data:/data"]);
        assert_eq!(
            chroma.environment,
            vec![
                "CHROMA_OPEN_TELEMETRY__ENDPOINT=http://otel-collector:4317",
                "CHROMA_OPEN_TELEMETRY__SERVICE_NAME=chroma",
            ]
        );
        assert_eq!(chroma.depends_on, vec!["otel-collector", "jaeger"]);
    }

    #[test]
    fn test_collector_is_internal_only() {
        let compose = stack();
        let collector = &compose.services["otel-collector"];
        assert!(collector.ports.is_empty());
        assert_eq!(
            collector.volumes,
            vec!["/opt/chroma/otel-collector-config.yaml:/etc/otel-collector-config.yaml"]
        );
        assert_eq!(
            collector.command.as_deref(),
            Some(&["--config=/etc/otel-collector-config.yaml".to_string()][..])
        );
    }

    #[test]
    fn test_yaml_omits_empty_fields() {
        let yaml = stack().to_yaml().unwrap();
        assert!(yaml.starts_with("services:"));
        assert!(!yaml.contains("restart"));
        assert!(yaml.contains("networks:\n  internal: {}"));
    }
}
