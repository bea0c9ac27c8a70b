use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use tracing::info;

/// Provisioning configuration loaded from config.toml or environment variables.
/// Every default reproduces the literal constants of the reference deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionSettings {
    pub disk: DiskConfig,
    pub runtime: RuntimeConfig,
    pub stack: StackConfig,
    pub service: ServiceConfig,
    pub exec: ExecConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskConfig {
    pub device: String,
    pub mount_point: PathBuf,
    pub mount_options: String,
    pub fsck_pass: u8,
    /// Owner of the mount point; falls back to `SUDO_USER`, then `USER`
    pub owner: Option<String>,
    /// Reformat and re-append unconditionally, skipping the state checks
    pub force_format: bool,
    pub fstab_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub prerequisites: Vec<String>,
    pub repository_url: String,
    pub keyring_dir: PathBuf,
    pub source_list: PathBuf,
    /// Distribution codename; read from os-release when unset
    pub codename: Option<String>,
    /// Package architecture; asked from dpkg when unset
    pub architecture: Option<String>,
    pub os_release_path: PathBuf,
    pub engine_packages: Vec<String>,
    pub engine_service: String,
    pub engine_group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub working_dir: PathBuf,
    pub compose_file: String,
    pub collector_config_file: String,
    pub network: String,
    pub chroma_image: String,
    pub chroma_port: u16,
    pub chroma_data_path: String,
    pub chroma_service_name: String,
    pub jaeger_image: String,
    pub jaeger_ui_port: u16,
    pub collector_image: String,
    pub otlp_grpc_port: u16,
    pub otlp_http_port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub unit_name: String,
    pub unit_dir: PathBuf,
    pub description: String,
    pub docker_binary: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Prefix privileged commands with sudo and write privileged files through `sudo tee`
    pub use_sudo: bool,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            device: "/dev/sdb".to_string(),
            mount_point: PathBuf::from("/mnt/chroma-data"),
            mount_options: "defaults".to_string(),
            fsck_pass: 2,
            owner: None,
            force_format: false,
            fstab_path: PathBuf::from("/etc/fstab"),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            prerequisites: vec![
                "ca-certificates".to_string(),
                "curl".to_string(),
                "gnupg".to_string(),
            ],
            repository_url: "https://download.docker.com/linux/ubuntu".to_string(),
            keyring_dir: PathBuf::from("/etc/apt/keyrings"),
            source_list: PathBuf::from("/etc/apt/sources.list.d/docker.list"),
            codename: None,
            architecture: None,
            os_release_path: PathBuf::from("/etc/os-release"),
            engine_packages: vec![
                "docker-ce".to_string(),
                "docker-ce-cli".to_string(),
                "containerd.io".to_string(),
                "docker-buildx-plugin".to_string(),
                "docker-compose-plugin".to_string(),
            ],
            engine_service: "docker".to_string(),
            engine_group: "docker".to_string(),
        }
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("/opt/chroma"),
            compose_file: "docker-compose.yml".to_string(),
            collector_config_file: "otel-collector-config.yaml".to_string(),
            network: "internal".to_string(),
            chroma_image: "ghcr.io/chroma-core/chroma:latest".to_string(),
            chroma_port: 8000,
            chroma_data_path: "/data".to_string(),
            chroma_service_name: "chroma".to_string(),
            jaeger_image: "jaegertracing/all-in-one:latest".to_string(),
            jaeger_ui_port: 16686,
            collector_image: "otel/opentelemetry-collector-contrib:0.111.0".to_string(),
            otlp_grpc_port: 4317,
            otlp_http_port: 4318,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            unit_name: "chroma-stack".to_string(),
            unit_dir: PathBuf::from("/etc/systemd/system"),
            description: "Chroma vector database stack".to_string(),
            docker_binary: PathBuf::from("/usr/bin/docker"),
        }
    }
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self { use_sudo: true }
    }
}

impl ProvisionSettings {
    /// Load settings: defaults, then the config file (if any), then environment overrides
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut settings = match config_path {
            Some(path) => {
                info!("Using config file: {}", path.display());
                Self::from_file(path)?
            }
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    info!("Using default config file: {}", default_path.display());
                    Self::from_file(&default_path)?
                } else {
                    info!("No config file found at {}, using defaults", default_path.display());
                    Self::default()
                }
            }
        };

        settings.apply_env_overrides()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("CHROMA_PROVISION_DEVICE") {
            self.disk.device = val;
        }

        if let Ok(val) = std::env::var("CHROMA_PROVISION_MOUNT_POINT") {
            self.disk.mount_point = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("CHROMA_PROVISION_WORK_DIR") {
            self.stack.working_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("CHROMA_PROVISION_OWNER") {
            self.disk.owner = Some(val);
        }

        if let Ok(val) = std::env::var("CHROMA_PROVISION_USE_SUDO") {
            self.exec.use_sudo = val
                .parse()
                .with_context(|| format!("CHROMA_PROVISION_USE_SUDO must be true or false, got {:?}", val))?;
        }

        Ok(())
    }

    pub fn config_path() -> PathBuf {
        if let Ok(custom_path) = std::env::var("CHROMA_PROVISION_CONFIG") {
            PathBuf::from(custom_path)
        } else {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("chroma-provisioner")
                .join("config.toml")
        }
    }

    /// The user that owns the data mount and joins the engine group
    pub fn owner(&self) -> Option<String> {
        self.disk
            .owner
            .clone()
            .or_else(|| std::env::var("SUDO_USER").ok())
            .or_else(|| std::env::var("USER").ok())
            .filter(|user| !user.is_empty())
    }
}

impl StackConfig {
    pub fn compose_path(&self) -> PathBuf {
        self.working_dir.join(&self.compose_file)
    }

    pub fn collector_config_path(&self) -> PathBuf {
        self.working_dir.join(&self.collector_config_file)
    }
}

impl ServiceConfig {
    /// Unit name including the `.service` suffix
    pub fn unit_file_name(&self) -> String {
        format!("{}.service", self.unit_name)
    }

    pub fn unit_path(&self) -> PathBuf {
        self.unit_dir.join(self.unit_file_name())
    }
}
