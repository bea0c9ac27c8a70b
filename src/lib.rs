//! Chroma Provisioner
//!
//! Provisions a single-node Chroma vector database on one Linux host: prepares
//! a persistent disk, installs Docker Engine, writes the compose stack and the
//! OpenTelemetry collector configuration, and registers a systemd unit so the
//! stack comes back after a reboot.

pub mod cli;
pub mod config;
pub mod host;
pub mod models;
pub mod pipeline;

pub use pipeline::Stage;

/// Application-wide error types with context preservation
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Permission denied: {message}")]
    Permission { message: String },

    #[error("Device error: {message}")]
    Device { message: String, device: Option<String> },

    #[error("Package error: {message}")]
    Package { message: String, package: Option<String> },

    #[error("Service manager error: {message}")]
    ServiceManager { message: String, unit: Option<String> },

    #[error("Command `{command}` failed{}: {stderr}", exit_suffix(.exit_code))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Artifact error: {message}")]
    Artifact { message: String, path: Option<String> },

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<ProvisionError>,
    },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("YAML error: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" (exit {})", code),
        None => " (terminated by signal)".to_string(),
    }
}

impl ProvisionError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a permission error
    pub fn permission(message: impl Into<String>) -> Self {
        Self::Permission {
            message: message.into(),
        }
    }

    /// Create a device error with optional device path
    pub fn device(message: impl Into<String>, device: Option<String>) -> Self {
        Self::Device {
            message: message.into(),
            device,
        }
    }

    /// Create a package error with optional package name
    pub fn package(message: impl Into<String>, package: Option<String>) -> Self {
        Self::Package {
            message: message.into(),
            package,
        }
    }

    /// Create a service manager error with optional unit name
    pub fn service_manager(message: impl Into<String>, unit: Option<String>) -> Self {
        Self::ServiceManager {
            message: message.into(),
            unit,
        }
    }

    /// Create a command failure from the rendered command line and its result
    pub fn command_failed(
        command: impl Into<String>,
        exit_code: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Create an artifact error with optional file path
    pub fn artifact(message: impl Into<String>, path: Option<String>) -> Self {
        Self::Artifact {
            message: message.into(),
            path,
        }
    }

    /// Wrap an error with the stage that was running when it happened
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            already @ Self::Stage { .. } => already,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage that failed, if this error carries one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Process exit code reported by the binary
    pub fn exit_code(&self) -> i32 {
        match self {
            ProvisionError::Configuration { .. } => 2,
            ProvisionError::Permission { .. } => 3,
            ProvisionError::Device { .. } => 4,
            ProvisionError::Package { .. } => 5,
            ProvisionError::ServiceManager { .. } => 6,
            ProvisionError::Artifact { .. } => 7,
            ProvisionError::CommandFailed { .. } => 8,
            ProvisionError::Stage { source, .. } => source.exit_code(),
            ProvisionError::Io { source } => {
                if source.kind() == std::io::ErrorKind::PermissionDenied {
                    3
                } else {
                    1
                }
            }
            ProvisionError::Yaml { .. } => 7,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            ProvisionError::Configuration { message } => {
                format!("Configuration issue: {}", message)
            }
            ProvisionError::Permission { message } => {
                format!("Insufficient privileges: {}", message)
            }
            ProvisionError::Device { message, device } => {
                if let Some(dev) = device {
                    format!("Disk error ({}): {}", dev, message)
                } else {
                    format!("Disk error: {}", message)
                }
            }
            ProvisionError::Package { message, package } => {
                if let Some(pkg) = package {
                    format!("Package installation error ({}): {}", pkg, message)
                } else {
                    format!("Package installation error: {}", message)
                }
            }
            ProvisionError::ServiceManager { message, unit } => {
                if let Some(unit) = unit {
                    format!("systemd error ({}): {}", unit, message)
                } else {
                    format!("systemd error: {}", message)
                }
            }
            ProvisionError::CommandFailed { command, .. } => {
                format!("Command failed: {}", command)
            }
            ProvisionError::Artifact { message, path } => {
                if let Some(p) = path {
                    format!("Could not write {}: {}", p, message)
                } else {
                    format!("Artifact error: {}", message)
                }
            }
            ProvisionError::Stage { stage, source } => {
                format!("{} failed. {}", stage.title(), source.user_message())
            }
            ProvisionError::Io { source } => format!("File system error: {}", source),
            ProvisionError::Yaml { source } => format!("Data format error: {}", source),
        }
    }
}

/// Convenience type alias for Results
pub type ProvisionResult<T> = Result<T, ProvisionError>;
