//! Configuration validation for provisioning settings

use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn, error};
use crate::config::settings::{DiskConfig, ProvisionSettings, RuntimeConfig, ServiceConfig, StackConfig};
use crate::{ProvisionError, ProvisionResult};

/// Comprehensive configuration validator
pub struct ConfigurationValidator {
    /// Whether to perform strict validation (fails on warnings)
    strict_mode: bool,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ConfigurationValidator {
    pub fn new(strict_mode: bool) -> Self {
        Self {
            strict_mode,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Validate complete configuration
    pub fn validate_settings(&mut self, settings: &ProvisionSettings) -> ProvisionResult<()> {
        info!("Starting configuration validation");

        self.validate_disk_config(&settings.disk);
        self.validate_runtime_config(&settings.runtime);
        self.validate_stack_config(&settings.stack);
        self.validate_service_config(&settings.service);
        self.validate_layout(settings);

        if settings.owner().is_none() {
            self.errors.push(
                "Could not determine the invoking user; set disk.owner or CHROMA_PROVISION_OWNER".to_string(),
            );
        }

        self.print_validation_summary();

        if !self.errors.is_empty() {
            return Err(ProvisionError::configuration(format!(
                "validation failed with {} errors: {}",
                self.errors.len(),
                self.errors.join("; ")
            )));
        }

        if self.strict_mode && !self.warnings.is_empty() {
            return Err(ProvisionError::configuration(format!(
                "validation failed in strict mode with {} warnings: {}",
                self.warnings.len(),
                self.warnings.join("; ")
            )));
        }

        info!("Configuration validation passed");
        Ok(())
    }

    fn validate_disk_config(&mut self, disk: &DiskConfig) {
        if !disk.device.starts_with("/dev/") {
            self.errors.push(format!("disk.device must be a block device under /dev, got {}", disk.device));
        }

        self.require_absolute("disk.mount_point", &disk.mount_point);
        self.require_absolute("disk.fstab_path", &disk.fstab_path);

        if disk.mount_point == Path::new("/") {
            self.errors.push("disk.mount_point must not be the root filesystem".to_string());
        }

        if disk.fsck_pass > 2 {
            self.errors.push(format!("disk.fsck_pass must be 0, 1 or 2, got {}", disk.fsck_pass));
        }

        if disk.force_format {
            self.warnings.push(
                "disk.force_format is enabled: every run reformats the device and appends another fstab entry".to_string(),
            );
        }
    }

    fn validate_runtime_config(&mut self, runtime: &RuntimeConfig) {
        if !runtime.repository_url.starts_with("https://") {
            self.errors.push("runtime.repository_url must be an HTTPS URL".to_string());
        }

        if runtime.engine_packages.is_empty() {
            self.errors.push("runtime.engine_packages must not be empty".to_string());
        } else if !runtime.engine_packages.iter().any(|p| p == "docker-compose-plugin") {
            self.warnings.push(
                "runtime.engine_packages does not include docker-compose-plugin; the unit relies on `docker compose`".to_string(),
            );
        }

        if let Some(codename) = &runtime.codename {
            if codename.is_empty() || codename.contains(char::is_whitespace) {
                self.errors.push(format!("runtime.codename is not a valid codename: {:?}", codename));
            }
        }

        self.require_absolute("runtime.keyring_dir", &runtime.keyring_dir);
        self.require_absolute("runtime.source_list", &runtime.source_list);
    }

    fn validate_stack_config(&mut self, stack: &StackConfig) {
        self.require_absolute("stack.working_dir", &stack.working_dir);

        if stack.compose_file == stack.collector_config_file {
            self.errors.push("stack.compose_file and stack.collector_config_file must differ".to_string());
        }

        for (field, value) in [
            ("stack.compose_file", &stack.compose_file),
            ("stack.collector_config_file", &stack.collector_config_file),
        ] {
            if value.is_empty() || value.contains('/') {
                self.errors.push(format!("{} must be a plain file name, got {:?}", field, value));
            }
        }

        let ports = [
            ("stack.chroma_port", stack.chroma_port),
            ("stack.jaeger_ui_port", stack.jaeger_ui_port),
            ("stack.otlp_grpc_port", stack.otlp_grpc_port),
            ("stack.otlp_http_port", stack.otlp_http_port),
        ];
        let mut seen: HashMap<u16, &str> = HashMap::new();
        for (field, port) in ports {
            if port == 0 {
                self.errors.push(format!("{} must be greater than 0", field));
                continue;
            }
            if let Some(other) = seen.insert(port, field) {
                self.errors.push(format!("{} and {} both use port {}", other, field, port));
            }
        }

        if stack.chroma_image.ends_with(":latest") || stack.jaeger_image.ends_with(":latest") {
            self.warnings.push("Images tagged :latest may change between runs".to_string());
        }

        if !stack.chroma_data_path.starts_with('/') {
            self.errors.push("stack.chroma_data_path must be an absolute container path".to_string());
        }
    }

    fn validate_service_config(&mut self, service: &ServiceConfig) {
        if service.unit_name.is_empty()
            || service.unit_name.ends_with(".service")
            || service.unit_name.contains('/')
        {
            self.errors.push(format!(
                "service.unit_name must be a bare unit name without suffix, got {:?}",
                service.unit_name
            ));
        }

        self.require_absolute("service.unit_dir", &service.unit_dir);
        self.require_absolute("service.docker_binary", &service.docker_binary);
    }

    fn validate_layout(&mut self, settings: &ProvisionSettings) {
        if settings.disk.mount_point == settings.stack.working_dir {
            self.errors.push("disk.mount_point and stack.working_dir must be different directories".to_string());
        }
    }

    fn require_absolute(&mut self, field: &str, path: &Path) {
        if !path.is_absolute() {
            self.errors.push(format!("{} must be an absolute path, got {}", field, path.display()));
        }
    }

    fn print_validation_summary(&self) {
        if !self.warnings.is_empty() {
            warn!("Configuration warnings ({}):", self.warnings.len());
            for (i, warning) in self.warnings.iter().enumerate() {
                warn!("  {}: {}", i + 1, warning);
            }
        }

        if !self.errors.is_empty() {
            error!("Configuration errors ({}):", self.errors.len());
            for (i, error) in self.errors.iter().enumerate() {
                error!("  {}: {}", i + 1, error);
            }
        }

        if self.warnings.is_empty() && self.errors.is_empty() {
            info!("Configuration validation completed successfully with no issues");
        } else {
            info!(
                "Configuration validation completed with {} warnings and {} errors",
                self.warnings.len(),
                self.errors.len()
            );
        }
    }

    /// Get validation warnings
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Get validation errors
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// Quick validation function for use in main application
pub fn validate_configuration(settings: &ProvisionSettings, strict: bool) -> ProvisionResult<()> {
    let mut validator = ConfigurationValidator::new(strict);
    validator.validate_settings(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn create_test_settings() -> ProvisionSettings {
        let mut settings = ProvisionSettings::default();
        settings.disk.owner = Some("ubuntu".to_string());
        settings.stack.chroma_image = "ghcr.io/chroma-core/chroma:1.0.0".to_string();
        settings.stack.jaeger_image = "jaegertracing/all-in-one:1.62.0".to_string();
        settings
    }

    #[test]
    fn test_valid_configuration() {
        let settings = create_test_settings();
        let mut validator = ConfigurationValidator::new(true);

        let result = validator.validate_settings(&settings);
        assert!(result.is_ok(), "Valid configuration should pass validation: {:?}", validator.errors());
    }

    #[test]
    fn test_relative_paths_rejected() {
        let mut settings = create_test_settings();
        settings.disk.mount_point = PathBuf::from("mnt/data");
        settings.stack.working_dir = PathBuf::from("chroma");

        let mut validator = ConfigurationValidator::new(false);
        let err = validator.validate_settings(&settings).unwrap_err();
        assert_eq!(validator.errors().len(), 2);
        assert!(matches!(err, ProvisionError::Configuration { .. }));
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("disk.mount_point must be an absolute path"));
    }

    #[test]
    fn test_mount_point_equal_to_working_dir() {
        let mut settings = create_test_settings();
        settings.stack.working_dir = settings.disk.mount_point.clone();

        let mut validator = ConfigurationValidator::new(false);
        assert!(validator.validate_settings(&settings).is_err());
        assert!(validator.errors().iter().any(|e| e.contains("different directories")));
    }

    #[test]
    fn test_port_collision() {
        let mut settings = create_test_settings();
        settings.stack.jaeger_ui_port = settings.stack.chroma_port;

        let mut validator = ConfigurationValidator::new(false);
        assert!(validator.validate_settings(&settings).is_err());
        assert!(validator.errors().iter().any(|e| e.contains("both use port 8000")));
    }

    #[test]
    fn test_unit_name_with_suffix_rejected() {
        let mut settings = create_test_settings();
        settings.service.unit_name = "chroma.service".to_string();

        let mut validator = ConfigurationValidator::new(false);
        assert!(validator.validate_settings(&settings).is_err());
    }

    #[test]
    fn test_strict_mode_warnings() {
        let mut settings = create_test_settings();
        settings.disk.force_format = true;

        let mut validator = ConfigurationValidator::new(true);
        let result = validator.validate_settings(&settings);

        assert!(result.is_err(), "Warnings in strict mode should fail validation");
        assert!(!validator.warnings().is_empty(), "Should have validation warnings");
    }

    #[test]
    fn test_lenient_mode_warnings() {
        let settings = ProvisionSettings {
            disk: DiskConfig {
                owner: Some("ubuntu".to_string()),
                ..DiskConfig::default()
            },
            ..ProvisionSettings::default()
        };

        let mut validator = ConfigurationValidator::new(false);
        let result = validator.validate_settings(&settings);

        assert!(result.is_ok(), "Warnings in lenient mode should pass validation");
        assert!(!validator.warnings().is_empty(), "Default :latest images should warn");
    }
}
