use chroma_provisioner::config::{validate_configuration, ConfigurationValidator, ProvisionSettings};
use tempfile::TempDir;

#[test]
fn test_file_then_environment_overrides() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[disk]
device = "/dev/nvme1n1"
owner = "ubuntu"

[stack]
chroma_port = 8080
"#,
    )
    .unwrap();

    std::env::set_var("CHROMA_PROVISION_MOUNT_POINT", "/srv/chroma-data");
    let settings = ProvisionSettings::load(Some(path.as_path())).unwrap();
    std::env::remove_var("CHROMA_PROVISION_MOUNT_POINT");

    assert_eq!(settings.disk.device, "/dev/nvme1n1");
    assert_eq!(settings.disk.mount_point, std::path::Path::new("/srv/chroma-data"));
    assert_eq!(settings.owner().as_deref(), Some("ubuntu"));
    assert_eq!(settings.stack.chroma_port, 8080);
    assert_eq!(settings.stack.jaeger_ui_port, 16686);
    assert_eq!(settings.service.unit_name, "chroma-stack");

    assert!(validate_configuration(&settings, false).is_ok());
}

#[test]
fn test_generated_config_round_trips_through_init_format() {
    let mut settings = ProvisionSettings::default();
    settings.disk.owner = Some("ubuntu".to_string());

    let text = settings.to_toml().unwrap();
    assert_eq!(ProvisionSettings::from_toml(&text).unwrap(), settings);
}

#[test]
fn test_validation_reports_every_problem() {
    let mut settings = ProvisionSettings::default();
    settings.disk.owner = Some("ubuntu".to_string());
    settings.disk.device = "sdb".to_string();
    settings.stack.otlp_http_port = settings.stack.chroma_port;
    settings.service.unit_name = "chroma-stack.service".to_string();

    let mut validator = ConfigurationValidator::new(false);
    assert!(validator.validate_settings(&settings).is_err());

    let errors = validator.errors();
    assert_eq!(errors.len(), 3);
    assert!(errors.iter().any(|e| e.contains("/dev")));
    assert!(errors
        .iter()
        .any(|e| e.contains("stack.chroma_port and stack.otlp_http_port both use port 8000")));
    assert!(errors.iter().any(|e| e.contains("service.unit_name")));
}

#[test]
fn test_strict_mode_rejects_warnings() {
    let mut settings = ProvisionSettings::default();
    settings.disk.owner = Some("ubuntu".to_string());
    settings.disk.force_format = true;

    assert!(validate_configuration(&settings, false).is_ok());
    assert!(validate_configuration(&settings, true).is_err());
}
