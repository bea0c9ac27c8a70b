use std::fmt;

use crate::config::{RuntimeConfig, ServiceConfig, StackConfig};

/// systemd unit that brings the compose stack up once and stays "active"
/// until stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemdUnit {
    pub unit: UnitSection,
    pub service: ServiceSection,
    pub install: InstallSection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSection {
    pub description: String,
    pub requires: Vec<String>,
    pub after: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSection {
    pub service_type: String,
    pub remain_after_exit: bool,
    pub working_directory: String,
    pub exec_start: String,
    pub exec_stop: String,
    pub timeout_start_sec: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSection {
    pub wanted_by: Vec<String>,
}

impl SystemdUnit {
    pub fn compose_stack(service: &ServiceConfig, stack: &StackConfig, runtime: &RuntimeConfig) -> Self {
        let engine = format!("{}.service", runtime.engine_service);
        let docker = service.docker_binary.display();

        Self {
            unit: UnitSection {
                description: service.description.clone(),
                requires: vec![engine.clone()],
                after: vec![engine],
            },
            service: ServiceSection {
                service_type: "oneshot".to_string(),
                remain_after_exit: true,
                working_directory: stack.working_dir.display().to_string(),
                exec_start: format!("{} compose up -d", docker),
                exec_stop: format!("{} compose down", docker),
                timeout_start_sec: 0,
            },
            install: InstallSection {
                wanted_by: vec!["multi-user.target".to_string()],
            },
        }
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SystemdUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[Unit]")?;
        writeln!(f, "Description={}", self.unit.description)?;
        if !self.unit.requires.is_empty() {
            writeln!(f, "Requires={}", self.unit.requires.join(" "))?;
        }
        if !self.unit.after.is_empty() {
            writeln!(f, "After={}", self.unit.after.join(" "))?;
        }

        writeln!(f)?;
        writeln!(f, "[Service]")?;
        writeln!(f, "Type={}", self.service.service_type)?;
        writeln!(f, "RemainAfterExit={}", yes_no(self.service.remain_after_exit))?;
        writeln!(f, "WorkingDirectory={}", self.service.working_directory)?;
        writeln!(f, "ExecStart={}", self.service.exec_start)?;
        writeln!(f, "ExecStop={}", self.service.exec_stop)?;
        writeln!(f, "TimeoutStartSec={}", self.service.timeout_start_sec)?;

        writeln!(f)?;
        writeln!(f, "[Install]")?;
        writeln!(f, "WantedBy={}", self.install.wanted_by.join(" "))
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
