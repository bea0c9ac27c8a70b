use std::fmt;
use std::str::FromStr;

use crate::config::DiskConfig;
use crate::ProvisionError;

/// The data disk is always formatted with `mkfs.ext4`
pub const DATA_FILESYSTEM: &str = "ext4";

/// A single fstab record.
///
/// Six ASCII-whitespace separated fields:
///
/// SOURCE TARGET FSTYPE OPTIONS DUMP PASS
///
/// Example:
///   - /dev/sdb /mnt/chroma-data ext4 defaults 0 2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub source: String,
    pub target: String,
    pub fstype: String,
    pub options: String,
    pub dump: u8,
    pub pass: u8,
}

impl MountEntry {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            fstype: DATA_FILESYSTEM.to_string(),
            options: "defaults".to_string(),
            dump: 0,
            pass: 2,
        }
    }

    pub fn from_disk_config(disk: &DiskConfig) -> Self {
        Self {
            source: disk.device.clone(),
            target: disk.mount_point.display().to_string(),
            fstype: DATA_FILESYSTEM.to_string(),
            options: disk.mount_options.clone(),
            dump: 0,
            pass: disk.fsck_pass,
        }
    }

    pub fn to_fstab(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.source, self.target, self.fstype, self.options, self.dump, self.pass
        )
    }

    /// Entries in `fstab` text that mount the same source
    pub fn count_in(&self, fstab: &str) -> usize {
        fstab
            .lines()
            .filter_map(|line| line.parse::<MountEntry>().ok())
            .filter(|entry| entry.source == self.source)
            .count()
    }
}

impl fmt::Display for MountEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_fstab())
    }
}

impl FromStr for MountEntry {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        if line.is_empty() || line.starts_with('#') {
            return Err(ProvisionError::configuration("Not an fstab entry"));
        }

        let mut parts = line.split_ascii_whitespace().fuse();
        let source = parts.next().unwrap_or_default();
        let target = parts
            .next()
            .ok_or_else(|| ProvisionError::configuration(format!("Missing target in fstab entry {s}")))?;
        let fstype = parts.next().unwrap_or("auto");
        let options = parts.next().unwrap_or("defaults");
        let dump = parse_field(parts.next(), "dump", s)?;
        let pass = parse_field(parts.next(), "pass", s)?;

        Ok(Self {
            source: source.to_string(),
            target: target.to_string(),
            fstype: fstype.to_string(),
            options: options.to_string(),
            dump,
            pass,
        })
    }
}

fn parse_field(field: Option<&str>, name: &str, line: &str) -> Result<u8, ProvisionError> {
    match field {
        None => Ok(0),
        Some(value) => value.parse().map_err(|_| {
            ProvisionError::configuration(format!("Invalid {name} field {value:?} in fstab entry {line}"))
        }),
    }
}
