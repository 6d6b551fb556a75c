// SPDX-License-Identifier: MIT

//! `evboot.toml`
//!
//! ```toml
//! output_dir = "case-042/vm"
//! adapter_type = "lsilogic"
//! parent_disk_sectors = 199218750
//! mbr_template = "templates/xp-mbr.bin"
//! mount_point = "/mnt/evboot"
//! write_vmx = true
//! memory_mb = 512
//! verify_evidence = true
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::descriptor::AdapterType;
use crate::error::{PrepError, PrepResult};

pub const DEFAULT_CONFIG_FILE: &str = "evboot.toml";
/// 950 GB parent disk behind a partition-only image.
pub const DEFAULT_PARENT_DISK_SECTORS: u64 = 199_218_750;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Where the fabricated MBR, descriptor and VMX are written.
    pub output_dir: PathBuf,
    pub adapter_type: AdapterType,
    pub parent_disk_sectors: u64,
    /// Boot sector used instead of the built-in blank template.
    pub mbr_template: Option<PathBuf>,
    pub mount_point: PathBuf,
    pub write_vmx: bool,
    pub memory_mb: u32,
    /// CRC32 the evidence before and after preparation.
    pub verify_evidence: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("evboot-out"),
            adapter_type: AdapterType::Ide,
            parent_disk_sectors: DEFAULT_PARENT_DISK_SECTORS,
            mbr_template: None,
            mount_point: PathBuf::from("/mnt/evboot"),
            write_vmx: true,
            memory_mb: 512,
            verify_evidence: false,
        }
    }
}

impl Settings {
    pub fn from_file(path: &Path) -> PrepResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| PrepError::Config(format!("{}: {e}", path.display())))?;
        let mut settings: Settings = toml::from_str(&content)
            .map_err(|e| PrepError::Config(format!("{}: {e}", path.display())))?;

        // relative paths in the file are relative to the file
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        if settings.output_dir.is_relative() {
            settings.output_dir = base_dir.join(&settings.output_dir);
        }
        if let Some(t) = settings.mbr_template.as_mut() {
            if t.is_relative() {
                *t = base_dir.join(&*t);
            }
        }
        settings.validate()?;
        crate::log_verbose!("Settings loaded from {}", path.display());
        Ok(settings)
    }

    /// `path` when given, else `evboot.toml` in the working directory when
    /// present, else defaults.
    pub fn load(path: Option<&Path>) -> PrepResult<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> PrepResult {
        if self.parent_disk_sectors == 0 {
            return Err(PrepError::Config(
                "parent_disk_sectors must be non-zero".into(),
            ));
        }
        if self.memory_mb == 0 {
            return Err(PrepError::Config("memory_mb must be non-zero".into()));
        }
        if let Some(t) = &self.mbr_template {
            if !t.is_file() {
                return Err(PrepError::Config(format!(
                    "mbr_template {} does not exist",
                    t.display()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.parent_disk_sectors, 199_218_750);
        assert_eq!(s.adapter_type, AdapterType::Ide);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("evboot.toml");
        std::fs::write(
            &path,
            "output_dir = \"vm\"\nadapter_type = \"lsilogic\"\nverify_evidence = true\n",
        )
        .unwrap();
        let s = Settings::from_file(&path).unwrap();
        assert_eq!(s.output_dir, dir.path().join("vm"));
        assert_eq!(s.adapter_type, AdapterType::LsiLogic);
        assert!(s.verify_evidence);
        assert_eq!(s.memory_mb, 512);
        assert_eq!(s.parent_disk_sectors, DEFAULT_PARENT_DISK_SECTORS);
    }

    #[test]
    fn rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("evboot.toml");

        std::fs::write(&path, "parent_disk_sectors = 0\n").unwrap();
        assert!(matches!(
            Settings::from_file(&path),
            Err(PrepError::Config(_))
        ));

        std::fs::write(&path, "adapter_type = \"scsi\"\n").unwrap();
        assert!(matches!(
            Settings::from_file(&path),
            Err(PrepError::Config(_))
        ));

        std::fs::write(&path, "unknown_key = 1\n").unwrap();
        assert!(Settings::from_file(&path).is_err());

        std::fs::write(&path, "mbr_template = \"missing.bin\"\n").unwrap();
        assert!(Settings::from_file(&path).is_err());
    }
}
