// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};

use super::{HostTool, failure_message, run_captured};
use crate::error::{PrepError, PrepResult};
use crate::pipeline::{Mount, MountHandle};

/// Mounts descriptor partitions with VMware DiskMount (`vmware-mount`).
#[derive(Debug, Clone)]
pub struct VmwareMount {
    mount_point: PathBuf,
}

impl VmwareMount {
    pub fn new(mount_point: impl Into<PathBuf>) -> Self {
        Self {
            mount_point: mount_point.into(),
        }
    }

    /// Always read-only: `FLAT` extents point straight at the evidence.
    fn mount_command(&self, descriptor: &Path, partition_index: u8) -> Vec<String> {
        crate::args![
            "vmware-mount",
            "-r",
            descriptor.display(),
            partition_index,
            self.mount_point.display()
        ]
    }

    fn unmount_command(&self, handle: &MountHandle, force: bool) -> Vec<String> {
        let flag = if force { "-f" } else { "-d" };
        crate::args!["vmware-mount", flag, handle.mount_point.display()]
    }
}

impl HostTool for VmwareMount {
    const NAME: &'static str = "vmware-mount";

    fn required_binaries(&self) -> &'static [&'static str] {
        &["vmware-mount"]
    }
}

impl Mount for VmwareMount {
    fn mount(&mut self, descriptor: &Path, partition_index: u8) -> PrepResult<MountHandle> {
        std::fs::create_dir_all(&self.mount_point).map_err(|e| {
            PrepError::collaborator(
                Self::NAME,
                format!("{}: {e}", self.mount_point.display()),
            )
        })?;
        let output = run_captured(Self::NAME, &self.mount_command(descriptor, partition_index))?;
        if !output.status.success() {
            return Err(PrepError::collaborator(Self::NAME, failure_message(&output)));
        }
        crate::log_info!(
            "Mounted partition {} of {} on {}",
            partition_index,
            descriptor.display(),
            self.mount_point.display()
        );
        Ok(MountHandle {
            descriptor: descriptor.to_path_buf(),
            partition_index,
            mount_point: self.mount_point.clone(),
        })
    }

    fn unmount(&mut self, handle: &MountHandle, force: bool) -> PrepResult {
        let output = run_captured(Self::NAME, &self.unmount_command(handle, force))?;
        if !output.status.success() {
            return Err(PrepError::collaborator(Self::NAME, failure_message(&output)));
        }
        crate::log_verbose!("Unmounted {}", handle.mount_point.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_lines() {
        let m = VmwareMount::new("/mnt/evboot");
        assert_eq!(
            m.mount_command(Path::new("/out/case.vmdk"), 1),
            vec!["vmware-mount", "-r", "/out/case.vmdk", "1", "/mnt/evboot"]
        );
        let handle = MountHandle {
            descriptor: PathBuf::from("/out/case.vmdk"),
            partition_index: 1,
            mount_point: PathBuf::from("/mnt/evboot"),
        };
        assert_eq!(
            m.unmount_command(&handle, false),
            vec!["vmware-mount", "-d", "/mnt/evboot"]
        );
        assert_eq!(
            m.unmount_command(&handle, true),
            vec!["vmware-mount", "-f", "/mnt/evboot"]
        );
    }
}
