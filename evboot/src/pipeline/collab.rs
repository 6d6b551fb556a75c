// SPDX-License-Identifier: MIT

//! Seams to the outside world: mounting a descriptor and reading a hive.
//! Both are opaque to the pipeline; only success or failure matters.

use std::path::{Path, PathBuf};

use crate::error::PrepResult;

/// A mounted partition of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountHandle {
    pub descriptor: PathBuf,
    pub partition_index: u8,
    /// Where the partition's files are visible on the host.
    pub mount_point: PathBuf,
}

pub trait Mount {
    /// Mounts partition `partition_index` (1-based) of `descriptor`.
    fn mount(&mut self, descriptor: &Path, partition_index: u8) -> PrepResult<MountHandle>;

    /// `force` is used when unwinding after a failure.
    fn unmount(&mut self, handle: &MountHandle, force: bool) -> PrepResult;
}

pub trait Registry {
    /// Value `value` under `key` in the hive file `hive`; `None` when the
    /// key or value does not exist.
    fn query(&mut self, hive: &Path, key: &str, value: &str) -> PrepResult<Option<String>>;
}

pub const SOFTWARE_HIVE: &str = "SOFTWARE";
pub const SYSTEM_HIVE: &str = "SYSTEM";
pub const PRODUCT_KEY: &str = r"Microsoft\Windows NT\CurrentVersion";
pub const PRODUCT_VALUE: &str = "ProductName";
pub const ARCH_KEY: &str = r"ControlSet001\Control\Session Manager\Environment";
pub const ARCH_VALUE: &str = "PROCESSOR_ARCHITECTURE";
pub const MOUNTED_DEVICES_KEY: &str = "MountedDevices";
pub const SYSTEM_DRIVE_VALUE: &str = r"\DosDevices\C:";

const SYSTEM_ROOTS: &[&str] = &["Windows", "WINDOWS", "windows", "WINNT", "winnt"];
const CONFIG_DIRS: &[&str] = &["system32/config", "System32/config", "SYSTEM32/CONFIG"];

/// Hive file `name` under the guest's system root, if the mount has one.
pub fn locate_hive(mount_point: &Path, name: &str) -> Option<PathBuf> {
    SYSTEM_ROOTS
        .iter()
        .flat_map(|root| CONFIG_DIRS.iter().map(move |cfg| mount_point.join(root).join(cfg)))
        .flat_map(|dir| [dir.join(name), dir.join(name.to_ascii_lowercase())])
        .find(|p| p.is_file())
}

/// A Linux root shows itself through `/etc`.
pub fn looks_like_linux_root(mount_point: &Path) -> bool {
    ["etc/fstab", "etc/os-release", "etc/issue"]
        .iter()
        .any(|p| mount_point.join(p).is_file())
}
