// SPDX-License-Identifier: MIT

//! Minimal `.vmx` that attaches the descriptor to a new virtual machine.
//!
//! The disk is attached `independent-nonpersistent`: guest writes go to a
//! redo log that is discarded at power off, never to the evidence.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::descriptor::AdapterType;
use crate::error::{Phase, PrepError, PrepResult};

const VMX_TEMPLATE: &str = r#".encoding = "UTF-8"
config.version = "8"
virtualHW.version = "4"
displayName = "{name}"
guestOS = "{guest_os}"
memsize = "{memory}"
{controller}{disk}.present = "TRUE"
{disk}.fileName = "{descriptor}"
{disk}.mode = "independent-nonpersistent"
{disk}.redo = ""
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmxConfig<'a> {
    pub display_name: &'a str,
    pub guest_os: &'a str,
    pub memory_mb: u32,
    pub adapter_type: AdapterType,
    /// Descriptor file name, relative to the `.vmx`.
    pub descriptor_name: &'a str,
}

impl VmxConfig<'_> {
    pub fn render(&self) -> String {
        let (controller, disk) = match self.adapter_type {
            AdapterType::Ide => (String::new(), "ide0:0"),
            AdapterType::BusLogic | AdapterType::LsiLogic => (
                format!(
                    "scsi0.present = \"TRUE\"\nscsi0.virtualDev = \"{}\"\n",
                    self.adapter_type
                ),
                "scsi0:0",
            ),
        };
        VMX_TEMPLATE
            .replace("{name}", self.display_name)
            .replace("{guest_os}", self.guest_os)
            .replace("{memory}", &self.memory_mb.to_string())
            .replace("{controller}", &controller)
            .replace("{disk}", disk)
            .replace("{descriptor}", self.descriptor_name)
    }

    pub fn write_to(&self, path: &Path) -> PrepResult {
        let mut f = File::create(path).map_err(|e| PrepError::io(Phase::Vmx, path, e))?;
        f.write_all(self.render().as_bytes())
            .and_then(|_| f.sync_all())
            .map_err(|e| PrepError::io(Phase::Vmx, path, e))?;
        crate::log_verbose!("VMX written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(adapter_type: AdapterType) -> VmxConfig<'static> {
        VmxConfig {
            display_name: "laptop",
            guest_os: "winXPPro",
            memory_mb: 512,
            adapter_type,
            descriptor_name: "laptop.vmdk",
        }
    }

    #[test]
    fn ide_disk() {
        let text = config(AdapterType::Ide).render();
        assert!(text.contains("guestOS = \"winXPPro\"\n"));
        assert!(text.contains("memsize = \"512\"\n"));
        assert!(text.contains("ide0:0.present = \"TRUE\"\n"));
        assert!(text.contains("ide0:0.fileName = \"laptop.vmdk\"\n"));
        assert!(text.contains("ide0:0.mode = \"independent-nonpersistent\"\n"));
        assert!(!text.contains("scsi0"));
    }

    #[test]
    fn scsi_disk() {
        let text = config(AdapterType::LsiLogic).render();
        assert!(text.contains("scsi0.virtualDev = \"lsilogic\"\n"));
        assert!(text.contains("scsi0:0.fileName = \"laptop.vmdk\"\n"));
    }

    #[test]
    fn write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("laptop.vmx");
        config(AdapterType::Ide).write_to(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with(".encoding"));
    }
}
