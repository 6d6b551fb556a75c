// SPDX-License-Identifier: MIT

//! VMware virtual disk descriptor (`.vmdk` text file).
//!
//! The descriptor never embeds disk data: every `FLAT` extent points at an
//! evidence file, a chunk, a raw device or the fabricated MBR, and `ZERO`
//! extents pad the disk to its declared capacity.

mod synth;

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Phase, PrepError, PrepResult};

pub use synth::{ddb_geometry, synthesize};

const DESCRIPTOR_TEMPLATE: &str = r#"# Disk DescriptorFile
version=1
encoding="UTF-8"
CID={cid}
parentCID=ffffffff
createType="{create_type}"

# Extent description
{extents}
# The Disk Data Base
#DDB

ddb.virtualHWVersion = "4"
ddb.adapterType = "{adapter}"
ddb.geometry.sectors = "{sectors}"
ddb.geometry.heads = "{heads}"
ddb.geometry.cylinders = "{cylinders}"
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateType {
    MonolithicFlat,
    FullDevice,
}

impl core::fmt::Display for CreateType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            CreateType::MonolithicFlat => "monolithicFlat",
            CreateType::FullDevice => "fullDevice",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AdapterType {
    #[default]
    Ide,
    #[value(name = "buslogic")]
    BusLogic,
    #[value(name = "lsilogic")]
    LsiLogic,
}

impl core::fmt::Display for AdapterType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            AdapterType::Ide => "ide",
            AdapterType::BusLogic => "buslogic",
            AdapterType::LsiLogic => "lsilogic",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtentKind {
    Flat { source: PathBuf, offset_sectors: u64 },
    Zero,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extent {
    pub size_sectors: u64,
    pub kind: ExtentKind,
}

impl Extent {
    pub fn flat(source: impl Into<PathBuf>, size_sectors: u64, offset_sectors: u64) -> Self {
        Self {
            size_sectors,
            kind: ExtentKind::Flat {
                source: source.into(),
                offset_sectors,
            },
        }
    }

    pub fn zero(size_sectors: u64) -> Self {
        Self {
            size_sectors,
            kind: ExtentKind::Zero,
        }
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        matches!(self.kind, ExtentKind::Zero)
    }

    /// Backing path of a `FLAT` extent.
    pub fn source(&self) -> Option<&Path> {
        match &self.kind {
            ExtentKind::Flat { source, .. } => Some(source),
            ExtentKind::Zero => None,
        }
    }
}

impl core::fmt::Display for Extent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.kind {
            ExtentKind::Flat {
                source,
                offset_sectors,
            } => write!(
                f,
                "RW {} FLAT \"{}\" {}",
                self.size_sectors,
                source.display(),
                offset_sectors
            ),
            ExtentKind::Zero => write!(f, "RW {} ZERO", self.size_sectors),
        }
    }
}

/// The `#DDB` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskDatabase {
    pub adapter_type: AdapterType,
    pub sectors_per_track: u8,
    pub heads_per_cylinder: u8,
    pub cylinders: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDiskDescriptor {
    pub cid: u32,
    pub create_type: CreateType,
    pub extents: Vec<Extent>,
    pub ddb: DiskDatabase,
}

impl VirtualDiskDescriptor {
    /// Sum of all extent sizes: the capacity the hypervisor sees.
    pub fn total_sectors(&self) -> u64 {
        self.extents.iter().map(|e| e.size_sectors).sum()
    }

    pub fn flat_extents(&self) -> impl Iterator<Item = &Extent> {
        self.extents.iter().filter(|e| !e.is_zero())
    }

    pub fn zero_sectors(&self) -> u64 {
        self.extents
            .iter()
            .filter(|e| e.is_zero())
            .map(|e| e.size_sectors)
            .sum()
    }

    pub fn render(&self) -> String {
        let extents: String = self.extents.iter().map(|e| format!("{e}\n")).collect();
        DESCRIPTOR_TEMPLATE
            .replace("{cid}", &format!("{:08x}", self.cid))
            .replace("{create_type}", &self.create_type.to_string())
            .replace("{extents}", &extents)
            .replace("{adapter}", &self.ddb.adapter_type.to_string())
            .replace("{sectors}", &self.ddb.sectors_per_track.to_string())
            .replace("{heads}", &self.ddb.heads_per_cylinder.to_string())
            .replace("{cylinders}", &self.ddb.cylinders.to_string())
    }

    /// Writes the descriptor to `path` (created or truncated).
    pub fn write_to(&self, path: &Path) -> PrepResult {
        let mut f = File::create(path).map_err(|e| PrepError::io(Phase::Descriptor, path, e))?;
        f.write_all(self.render().as_bytes())
            .and_then(|_| f.sync_all())
            .map_err(|e| PrepError::io(Phase::Descriptor, path, e))?;
        crate::log_verbose!("Descriptor written to {}", path.display());
        Ok(())
    }
}

impl core::fmt::Display for VirtualDiskDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Content id for a new descriptor, taken from a random UUID.
pub fn new_cid() -> u32 {
    let id = uuid::Uuid::new_v4();
    let b = id.as_bytes();
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}
