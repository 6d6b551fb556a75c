// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};

use evio::prelude::*;
use evpart::{BootSector, SectorKind, VolumeFs};

use crate::config::Settings;
use crate::descriptor::AdapterType;
use crate::error::{Phase, PrepError, PrepResult};

/// Everything one preparation attempt knows, threaded through each stage.
#[derive(Debug, Clone)]
pub struct BootPreparationContext {
    pub source: DiskImageSource,
    /// Byte length of each backing file, in concatenation order. Zero for a
    /// device that does not report its size.
    pub chunk_lengths: Vec<u64>,
    pub boot_sector: Option<BootSector>,
    pub kind: Option<SectorKind>,
    pub volume_fs: VolumeFs,
    /// Set once the fabricated MBR has been persisted.
    pub fabricated_mbr: Option<PathBuf>,
    pub parent_disk_sectors: u64,
    pub adapter_type: AdapterType,
    pub output_dir: PathBuf,
    pub base_name: String,
}

impl BootPreparationContext {
    /// Context for `source`; reads backing file lengths, nothing else.
    pub fn new(source: DiskImageSource, settings: &Settings) -> PrepResult<Self> {
        let first = source
            .first_path()
            .map_err(|e| PrepError::io(Phase::Inspect, Path::new(""), e))?
            .to_path_buf();
        let chunk_lengths = source
            .chunk_lengths()
            .map_err(|e| PrepError::io(Phase::Inspect, &first, e))?;
        Ok(Self {
            base_name: base_name_of(&first),
            source,
            chunk_lengths,
            boot_sector: None,
            kind: None,
            volume_fs: VolumeFs::Unknown,
            fabricated_mbr: None,
            parent_disk_sectors: settings.parent_disk_sectors,
            adapter_type: settings.adapter_type,
            output_dir: settings.output_dir.clone(),
        })
    }

    #[inline]
    pub fn is_full_disk(&self) -> bool {
        self.kind == Some(SectorKind::FullDisk)
    }

    #[inline]
    pub fn is_chunked(&self) -> bool {
        self.source.is_chunked()
    }

    #[inline]
    pub fn is_physical_disk(&self) -> bool {
        self.source.is_physical()
    }

    /// Whole sectors of each backing file.
    pub fn chunk_sectors(&self) -> Vec<u64> {
        self.chunk_lengths
            .iter()
            .map(|l| l / evio::SECTOR_SIZE)
            .collect()
    }

    /// Whole sectors of the evidence stream.
    pub fn image_sectors(&self) -> u64 {
        self.chunk_sectors().iter().sum()
    }

    pub fn mbr_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}-mbr.bin", self.base_name))
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.vmdk", self.base_name))
    }

    pub fn vmx_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.vmx", self.base_name))
    }
}

/// `case/disk.001` → `disk`, `/dev/sdb` → `sdb`.
fn base_name_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("evidence")
        .to_string()
}
