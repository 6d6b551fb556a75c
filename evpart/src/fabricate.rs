// SPDX-License-Identifier: MIT

//! A partition-only image has no master boot record, so one is fabricated
//! from a template and placed in front of the partition (63 sectors).
//!
//! Fabrication happens in two causally ordered phases, tracked in the type:
//! `GeometryOnly` (CHS end and sector count patched) → `Persisted` (written
//! to the output directory) → `SerialPatched` (NT disk serial recovered from
//! the guest registry written to the persisted file).

use core::marker::PhantomData;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::errors::*;
use crate::geometry::{DEFAULT_SECTORS_PER_TRACK, MAX_CHS_CYLINDER, MBR_GAP_SECTORS, SECTOR_SIZE};
use crate::mbr::{BOOT_SECTOR_SIZE, BootSector, DISK_SERIAL_OFFSET, write_boot_sector};
use evio::prelude::*;

/// Offsets patched in the first partition slot.
const END_HEAD_OFFSET: usize = 451;
const END_SECTOR_CYL_HI_OFFSET: usize = 452;
const END_CYL_LO_OFFSET: usize = 453;
const PART_TYPE_OFFSET: usize = 450;
const SECTOR_COUNT_OFFSET: usize = 458;

/// Geometry patched, held in memory only.
#[derive(Debug, Clone, Copy)]
pub struct GeometryOnly;
/// Written to disk; the only state that accepts a serial patch.
#[derive(Debug, Clone, Copy)]
pub struct Persisted;
/// Serial written into the persisted file.
#[derive(Debug, Clone, Copy)]
pub struct SerialPatched;

/// A template boot sector patched for one partition image.
#[derive(Debug, Clone)]
pub struct FabricatedBootSector<S> {
    bytes: [u8; BOOT_SECTOR_SIZE],
    partition_sectors: u32,
    cylinders: u16,
    path: Option<PathBuf>,
    _state: PhantomData<S>,
}

/// Loads a template sector from a file (first 512 bytes, must be signed).
pub fn load_template(path: &Path) -> PartResult<BootSector> {
    let mut f = EvidenceFile::open(path)?;
    let bytes = f.read_sector(0)?;
    BootSector::parse(&bytes)
}

/// Patches `template` with the CHS end and sector count of a partition of
/// `partition_sector_count` sectors behind a 63-sector gap.
///
/// Sectors per track is fixed at 63. Cylinders are
/// `partition_sector_count / head_count / 63`, clamped to what 10 bits hold.
pub fn fabricate_geometry(
    template: BootSector,
    partition_sector_count: u64,
    head_count: u8,
) -> PartResult<FabricatedBootSector<GeometryOnly>> {
    template.validate_header()?;
    if head_count == 0 {
        return Err(PartError::Invalid("fabricate: head count must be non-zero"));
    }
    if partition_sector_count == 0 {
        return Err(PartError::Invalid("fabricate: empty partition image"));
    }
    let sectors = u32::try_from(partition_sector_count)
        .map_err(|_| PartError::Invalid("fabricate: partition exceeds 2 TiB MBR limit"))?;
    if template.entries()[0].start_lba as u64 != MBR_GAP_SECTORS {
        return Err(PartError::Invalid(
            "fabricate: template partition must start at LBA 63",
        ));
    }

    let spt = DEFAULT_SECTORS_PER_TRACK;
    let cylinders = (partition_sector_count / head_count as u64 / spt as u64)
        .min(MAX_CHS_CYLINDER as u64) as u16;

    let mut bytes = template.to_bytes();
    bytes[END_HEAD_OFFSET] = head_count;
    bytes[END_SECTOR_CYL_HI_OFFSET] = (spt & 0x3F) | (((cylinders >> 8) as u8 & 0x03) << 6);
    bytes[END_CYL_LO_OFFSET] = (cylinders & 0xFF) as u8;
    bytes[SECTOR_COUNT_OFFSET..SECTOR_COUNT_OFFSET + 4].copy_from_slice(&sectors.to_le_bytes());

    Ok(FabricatedBootSector {
        bytes,
        partition_sectors: sectors,
        cylinders,
        path: None,
        _state: PhantomData,
    })
}

impl<S> FabricatedBootSector<S> {
    #[inline]
    pub fn as_bytes(&self) -> &[u8; BOOT_SECTOR_SIZE] {
        &self.bytes
    }

    /// Parsed view of the current bytes.
    pub fn sector(&self) -> PartResult<BootSector> {
        BootSector::parse(&self.bytes)
    }

    #[inline]
    pub fn partition_sectors(&self) -> u32 {
        self.partition_sectors
    }

    #[inline]
    pub fn cylinders(&self) -> u16 {
        self.cylinders
    }

    /// Where the sector was persisted, once it has been.
    #[inline]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn into_state<T>(self) -> FabricatedBootSector<T> {
        FabricatedBootSector {
            bytes: self.bytes,
            partition_sectors: self.partition_sectors,
            cylinders: self.cylinders,
            path: self.path,
            _state: PhantomData,
        }
    }
}

impl FabricatedBootSector<GeometryOnly> {
    /// Announces the partition's filesystem in the slot type byte.
    pub fn with_partition_type(mut self, partition_type: u8) -> Self {
        self.bytes[PART_TYPE_OFFSET] = partition_type;
        self
    }

    /// Writes the sector, zero padded to the 63-sector gap it fronts, to a
    /// new file at `path`, replacing any previous one.
    pub fn persist(mut self, path: &Path) -> PartResult<FabricatedBootSector<Persisted>> {
        let sector = self.sector()?;
        let gap_bytes = (MBR_GAP_SECTORS * SECTOR_SIZE) as usize;
        let mut file = File::create(path).map_err(|e| EvIOError::from(e).at_path(path))?;
        {
            let mut io = StdEvIO::new(&mut file);
            write_boot_sector(&mut io, &sector).map_err(|e| e.at_path(path))?;
            io.zero_fill(BOOT_SECTOR_SIZE as u64, gap_bytes - BOOT_SECTOR_SIZE)
                .and_then(|_| io.flush())
                .map_err(|e| e.at_path(path))?;
        }
        file.sync_all()
            .map_err(|e| EvIOError::from(e).at_path(path))?;
        self.path = Some(path.to_path_buf());
        Ok(self.into_state())
    }
}

impl FabricatedBootSector<Persisted> {
    /// Writes the NT disk serial (offsets 440..444) into the persisted file.
    ///
    /// The file is opened read-write without creating it; if it is missing,
    /// locked by a mount that is still active, or no longer holds the sector
    /// written by `persist`, the error is returned and nothing is retried.
    pub fn patch_serial(self, serial: [u8; 4]) -> PartResult<FabricatedBootSector<SerialPatched>> {
        let path = self
            .path
            .clone()
            .ok_or(PartError::Other("patch_serial: sector was never persisted"))?;
        let mut file = File::options()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| EvIOError::from(e).at_path(&path))?;

        let mut io = StdEvIO::new(&mut file);
        let on_disk = io.read_sector(0).map_err(|e| e.at_path(&path))?;
        if on_disk != self.bytes {
            return Err(PartError::IO(EvIOError::Io {
                kind: std::io::ErrorKind::InvalidData,
                detail: format!("{}: fabricated boot sector changed on disk", path.display()),
            }));
        }
        io.write_at(DISK_SERIAL_OFFSET as u64, &serial)
            .and_then(|_| io.flush())
            .map_err(|e| e.at_path(&path))?;
        file.sync_all()
            .map_err(|e| EvIOError::from(e).at_path(&path))?;

        let mut patched = self.into_state::<SerialPatched>();
        patched.bytes[DISK_SERIAL_OFFSET..DISK_SERIAL_OFFSET + 4].copy_from_slice(&serial);
        Ok(patched)
    }
}

impl FabricatedBootSector<SerialPatched> {
    #[inline]
    pub fn serial(&self) -> [u8; 4] {
        let mut s = [0u8; 4];
        s.copy_from_slice(&self.bytes[DISK_SERIAL_OFFSET..DISK_SERIAL_OFFSET + 4]);
        s
    }
}
