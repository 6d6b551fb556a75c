// SPDX-License-Identifier: MIT

use crate::errors::*;
use crate::geometry::{Chs, MBR_GAP_SECTORS};
use evio::prelude::*;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];
pub const BOOT_SECTOR_SIZE: usize = 512;

/// Byte offsets inside the 512-byte sector.
pub const DISK_SERIAL_OFFSET: usize = 440;
pub const PARTITION_TABLE_OFFSET: usize = 446;
pub const PARTITION_ENTRY_SIZE: usize = 16;
pub const SIGNATURE_OFFSET: usize = 510;

pub const BOOT_FLAG_ACTIVE: u8 = 0x80;
pub const PART_TYPE_NTFS: u8 = 0x07;

#[inline]
fn is_fat_type(t: u8) -> bool {
    matches!(
        t,
        0x01 | 0x04 | 0x06            // FAT12 / FAT16 <32M / FAT16
        | 0x0B | 0x0C | 0x0E          // FAT32 / FAT32 LBA / FAT16 LBA
        | 0x11 | 0x14 | 0x16          // hidden FAT12/16
        | 0x1B | 0x1C | 0x1E // hidden FAT32/FAT16 LBA
    )
}

#[inline]
fn is_ntfs_type(t: u8) -> bool {
    // 0x07 is shared by NTFS, exFAT and HPFS; 0x17 is its hidden form
    matches!(t, 0x07 | 0x17)
}

/// One 16-byte slot of the partition table, with multi-byte fields in host order.
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct PartitionTableEntry {
    pub boot_indicator: u8,
    pub start_chs: [u8; 3],
    pub partition_type: u8,
    pub end_chs: [u8; 3],
    pub start_lba: u32,
    pub sector_count: u32,
}

impl PartitionTableEntry {
    #[inline]
    pub fn new(
        boot_indicator: u8,
        start: Chs,
        partition_type: u8,
        end: Chs,
        start_lba: u32,
        sector_count: u32,
    ) -> Self {
        Self {
            boot_indicator,
            start_chs: start.to_bytes(),
            partition_type,
            end_chs: end.to_bytes(),
            start_lba,
            sector_count,
        }
    }

    #[inline]
    pub fn new_empty() -> Self {
        Self {
            boot_indicator: 0,
            start_chs: [0; 3],
            partition_type: 0,
            end_chs: [0; 3],
            start_lba: 0,
            sector_count: 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.partition_type == 0
    }

    #[inline]
    pub fn is_bootable(&self) -> bool {
        self.boot_indicator == BOOT_FLAG_ACTIVE
    }

    #[inline]
    pub fn is_fat(&self) -> bool {
        is_fat_type(self.partition_type)
    }

    #[inline]
    pub fn is_ntfs(&self) -> bool {
        is_ntfs_type(self.partition_type)
    }

    /// A used slot whose type is neither FAT nor NTFS.
    #[inline]
    pub fn is_not_windows_based(&self) -> bool {
        !self.is_empty() && !self.is_fat() && !self.is_ntfs()
    }

    #[inline]
    pub fn start(&self) -> Chs {
        Chs::from_bytes(self.start_chs)
    }

    #[inline]
    pub fn end(&self) -> Chs {
        Chs::from_bytes(self.end_chs)
    }

    /// First LBA past the partition.
    #[inline]
    pub fn end_lba_exclusive(&self) -> u64 {
        self.start_lba as u64 + self.sector_count as u64
    }

    /// Structural sanity of a used slot.
    pub fn validate_basic(&self) -> PartResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        if !(self.boot_indicator == 0x00 || self.boot_indicator == BOOT_FLAG_ACTIVE) {
            return Err(PartError::Invalid("partition entry: invalid boot flag"));
        }
        if self.sector_count == 0 {
            return Err(PartError::Invalid("partition entry: zero sectors"));
        }
        if self.start_lba == 0 {
            return Err(PartError::Invalid("partition entry: starts on the boot sector"));
        }
        Ok(())
    }
}

/// On-disk form of `PartitionTableEntry` (little-endian, unaligned).
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct PartitionTableEntryPacked {
    pub boot_indicator: u8,
    pub start_chs: [u8; 3],
    pub partition_type: u8,
    pub end_chs: [u8; 3],
    pub start_lba: u32,
    pub sector_count: u32,
}

impl PartitionTableEntryPacked {
    #[inline]
    pub fn to_aligned(self) -> PartitionTableEntry {
        PartitionTableEntry {
            boot_indicator: self.boot_indicator,
            start_chs: self.start_chs,
            partition_type: self.partition_type,
            end_chs: self.end_chs,
            start_lba: u32::from_le(self.start_lba),
            sector_count: u32::from_le(self.sector_count),
        }
    }

    #[inline]
    pub fn from_aligned(e: &PartitionTableEntry) -> Self {
        Self {
            boot_indicator: e.boot_indicator,
            start_chs: e.start_chs,
            partition_type: e.partition_type,
            end_chs: e.end_chs,
            start_lba: e.start_lba.to_le(),
            sector_count: e.sector_count.to_le(),
        }
    }
}

/// What the first sector of an image turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorKind {
    /// A master boot record with a partition table: the image is a whole disk.
    FullDisk,
    /// The volume boot record of a filesystem: the image is a single partition.
    PartitionOnly,
}

/// Filesystem announced by a volume boot record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeFs {
    Fat12,
    Fat16,
    Fat32,
    Ntfs,
    ExFat,
    Unknown,
}

impl VolumeFs {
    #[inline]
    pub fn is_fat(self) -> bool {
        matches!(self, VolumeFs::Fat12 | VolumeFs::Fat16 | VolumeFs::Fat32)
    }

    #[inline]
    pub fn is_ntfs(self) -> bool {
        self == VolumeFs::Ntfs
    }

    /// Partition type byte announcing this filesystem in an MBR slot.
    pub fn partition_type(self) -> Option<u8> {
        match self {
            VolumeFs::Fat12 => Some(0x01),
            VolumeFs::Fat16 => Some(0x06),
            VolumeFs::Fat32 => Some(0x0C),
            VolumeFs::Ntfs | VolumeFs::ExFat => Some(PART_TYPE_NTFS),
            VolumeFs::Unknown => None,
        }
    }

    /// Best guess from a partition type byte, for full-disk images.
    pub fn from_partition_type(t: u8) -> Self {
        match t {
            0x01 | 0x11 => VolumeFs::Fat12,
            0x04 | 0x06 | 0x0E | 0x14 | 0x16 | 0x1E => VolumeFs::Fat16,
            0x0B | 0x0C | 0x1B | 0x1C => VolumeFs::Fat32,
            0x07 | 0x17 => VolumeFs::Ntfs,
            _ => VolumeFs::Unknown,
        }
    }
}

impl core::fmt::Display for VolumeFs {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            VolumeFs::Fat12 => "FAT12",
            VolumeFs::Fat16 => "FAT16",
            VolumeFs::Fat32 => "FAT32",
            VolumeFs::Ntfs => "NTFS",
            VolumeFs::ExFat => "exFAT",
            VolumeFs::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A 512-byte boot sector: boot code, NT disk serial, four partition slots, signature.
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct BootSector {
    pub boot_code: [u8; 440],
    pub disk_serial: [u8; 4],
    pub reserved: [u8; 2],
    pub entries: [PartitionTableEntryPacked; 4],
    pub signature: [u8; 2],
}

impl BootSector {
    /// Parses a sector, rejecting anything without the `55 AA` signature.
    pub fn parse(bytes: &[u8; BOOT_SECTOR_SIZE]) -> PartResult<Self> {
        let sector = Self::read_from_bytes(bytes)
            .map_err(|_| PartError::Other("boot sector: size mismatch"))?;
        sector.validate_header()?;
        Ok(sector)
    }

    #[inline]
    pub fn to_bytes(&self) -> [u8; BOOT_SECTOR_SIZE] {
        let mut out = [0u8; BOOT_SECTOR_SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// Blank sector carrying one active NTFS slot at LBA 63 (CHS 0/1/1).
    ///
    /// Boot code is left zeroed; supply a real template through
    /// `load_template` for a guest that boots through the MBR code.
    pub fn generic_template() -> Self {
        let mut es = [PartitionTableEntry::new_empty(); 4];
        es[0] = PartitionTableEntry::new(
            BOOT_FLAG_ACTIVE,
            Chs::new(0, 1, 1),
            PART_TYPE_NTFS,
            Chs::default(),
            MBR_GAP_SECTORS as u32,
            0,
        );
        Self::new_from_entries(es)
    }

    #[inline]
    pub fn new_from_entries(entries: [PartitionTableEntry; 4]) -> Self {
        Self {
            boot_code: [0u8; 440],
            disk_serial: [0u8; 4],
            reserved: [0u8; 2],
            entries: entries.map(|e| PartitionTableEntryPacked::from_aligned(&e)),
            signature: BOOT_SIGNATURE,
        }
    }

    #[inline]
    pub fn has_valid_signature(&self) -> bool {
        self.signature == BOOT_SIGNATURE
    }

    #[inline]
    pub fn validate_header(&self) -> PartResult<()> {
        if !self.has_valid_signature() {
            return Err(PartError::NotASectorSignature {
                found: self.signature,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn entries(&self) -> [PartitionTableEntry; 4] {
        let es = self.entries;
        es.map(|e| e.to_aligned())
    }

    #[inline]
    pub fn set_entry(&mut self, index: usize, entry: &PartitionTableEntry) {
        let mut es = self.entries;
        es[index] = PartitionTableEntryPacked::from_aligned(entry);
        self.entries = es;
    }

    #[inline]
    pub fn disk_serial(&self) -> [u8; 4] {
        self.disk_serial
    }

    /// Active slot, or the first used one when none is flagged active.
    pub fn bootable_entry(&self) -> Option<(usize, PartitionTableEntry)> {
        let es = self.entries();
        es.iter()
            .position(|e| !e.is_empty() && e.is_bootable())
            .or_else(|| es.iter().position(|e| !e.is_empty()))
            .map(|i| (i, es[i]))
    }

    /// Sectors described by the partition table: end of the furthest used slot.
    pub fn described_sectors(&self) -> u64 {
        self.entries()
            .iter()
            .filter(|e| !e.is_empty())
            .map(|e| e.end_lba_exclusive())
            .max()
            .unwrap_or(0)
    }

    /// Filesystem named by this sector when it is a volume boot record.
    pub fn volume_filesystem(&self) -> VolumeFs {
        let b = self.as_bytes();
        match (&b[3..11], &b[54..62], &b[82..90]) {
            (b"NTFS    ", _, _) => VolumeFs::Ntfs,
            (b"EXFAT   ", _, _) => VolumeFs::ExFat,
            (_, _, b"FAT32   ") => VolumeFs::Fat32,
            (_, b"FAT16   ", _) | (_, b"FAT     ", _) => VolumeFs::Fat16,
            (_, b"FAT12   ", _) => VolumeFs::Fat12,
            _ => VolumeFs::Unknown,
        }
    }

    /// x86 jump, sane bytes-per-sector and a filesystem marker.
    fn has_vbr_evidence(&self) -> bool {
        let b = self.as_bytes();
        let jump = (b[0] == 0xEB && b[2] == 0x90) || b[0] == 0xE9;
        let bps = u16::from_le_bytes([b[11], b[12]]);
        let bps_ok = bps.is_power_of_two() && (512..=4096).contains(&bps);
        // exFAT zeroes the BPB region, bytes-per-sector lives elsewhere
        let exfat = &b[3..11] == b"EXFAT   ";
        jump && (bps_ok || exfat) && self.volume_filesystem() != VolumeFs::Unknown
    }

    /// Why the partition table is not plausible, if it is not.
    fn table_problem(&self) -> Option<&'static str> {
        let es = self.entries();
        let used: Vec<&PartitionTableEntry> = es.iter().filter(|e| !e.is_empty()).collect();
        if used.is_empty() {
            return Some("partition table is empty");
        }
        if used.iter().any(|e| e.validate_basic().is_err()) {
            return Some("partition table has malformed entries");
        }
        for (i, a) in used.iter().enumerate() {
            for b in &used[i + 1..] {
                let a_start = a.start_lba as u64;
                let b_start = b.start_lba as u64;
                if a_start < b.end_lba_exclusive() && b_start < a.end_lba_exclusive() {
                    return Some("partition table has overlapping entries");
                }
            }
        }
        None
    }

    /// Tells a master boot record from the first sector of a bare partition.
    ///
    /// Both end in `55 AA`. A plausible partition table without volume boot
    /// record markers is a full disk; filesystem markers without a plausible
    /// table are a partition. Anything else is reported, never guessed.
    pub fn classify(&self) -> PartResult<SectorKind> {
        self.validate_header()?;
        let vbr = self.has_vbr_evidence();
        match (self.table_problem(), vbr) {
            (None, false) => Ok(SectorKind::FullDisk),
            (Some(_), true) => Ok(SectorKind::PartitionOnly),
            (None, true) => Err(PartError::ClassificationAmbiguous(
                "sector carries both a partition table and filesystem markers",
            )),
            (Some(problem), false) => Err(PartError::ClassificationAmbiguous(problem)),
        }
    }
}

/// Reads and validates the first sector of `io`.
pub fn read_boot_sector<IO: EvRead + ?Sized>(io: &mut IO) -> PartResult<BootSector> {
    let sector: BootSector = io.read_struct(0)?;
    sector.validate_header()?;
    Ok(sector)
}

/// Writes `sector` at offset 0 of `io` and flushes. Only for artifacts this
/// tool creates; evidence is never opened writable.
pub fn write_boot_sector<IO: EvIO + ?Sized>(io: &mut IO, sector: &BootSector) -> PartResult<()> {
    io.write_struct(0, sector)?;
    io.flush()?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::samples::*;
    use super::*;

    #[test]
    fn parse_and_roundtrip_entries() {
        let raw = full_disk_mbr();
        let sector = BootSector::parse(&raw).unwrap();
        assert_eq!(sector.to_bytes(), raw);

        let e = sector.entries()[0];
        assert!(e.is_bootable());
        assert!(e.is_ntfs());
        assert!(!e.is_fat());
        assert!(!e.is_not_windows_based());
        assert_eq!(e.start_lba, 2048);
        assert_eq!(e.sector_count, 0x003F_F800);
        assert_eq!(e.start(), Chs::new(0, 32, 33));

        for (i, entry) in sector.entries().iter().enumerate() {
            let off = PARTITION_TABLE_OFFSET + i * PARTITION_ENTRY_SIZE;
            let repacked = PartitionTableEntryPacked::from_aligned(entry);
            assert_eq!(repacked.as_bytes(), &raw[off..off + PARTITION_ENTRY_SIZE]);
        }
        assert_eq!(sector.disk_serial(), [0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn any_signed_buffer_roundtrips() {
        let mut raw = [0u8; 512];
        for (i, b) in raw.iter_mut().enumerate() {
            *b = (i * 7 + 3) as u8;
        }
        raw[510] = 0x55;
        raw[511] = 0xAA;
        let sector = BootSector::parse(&raw).unwrap();
        assert_eq!(sector.to_bytes(), raw);
    }

    #[test]
    fn missing_signature_is_rejected() {
        let mut raw = full_disk_mbr();
        raw[511] = 0x00;
        assert_eq!(
            BootSector::parse(&raw).unwrap_err(),
            PartError::NotASectorSignature { found: [0x55, 0x00] }
        );
        let mut swapped = full_disk_mbr();
        swapped[510] = 0xAA;
        swapped[511] = 0x55;
        assert!(BootSector::parse(&swapped).is_err());
    }

    #[test]
    fn classify_known_samples() {
        let mbr = BootSector::parse(&full_disk_mbr()).unwrap();
        assert_eq!(mbr.classify().unwrap(), SectorKind::FullDisk);

        let fat = BootSector::parse(&fat32_vbr()).unwrap();
        assert_eq!(fat.classify().unwrap(), SectorKind::PartitionOnly);
        assert_eq!(fat.volume_filesystem(), VolumeFs::Fat32);

        let ntfs = BootSector::parse(&ntfs_vbr()).unwrap();
        assert_eq!(ntfs.classify().unwrap(), SectorKind::PartitionOnly);
        assert_eq!(ntfs.volume_filesystem(), VolumeFs::Ntfs);
    }

    #[test]
    fn classify_reports_ambiguity() {
        let mut blank = [0u8; 512];
        blank[510] = 0x55;
        blank[511] = 0xAA;
        let s = BootSector::parse(&blank).unwrap();
        assert!(matches!(
            s.classify(),
            Err(PartError::ClassificationAmbiguous(_))
        ));

        // VBR markers on top of a valid partition table
        let mut both = full_disk_mbr();
        both[..3].copy_from_slice(&[0xEB, 0x52, 0x90]);
        both[3..11].copy_from_slice(b"NTFS    ");
        both[11..13].copy_from_slice(&512u16.to_le_bytes());
        let s = BootSector::parse(&both).unwrap();
        assert!(matches!(
            s.classify(),
            Err(PartError::ClassificationAmbiguous(_))
        ));
    }

    #[test]
    fn overlapping_table_is_not_a_full_disk() {
        let a = PartitionTableEntry::new(0x80, Chs::new(0, 1, 1), 0x07, Chs::default(), 63, 1000);
        let b = PartitionTableEntry::new(0x00, Chs::new(0, 1, 1), 0x83, Chs::default(), 500, 1000);
        let s = BootSector::new_from_entries([
            a,
            b,
            PartitionTableEntry::new_empty(),
            PartitionTableEntry::new_empty(),
        ]);
        assert!(s.classify().is_err());
    }

    #[test]
    fn bootable_and_described() {
        let a = PartitionTableEntry::new(0x00, Chs::new(0, 1, 1), 0x83, Chs::default(), 63, 1000);
        let b = PartitionTableEntry::new(0x80, Chs::new(0, 1, 1), 0x0C, Chs::default(), 2048, 4096);
        let s = BootSector::new_from_entries([
            a,
            PartitionTableEntry::new_empty(),
            b,
            PartitionTableEntry::new_empty(),
        ]);
        let (idx, e) = s.bootable_entry().unwrap();
        assert_eq!(idx, 2);
        assert!(e.is_fat());
        assert!(s.entries()[0].is_not_windows_based());
        assert_eq!(s.described_sectors(), 2048 + 4096);
    }

    #[test]
    fn generic_template_is_signed() {
        let t = BootSector::generic_template();
        let parsed = BootSector::parse(&t.to_bytes()).unwrap();
        let e = parsed.entries()[0];
        assert!(e.is_bootable());
        assert_eq!(e.start_lba, 63);
        assert_eq!(e.start(), Chs::new(0, 1, 1));
    }

    #[test]
    fn read_from_io() {
        let mut buf = vec![0u8; 1024];
        buf[..512].copy_from_slice(&fat32_vbr());
        let mut io = MemEvIO::new(&mut buf);
        let s = read_boot_sector(&mut io).unwrap();
        assert_eq!(s.volume_filesystem(), VolumeFs::Fat32);

        let mbr = BootSector::parse(&full_disk_mbr()).unwrap();
        write_boot_sector(&mut io, &mbr).unwrap();
        assert_eq!(read_boot_sector(&mut io).unwrap().to_bytes(), full_disk_mbr());
    }
}
