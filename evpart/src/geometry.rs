// SPDX-License-Identifier: MIT

pub use evio::SECTOR_SIZE;

/// Sectors reserved in front of the first partition on a legacy disk (one track).
pub const MBR_GAP_SECTORS: u64 = 63;
/// Heads of the synthetic geometry used for every fabricated disk.
pub const DEFAULT_HEADS: u8 = 255;
/// Sectors per track of the synthetic geometry.
pub const DEFAULT_SECTORS_PER_TRACK: u8 = 63;
/// Largest cylinder a 10-bit CHS field can hold.
pub const MAX_CHS_CYLINDER: u16 = 1023;

/// Unpacked CHS address as stored in a partition table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Chs {
    pub cylinder: u16,
    pub head: u8,
    pub sector: u8,
}

impl Chs {
    #[inline]
    pub fn new(cylinder: u16, head: u8, sector: u8) -> Self {
        Self {
            cylinder: cylinder.min(MAX_CHS_CYLINDER),
            head,
            sector: sector & 0x3F,
        }
    }

    /// Decodes `[head, sector | cyl_hi << 6, cyl_lo]`.
    #[inline]
    pub fn from_bytes(b: [u8; 3]) -> Self {
        Self {
            head: b[0],
            sector: b[1] & 0x3F,
            cylinder: (((b[1] & 0xC0) as u16) << 2) | b[2] as u16,
        }
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 3] {
        let cyl = self.cylinder.min(MAX_CHS_CYLINDER);
        [
            self.head,
            (self.sector & 0x3F) | (((cyl >> 2) & 0xC0) as u8),
            (cyl & 0xFF) as u8,
        ]
    }
}

impl core::fmt::Display for Chs {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}/{}", self.cylinder, self.head, self.sector)
    }
}

/// Cylinder/head/sector geometry of a whole disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub heads: u8,
    pub sectors_per_track: u8,
    pub cylinders: u64,
}

impl Geometry {
    #[inline]
    pub fn new(heads: u8, sectors_per_track: u8, cylinders: u64) -> Self {
        Self {
            heads,
            sectors_per_track,
            cylinders,
        }
    }

    /// Geometry that covers `total_sectors` (at least one cylinder).
    ///
    /// Zero heads or sectors fall back to the synthetic 255/63 layout.
    pub fn from_total_sectors(total_sectors: u64, heads: u8, sectors_per_track: u8) -> Self {
        let (heads, spt) = if heads == 0 || sectors_per_track == 0 {
            (DEFAULT_HEADS, DEFAULT_SECTORS_PER_TRACK)
        } else {
            (heads, sectors_per_track)
        };
        let per_cyl = heads as u64 * spt as u64;
        Self::new(heads, spt, (total_sectors / per_cyl).max(1))
    }

    /// 255 heads, 63 sectors per track.
    #[inline]
    pub fn synthetic(total_sectors: u64) -> Self {
        Self::from_total_sectors(total_sectors, DEFAULT_HEADS, DEFAULT_SECTORS_PER_TRACK)
    }

    #[inline]
    pub fn sectors_per_cylinder(&self) -> u64 {
        self.heads as u64 * self.sectors_per_track as u64
    }

    /// CHS address of `lba`, saturated to the last addressable CHS tuple.
    pub fn lba_to_chs(&self, lba: u64) -> Chs {
        let spc = self.sectors_per_cylinder();
        let spt = self.sectors_per_track as u64;
        if spc == 0 {
            return Chs::default();
        }
        let cyl = lba / spc;
        if cyl > MAX_CHS_CYLINDER as u64 {
            return Chs::new(MAX_CHS_CYLINDER, self.heads.saturating_sub(1), self.sectors_per_track);
        }
        let rem = lba % spc;
        Chs::new(cyl as u16, (rem / spt) as u8, (rem % spt + 1) as u8)
    }

    /// LBA of a CHS address; `None` for sector 0, which CHS never uses.
    pub fn chs_to_lba(&self, chs: Chs) -> Option<u64> {
        if chs.sector == 0 {
            return None;
        }
        let heads = self.heads as u64;
        let spt = self.sectors_per_track as u64;
        Some((chs.cylinder as u64 * heads + chs.head as u64) * spt + (chs.sector as u64 - 1))
    }
}
