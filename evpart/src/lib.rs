// SPDX-License-Identifier: MIT

pub mod errors;
/// Two-phase fabrication of a boot sector for partition-only images.
pub mod fabricate;
/// Sector size, CHS packing and synthetic disk geometry.
pub mod geometry;
/// Master Boot Record model and full-disk / partition classification.
pub mod mbr;
/// NT disk serial recovered from a guest registry.
pub mod serial;

pub use fabricate::{
    FabricatedBootSector, GeometryOnly, Persisted, SerialPatched, fabricate_geometry,
    load_template,
};
pub use geometry::{
    Chs, DEFAULT_HEADS, DEFAULT_SECTORS_PER_TRACK, Geometry, MBR_GAP_SECTORS, SECTOR_SIZE,
};
pub use mbr::{BootSector, PartitionTableEntry, SectorKind, VolumeFs, read_boot_sector};
pub use serial::parse_disk_serial;
