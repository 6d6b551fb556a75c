// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};

use evio::prelude::*;
use evpart::errors::PartError;
use evpart::geometry::{DEFAULT_HEADS, DEFAULT_SECTORS_PER_TRACK, Geometry, MBR_GAP_SECTORS};
use evpart::{BootSector, SectorKind, read_boot_sector};

use super::{CreateType, DiskDatabase, Extent, VirtualDiskDescriptor, new_cid};
use crate::error::{Phase, PrepError, PrepResult};
use crate::pipeline::BootPreparationContext;
use crate::utils::string::pretty_sectors;

/// Builds the extent list and disk database for the classified evidence.
///
/// Extents always sum to the capacity the descriptor declares; no branch
/// produces an empty or negative extent.
pub fn synthesize(ctx: &BootPreparationContext) -> PrepResult<VirtualDiskDescriptor> {
    let kind = ctx.kind.ok_or(PrepError::Format(PartError::Other(
        "evidence has not been classified",
    )))?;

    let (create_type, extents, sector) = match kind {
        SectorKind::PartitionOnly => {
            let (extents, mbr) = partition_extents(ctx)?;
            (CreateType::MonolithicFlat, extents, mbr)
        }
        SectorKind::FullDisk => {
            let sector = ctx.boot_sector.ok_or(PrepError::Format(PartError::Other(
                "full disk without a boot sector",
            )))?;
            let described = sector.described_sectors();
            if ctx.is_physical_disk() {
                (CreateType::FullDevice, physical_extents(ctx, described)?, sector)
            } else if ctx.is_chunked() {
                (CreateType::MonolithicFlat, chunked_extents(ctx, described), sector)
            } else {
                (CreateType::MonolithicFlat, file_extents(ctx, described)?, sector)
            }
        }
    };

    let total: u64 = extents.iter().map(|e| e.size_sectors).sum();
    let geometry = ddb_geometry(&sector, total);
    crate::log_verbose!(
        "Descriptor: {} extents, {} ({})",
        extents.len(),
        pretty_sectors(total),
        create_type
    );

    Ok(VirtualDiskDescriptor {
        cid: new_cid(),
        create_type,
        extents,
        ddb: DiskDatabase {
            adapter_type: ctx.adapter_type,
            sectors_per_track: geometry.sectors_per_track,
            heads_per_cylinder: geometry.heads,
            cylinders: geometry.cylinders,
        },
    })
}

/// Disk geometry for the `#DDB` section.
///
/// Heads and sectors per track come from the end CHS of the bootable (or
/// first used) entry; the stored head is an index, so heads = head + 1,
/// saturating at 255. Unusable CHS falls back to 255/63.
pub fn ddb_geometry(sector: &BootSector, total_sectors: u64) -> Geometry {
    let (heads, spt) = match sector.bootable_entry() {
        Some((_, e)) if e.end().sector != 0 => {
            let end = e.end();
            (end.head.saturating_add(1), end.sector)
        }
        _ => (DEFAULT_HEADS, DEFAULT_SECTORS_PER_TRACK),
    };
    Geometry::from_total_sectors(total_sectors, heads, spt)
}

/// Fabricated MBR, one `FLAT` per chunk, then `ZERO` up to the parent size.
fn partition_extents(ctx: &BootPreparationContext) -> PrepResult<(Vec<Extent>, BootSector)> {
    let mbr = match &ctx.fabricated_mbr {
        Some(p) if p.is_file() => p.clone(),
        Some(p) => {
            return Err(PrepError::MissingCustomMbr {
                expected: p.clone(),
            });
        }
        None => {
            return Err(PrepError::MissingCustomMbr {
                expected: ctx.mbr_path(),
            });
        }
    };
    let sector = read_fabricated(&mbr)?;

    let mut extents = vec![Extent::flat(&mbr, MBR_GAP_SECTORS, 0)];
    let data = push_chunks(ctx, &mut extents);

    let used = data + MBR_GAP_SECTORS;
    let parent = if ctx.parent_disk_sectors < used {
        crate::log_warn!(
            "Parent disk ({}) is smaller than the partition; growing to {}",
            pretty_sectors(ctx.parent_disk_sectors),
            pretty_sectors(used)
        );
        used
    } else {
        ctx.parent_disk_sectors
    };
    if parent > used {
        extents.push(Extent::zero(parent - used));
    }
    Ok((extents, sector))
}

/// Single image file: data up to what the table describes, `ZERO` for the
/// rest of whichever is larger.
fn file_extents(ctx: &BootPreparationContext, described: u64) -> PrepResult<Vec<Extent>> {
    let path = single_path(ctx)?;
    let file = ctx.image_sectors();
    let flat = described.min(file);
    let total = described.max(file);
    if file < described {
        crate::log_warn!(
            "Image is shorter than its partition table ({} < {})",
            pretty_sectors(file),
            pretty_sectors(described)
        );
    }
    let mut extents = vec![Extent::flat(path, flat, 0)];
    if total > flat {
        extents.push(Extent::zero(total - flat));
    }
    Ok(extents)
}

/// Raw device: data up to what the table describes, bounded by the device;
/// `ZERO` to the device size, or to the next whole 255×63 cylinder when the
/// device reports no size.
fn physical_extents(ctx: &BootPreparationContext, described: u64) -> PrepResult<Vec<Extent>> {
    let path = single_path(ctx)?;
    let device = ctx.image_sectors();
    let (flat, total) = if device > 0 {
        (described.min(device), device)
    } else {
        let per_cyl = DEFAULT_HEADS as u64 * DEFAULT_SECTORS_PER_TRACK as u64;
        crate::log_verbose!("Device size unknown; rounding to whole cylinders");
        (described, described.div_ceil(per_cyl) * per_cyl)
    };
    let mut extents = vec![Extent::flat(path, flat, 0)];
    if total > flat {
        extents.push(Extent::zero(total - flat));
    }
    Ok(extents)
}

/// One `FLAT` per chunk; `ZERO` only when the chunks fall short of the table.
fn chunked_extents(ctx: &BootPreparationContext, described: u64) -> Vec<Extent> {
    let mut extents = Vec::with_capacity(ctx.chunk_lengths.len() + 1);
    let data = push_chunks(ctx, &mut extents);
    if described > data {
        extents.push(Extent::zero(described - data));
    } else if data > described {
        crate::log_verbose!(
            "Chunks hold {} beyond the partition table",
            pretty_sectors(data - described)
        );
    }
    extents
}

/// Appends a `FLAT` per non-empty chunk and returns the sectors added.
fn push_chunks(ctx: &BootPreparationContext, extents: &mut Vec<Extent>) -> u64 {
    let mut data = 0;
    for (path, len) in ctx.source.paths().into_iter().zip(&ctx.chunk_lengths) {
        let sectors = len / evio::SECTOR_SIZE;
        if len % evio::SECTOR_SIZE != 0 {
            crate::log_warn!(
                "{}: {} trailing bytes ignored (not a whole sector)",
                path.display(),
                len % evio::SECTOR_SIZE
            );
        }
        if sectors == 0 {
            crate::log_verbose!("{}: empty chunk skipped", path.display());
            continue;
        }
        extents.push(Extent::flat(path, sectors, 0));
        data += sectors;
    }
    data
}

fn single_path(ctx: &BootPreparationContext) -> PrepResult<PathBuf> {
    ctx.source
        .first_path()
        .map(Path::to_path_buf)
        .map_err(|e| PrepError::io(Phase::Descriptor, Path::new(""), e))
}

fn read_fabricated(path: &Path) -> PrepResult<BootSector> {
    let mut f = EvidenceFile::open(path).map_err(|e| PrepError::io(Phase::Descriptor, path, e))?;
    read_boot_sector(&mut f).map_err(|e| PrepError::from_part(Phase::Descriptor, path, e))
}
