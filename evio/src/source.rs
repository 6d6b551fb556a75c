// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};

use crate::file::EvidenceFile;
use crate::split::SplitEvRead;
use crate::{EvIOError, EvIOResult, EvRead, EvReadExt};

/// Where the evidence bytes come from.
///
/// Exactly one variant per preparation attempt. Every variant opens
/// read-only and hands out an `EvRead`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskImageSource {
    SingleFile(PathBuf),
    /// Chunk files in concatenation order.
    ChunkedFiles(Vec<PathBuf>),
    /// Raw device node (`/dev/sdb`, `\\.\PhysicalDrive1`).
    PhysicalDevice(PathBuf),
}

impl DiskImageSource {
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, DiskImageSource::ChunkedFiles(_))
    }

    #[inline]
    pub fn is_physical(&self) -> bool {
        matches!(self, DiskImageSource::PhysicalDevice(_))
    }

    /// Backing paths in order (one for file and device sources).
    pub fn paths(&self) -> Vec<PathBuf> {
        match self {
            DiskImageSource::SingleFile(p) | DiskImageSource::PhysicalDevice(p) => vec![p.clone()],
            DiskImageSource::ChunkedFiles(ps) => ps.clone(),
        }
    }

    /// Path of the first backing file; the boot sector lives there.
    pub fn first_path(&self) -> EvIOResult<&Path> {
        match self {
            DiskImageSource::SingleFile(p) | DiskImageSource::PhysicalDevice(p) => Ok(p),
            DiskImageSource::ChunkedFiles(ps) => ps
                .first()
                .map(PathBuf::as_path)
                .ok_or(EvIOError::Other("split image: no chunk files")),
        }
    }

    /// Opens the whole source as one read-only stream.
    pub fn open(&self) -> EvIOResult<Box<dyn EvRead>> {
        Ok(match self {
            DiskImageSource::SingleFile(p) | DiskImageSource::PhysicalDevice(p) => {
                Box::new(EvidenceFile::open(p)?)
            }
            DiskImageSource::ChunkedFiles(ps) => Box::new(SplitEvRead::open(ps)?),
        })
    }

    /// First 512 bytes of the source (first chunk for split images).
    pub fn read_first_sector(&self) -> EvIOResult<[u8; 512]> {
        let mut first = EvidenceFile::open(self.first_path()?)?;
        first.read_sector(0)
    }

    /// Byte length of each backing file, in order.
    pub fn chunk_lengths(&self) -> EvIOResult<Vec<u64>> {
        match self {
            DiskImageSource::ChunkedFiles(ps) => Ok(SplitEvRead::open(ps)?.chunk_lengths()),
            _ => {
                let mut f = EvidenceFile::open(self.first_path()?)?;
                Ok(vec![f.size_bytes()?])
            }
        }
    }

    /// Total byte length of the source.
    pub fn total_bytes(&self) -> EvIOResult<u64> {
        Ok(self.chunk_lengths()?.iter().sum())
    }
}

impl core::fmt::Display for DiskImageSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DiskImageSource::SingleFile(p) => write!(f, "image {}", p.display()),
            DiskImageSource::PhysicalDevice(p) => write!(f, "device {}", p.display()),
            DiskImageSource::ChunkedFiles(ps) => {
                write!(f, "split image ({} chunks", ps.len())?;
                if let Some(first) = ps.first() {
                    write!(f, ", first {}", first.display())?;
                }
                write!(f, ")")
            }
        }
    }
}
