// SPDX-License-Identifier: MIT

// Core modules
pub mod errors;
#[macro_use]
mod macros;
pub mod sequence;
pub mod source;

// Backend modules
mod file;
#[cfg(any(test, feature = "mem"))]
mod mem;
mod split;

// Prelude re-exports (central entrypoint)
pub mod prelude {
    pub use super::EvIO;
    pub use super::EvIOExt;
    pub use super::EvRead;
    pub use super::EvReadExt;
    pub use super::EvStructExt;
    pub use super::errors::*;
    pub use super::file::{EvidenceFile, StdEvIO};
    pub use super::sequence::{ChunkOrder, discover_chunks, order_chunks};
    pub use super::source::DiskImageSource;
    pub use super::split::SplitEvRead;

    #[cfg(any(test, feature = "mem"))]
    pub use super::mem::MemEvIO;
}

// Internal use
use errors::*;

// Constants

/// Size of a logical sector; every image handled here is addressed in 512-byte units.
pub const SECTOR_SIZE: u64 = 512;

/// Scratch buffer used by streamed reads (hashing, comparisons).
pub const BLOCK_BUF_SIZE: usize = 64 * 1024;

// Traits

/// Read-only positional access.
///
/// Evidence (image files, chunk sets, raw devices) is only ever handed out
/// behind this trait, so nothing downstream can write to it.
pub trait EvRead {
    /// Reads `buf.len()` bytes into `buf` from `offset` (absolute).
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> EvIOResult;

    /// Total addressable length in bytes.
    fn size_bytes(&mut self) -> EvIOResult<u64>;
}

/// Read-write positional access, for artifacts this tool owns
/// (fabricated boot sectors, descriptors). Never implemented for evidence.
pub trait EvIO: EvRead {
    /// Writes `data` at `offset` (absolute).
    fn write_at(&mut self, offset: u64, data: &[u8]) -> EvIOResult;

    /// Flushes any buffered data (may be a no-op).
    fn flush(&mut self) -> EvIOResult;
}

/// Convenience reads on top of `EvRead`.
pub trait EvReadExt: EvRead {
    /// Reads one 512-byte sector at `lba`.
    #[inline]
    fn read_sector(&mut self, lba: u64) -> EvIOResult<[u8; 512]> {
        let off = lba
            .checked_mul(SECTOR_SIZE)
            .ok_or(EvIOError::Other("read_sector: LBA overflow"))?;
        let mut buf = [0u8; 512];
        self.read_at(off, &mut buf)?;
        Ok(buf)
    }

    /// Number of whole sectors; a trailing partial sector is not counted.
    #[inline]
    fn size_sectors(&mut self) -> EvIOResult<u64> {
        Ok(self.size_bytes()? / SECTOR_SIZE)
    }

    /// Feeds `[offset, offset + len)` to `f` in pieces of at most `BLOCK_BUF_SIZE`.
    fn read_streamed<F>(&mut self, offset: u64, len: u64, mut f: F) -> EvIOResult
    where
        F: FnMut(&[u8]),
    {
        let mut buf = vec![0u8; BLOCK_BUF_SIZE];
        let mut off = offset;
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(BLOCK_BUF_SIZE as u64) as usize;
            self.read_at(off, &mut buf[..n])?;
            f(&buf[..n]);
            off += n as u64;
            remaining -= n as u64;
        }
        Ok(())
    }

    // Implements read helpers for primitive types (u16, u32)
    evio_impl_primitive_read!(u16, u32);
}

impl<T: EvRead + ?Sized> EvReadExt for T {}

/// Convenience writes on top of `EvIO`.
pub trait EvIOExt: EvIO {
    /// Fills a region with zeroes.
    fn zero_fill(&mut self, offset: u64, len: usize) -> EvIOResult {
        const ZERO_BUF: [u8; 4096] = [0u8; 4096];
        let mut remaining = len;
        let mut off = offset;
        while remaining > 0 {
            let chunk = remaining.min(ZERO_BUF.len());
            self.write_at(off, &ZERO_BUF[..chunk])?;
            off += chunk as u64;
            remaining -= chunk;
        }
        Ok(())
    }

    // Implements write helpers for primitive types (u16, u32)
    evio_impl_primitive_write!(u16, u32);
}

impl<T: EvIO + ?Sized> EvIOExt for T {}

/// Extension trait for reading and writing structs using zerocopy.
pub trait EvStructExt: EvRead {
    /// Reads a struct of type `T` from the given offset.
    fn read_struct<T: zerocopy::FromBytes + zerocopy::KnownLayout + zerocopy::Immutable>(
        &mut self,
        offset: u64,
    ) -> EvIOResult<T> {
        let size = core::mem::size_of::<T>();
        assert!(size <= 4096, "read_struct: type too large");
        let mut buf = [0u8; 4096];
        self.read_at(offset, &mut buf[..size])?;
        T::read_from_bytes(&buf[..size]).map_err(|_| EvIOError::Other("read_struct failed"))
    }

    /// Writes a struct of type `T` at the given offset.
    fn write_struct<T: zerocopy::IntoBytes + zerocopy::KnownLayout + zerocopy::Immutable>(
        &mut self,
        offset: u64,
        val: &T,
    ) -> EvIOResult
    where
        Self: EvIO,
    {
        self.write_at(offset, zerocopy::IntoBytes::as_bytes(val))
    }
}

impl<T: EvRead + ?Sized> EvStructExt for T {}

impl<R: EvRead + ?Sized> EvRead for Box<R> {
    #[inline]
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> EvIOResult {
        (**self).read_at(offset, buf)
    }

    #[inline]
    fn size_bytes(&mut self) -> EvIOResult<u64> {
        (**self).size_bytes()
    }
}
