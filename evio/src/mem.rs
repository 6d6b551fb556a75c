// SPDX-License-Identifier: MIT

use crate::{EvIO, EvIOError, EvIOResult, EvRead};

/// In-memory implementation of `EvRead` / `EvIO`.
///
/// Useful for tests and for staging a sector before it is persisted.
#[derive(Debug)]
pub struct MemEvIO<'a> {
    buffer: &'a mut [u8],
}

impl<'a> MemEvIO<'a> {
    #[inline]
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer }
    }

    #[inline]
    fn check_bounds(&self, offset: u64, len: usize) -> EvIOResult {
        let end = offset
            .checked_add(len as u64)
            .ok_or(EvIOError::OutOfBounds)?;
        if end > self.buffer.len() as u64 {
            return Err(EvIOError::OutOfBounds);
        }
        Ok(())
    }
}

impl<'a> EvRead for MemEvIO<'a> {
    #[inline(always)]
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> EvIOResult {
        self.check_bounds(offset, buf.len())?;
        let src = &self.buffer[offset as usize..offset as usize + buf.len()];
        buf.copy_from_slice(src);
        Ok(())
    }

    #[inline]
    fn size_bytes(&mut self) -> EvIOResult<u64> {
        Ok(self.buffer.len() as u64)
    }
}

impl<'a> EvIO for MemEvIO<'a> {
    #[inline(always)]
    fn write_at(&mut self, offset: u64, data: &[u8]) -> EvIOResult {
        self.check_bounds(offset, data.len())?;
        let dst = &mut self.buffer[offset as usize..offset as usize + data.len()];
        dst.copy_from_slice(data);
        Ok(())
    }

    #[inline]
    fn flush(&mut self) -> EvIOResult {
        Ok(())
    }
}
