// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use crate::file::EvidenceFile;
use crate::{EvIOError, EvIOResult, EvRead};

#[derive(Debug)]
struct Segment {
    file: EvidenceFile,
    /// Absolute offset of the first byte of this segment.
    start: u64,
    len: u64,
}

/// Read-only view of an ordered chunk set as one contiguous byte stream.
///
/// Chunks must already be in concatenation order (see `order_chunks`).
/// Reads spanning a chunk boundary are split across segments.
#[derive(Debug)]
pub struct SplitEvRead {
    segments: Vec<Segment>,
    total: u64,
}

impl SplitEvRead {
    pub fn open(paths: &[PathBuf]) -> EvIOResult<Self> {
        if paths.is_empty() {
            return Err(EvIOError::Other("split image: no chunk files"));
        }
        let mut segments = Vec::with_capacity(paths.len());
        let mut start = 0u64;
        for path in paths {
            let mut file = EvidenceFile::open(path)?;
            let len = file.size_bytes()?;
            segments.push(Segment { file, start, len });
            start = start
                .checked_add(len)
                .ok_or(EvIOError::Other("split image: total length overflow"))?;
        }
        Ok(Self {
            segments,
            total: start,
        })
    }

    /// Byte length of each chunk, in concatenation order.
    pub fn chunk_lengths(&self) -> Vec<u64> {
        self.segments.iter().map(|s| s.len).collect()
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.segments.len()
    }

    /// Index of the segment holding absolute byte `offset`.
    fn segment_at(&self, offset: u64) -> Option<usize> {
        let idx = self
            .segments
            .partition_point(|s| s.start + s.len <= offset);
        (idx < self.segments.len()).then_some(idx)
    }
}

impl EvRead for SplitEvRead {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> EvIOResult {
        let end = offset
            .checked_add(buf.len() as u64)
            .ok_or(EvIOError::OutOfBounds)?;
        if end > self.total {
            return Err(EvIOError::OutOfBounds);
        }
        if buf.is_empty() {
            return Ok(());
        }

        let mut idx = self.segment_at(offset).ok_or(EvIOError::OutOfBounds)?;
        let mut abs = offset;
        let mut pos = 0usize;
        while pos < buf.len() {
            let seg = &mut self.segments[idx];
            let local = abs - seg.start;
            let avail = (seg.len - local) as usize;
            let n = avail.min(buf.len() - pos);
            seg.file.read_at(local, &mut buf[pos..pos + n])?;
            pos += n;
            abs += n as u64;
            idx += 1;
        }
        Ok(())
    }

    #[inline]
    fn size_bytes(&mut self) -> EvIOResult<u64> {
        Ok(self.total)
    }
}
