// SPDX-License-Identifier: MIT

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::{EvIO, EvIOResult, EvRead};

/// Read-write adapter over any `Read + Write + Seek`.
///
/// Used for the artifacts this tool creates itself, never for evidence.
#[derive(Debug)]
pub struct StdEvIO<'a, T: Read + Write + Seek> {
    io: &'a mut T,
}

impl<'a, T: Read + Write + Seek> StdEvIO<'a, T> {
    #[inline]
    pub fn new(io: &'a mut T) -> Self {
        Self { io }
    }
}

impl<'a, T: Read + Write + Seek> EvRead for StdEvIO<'a, T> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> EvIOResult {
        self.io.seek(SeekFrom::Start(offset))?;
        self.io.read_exact(buf)?;
        Ok(())
    }

    fn size_bytes(&mut self) -> EvIOResult<u64> {
        let len = self.io.seek(SeekFrom::End(0))?;
        Ok(len)
    }
}

impl<'a, T: Read + Write + Seek> EvIO for StdEvIO<'a, T> {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> EvIOResult {
        self.io.seek(SeekFrom::Start(offset))?;
        self.io.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> EvIOResult {
        self.io.flush()?;
        Ok(())
    }
}

/// An evidence file or raw device opened read-only.
///
/// Only `EvRead` is implemented. The length is taken by seeking to the end,
/// which also works for block devices whose metadata length is zero.
#[derive(Debug)]
pub struct EvidenceFile {
    file: File,
    path: PathBuf,
}

impl EvidenceFile {
    pub fn open(path: &Path) -> EvIOResult<Self> {
        let file = File::open(path).map_err(|e| crate::EvIOError::from(e).at_path(path))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EvRead for EvidenceFile {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> EvIOResult {
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.read_exact(buf))
            .map_err(|e| crate::EvIOError::from(e).at_path(&self.path))
    }

    fn size_bytes(&mut self) -> EvIOResult<u64> {
        self.file
            .seek(SeekFrom::End(0))
            .map_err(|e| crate::EvIOError::from(e).at_path(&self.path))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::prelude::*;
    use tempfile::{NamedTempFile, tempfile};

    #[test]
    fn test_rw() {
        let mut file = tempfile().unwrap();
        let mut io = StdEvIO::new(&mut file);
        io.write_at(10, &[1, 2, 3, 4]).unwrap();

        let mut output = [0u8; 4];
        io.read_at(10, &mut output).unwrap();
        assert_eq!(output, [1, 2, 3, 4]);
        assert_eq!(io.size_bytes().unwrap(), 14);
    }

    #[test]
    fn test_evidence_read_only() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(&[0xAB; 1024]).unwrap();
        tmp.flush().unwrap();

        let mut ev = EvidenceFile::open(tmp.path()).unwrap();
        assert_eq!(ev.size_bytes().unwrap(), 1024);
        assert_eq!(ev.size_sectors().unwrap(), 2);
        let sector = ev.read_sector(1).unwrap();
        assert!(sector.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_evidence_short_read_names_path() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(&[0u8; 100]).unwrap();
        tmp.flush().unwrap();

        let mut ev = EvidenceFile::open(tmp.path()).unwrap();
        let err = ev.read_sector(0).unwrap_err();
        let name = tmp.path().display().to_string();
        assert!(err.msg().contains(&name));
    }

    #[test]
    fn test_missing_evidence() {
        let err = EvidenceFile::open(Path::new("/nonexistent/evidence.dd")).unwrap_err();
        assert!(matches!(
            err,
            EvIOError::Io {
                kind: std::io::ErrorKind::NotFound,
                ..
            }
        ));
    }
}
