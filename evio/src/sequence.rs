// SPDX-License-Identifier: MIT

//! Ordering of split-image chunk files.
//!
//! Split images usually carry a numeric sequence extension (`.001`, `.002`,
//! ...). When every extension is numeric the chunks are ordered by value,
//! otherwise by full path. A mixed set falls back to lexicographic order for
//! the whole set, which misorders unpadded numbers (`.1`, `.10`, `.2`); keep
//! any stricter policy inside this module.

use std::path::{Path, PathBuf};

use crate::EvIOResult;

/// Which rule `order_chunks` applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOrder {
    Numeric,
    Lexicographic,
}

/// Extension parsed as a base-10 integer, if it is one.
fn numeric_extension(path: &Path) -> Option<u64> {
    let ext = path.extension()?.to_str()?;
    if ext.is_empty() || !ext.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    ext.parse::<u64>().ok()
}

/// Sorts `paths` into concatenation order and reports the rule used.
pub fn order_chunks(paths: &mut [PathBuf]) -> ChunkOrder {
    let numeric: Option<Vec<u64>> = paths.iter().map(|p| numeric_extension(p)).collect();
    match numeric {
        Some(_) if !paths.is_empty() => {
            // stable: equal sequence numbers keep their given order
            paths.sort_by_key(|p| numeric_extension(p).unwrap_or(u64::MAX));
            ChunkOrder::Numeric
        }
        _ => {
            paths.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
            ChunkOrder::Lexicographic
        }
    }
}

/// Finds every sibling of `first` sharing its file stem and orders them.
///
/// `evidence/disk.001` yields `disk.001`, `disk.002`, ... from `evidence/`.
pub fn discover_chunks(first: &Path) -> EvIOResult<(Vec<PathBuf>, ChunkOrder)> {
    let dir = match first.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let stem = first
        .file_stem()
        .ok_or(crate::EvIOError::Other("chunk path has no file name"))?
        .to_os_string();

    let mut found = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.is_file() && path.file_stem() == Some(stem.as_os_str()) {
            found.push(path);
        }
    }
    let order = order_chunks(&mut found);
    Ok((found, order))
}
