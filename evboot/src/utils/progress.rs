// SPDX-License-Identifier: MIT

use evio::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::utils::{LogLevel, log_level};

fn bar(total_size: u64, message: &str) -> ProgressBar {
    if log_level() == LogLevel::Quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total_size);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.white}] {bytes}/{total_bytes} (ETA {eta_precise}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░░");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// CRC32 of every byte of `reader`, drawing a progress bar.
pub fn crc32_with_progress<R: EvRead + ?Sized>(reader: &mut R, message: &str) -> EvIOResult<u32> {
    let total = reader.size_bytes()?;
    let pb = bar(total, message);
    let mut hasher = crc32fast::Hasher::new();
    reader.read_streamed(0, total, |block| {
        hasher.update(block);
        pb.inc(block.len() as u64);
    })?;
    pb.finish_and_clear();
    Ok(hasher.finalize())
}

/// CRC32 of the whole evidence stream (chunks concatenated in order).
pub fn evidence_crc32(source: &DiskImageSource) -> EvIOResult<u32> {
    let mut reader = source.open()?;
    crc32_with_progress(&mut reader, "Hashing evidence")
}
