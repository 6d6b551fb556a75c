// SPDX-License-Identifier: MIT

pub fn pretty_bytes(n: u64) -> String {
    const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
    let mut val = n as f64;
    let mut idx = 0usize;
    while val >= 1024.0 && idx + 1 < UNITS.len() {
        val /= 1024.0;
        idx += 1;
    }
    if idx == 0 {
        format!("{} {}", sep_u64(n), UNITS[idx])
    } else {
        format!("{:.1} {}", val, UNITS[idx])
    }
}

/// Thousands grouped with a space: `199 218 750`.
pub fn sep_u64(mut n: u64) -> String {
    if n < 1_000 {
        return n.to_string();
    }
    let mut parts: Vec<String> = Vec::new();
    while n >= 1_000 {
        parts.push(format!("{:03}", (n % 1_000)));
        n /= 1_000;
    }
    parts.push(n.to_string());
    parts.reverse();
    parts.join(" ")
}

/// Sector count with its byte size, for log lines.
pub fn pretty_sectors(sectors: u64) -> String {
    format!(
        "{} sectors ({})",
        sep_u64(sectors),
        pretty_bytes(sectors.saturating_mul(evio::SECTOR_SIZE))
    )
}

/// `DE AD BE EF`
pub fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
