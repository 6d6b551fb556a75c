// SPDX-License-Identifier: MIT

//! On MBR disks, NT records which disk a volume lives on as a
//! `MountedDevices` binary value whose first four bytes are the disk serial
//! (MBR offset 440). Registry tools print that value in a few textual forms;
//! all of them reduce to a byte list here.

/// First four bytes of a registry binary value, in stored order.
///
/// Accepted forms: `hex:12,34,56,78,...` (reg export), `12 34 56 78 ...`,
/// `12,34,...` and a bare hex run `12345678...`. Returns `None` for fewer
/// than four bytes or any non-hex token.
pub fn parse_disk_serial(value: &str) -> Option<[u8; 4]> {
    let s = value.trim();
    let s = s
        .strip_prefix("hex:")
        .or_else(|| s.strip_prefix("hex(3):"))
        .unwrap_or(s)
        .trim();

    let bytes: Vec<u8> = if s.contains([',', ' ', '\t', '\n']) {
        s.split(|c: char| c == ',' || c.is_whitespace())
            .map(|t| t.trim_start_matches('\\'))
            .filter(|t| !t.is_empty())
            .map(|t| {
                if t.len() > 2 {
                    return None;
                }
                u8::from_str_radix(t, 16).ok()
            })
            .collect::<Option<Vec<u8>>>()?
    } else {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        if raw.len() % 2 != 0 {
            return None;
        }
        (0..raw.len())
            .step_by(2)
            .map(|i| raw.get(i..i + 2).and_then(|b| u8::from_str_radix(b, 16).ok()))
            .collect::<Option<Vec<u8>>>()?
    };

    let head = bytes.get(..4)?;
    let mut out = [0u8; 4];
    out.copy_from_slice(head);
    Some(out)
}
