// SPDX-License-Identifier: GPL-3.0-or-later

use std::io::prelude::*;
use anyhow::{Context, Result};

pub fn read_file(path: &str) -> Result<Vec<u8>> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path))?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf)
        .with_context(|| format!("Failed to read {}", path))?;

    Ok(buf)
}


pub fn read_file_str(path: &str) -> Result<String> {
    let content = read_file(path)?;
    let str = String::from_utf8(content)
        .with_context(|| format!("{} is not valid UTF-8", path))?;
    Ok(str)
}

/// 297000000 -> "297.000MHz"
pub fn format_rate(rate: u64) -> String {
    match rate {
        0 => "0".to_string(),
        r if r >= 1_000_000 => format!("{}.{:03}MHz", r / 1_000_000, (r % 1_000_000) / 1_000),
        r if r >= 1_000 => format!("{}.{:03}kHz", r / 1_000, r % 1_000),
        r => format!("{}Hz", r),
    }
}
