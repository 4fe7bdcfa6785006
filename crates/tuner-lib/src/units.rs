//! Byte-size parsing and formatting using PostgreSQL unit spellings

use crate::error::{Result, TuneError};

pub const KIB: u64 = 1024;
pub const MIB: u64 = KIB * 1024;
pub const GIB: u64 = MIB * 1024;
pub const TIB: u64 = GIB * 1024;

/// Parse a size such as `2GB`, `512MB`, `64kB` or a bare byte count.
///
/// Units are powers of 1024, as in `postgresql.conf`. Suffixes are matched
/// case-insensitively and the trailing `B` is optional (`2G` == `2GB`).
pub fn parse_size(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, suffix) = trimmed.split_at(split);

    if digits.is_empty() {
        return Err(TuneError::InvalidSize(input.to_string()));
    }

    let value: u64 = digits
        .parse()
        .map_err(|_| TuneError::InvalidSize(input.to_string()))?;

    let multiplier = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => KIB,
        "m" | "mb" => MIB,
        "g" | "gb" => GIB,
        "t" | "tb" => TIB,
        _ => return Err(TuneError::InvalidSize(input.to_string())),
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| TuneError::InvalidSize(input.to_string()))
}

/// Format bytes with the largest unit that represents the value exactly.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0".to_string();
    }

    for (unit, suffix) in [(TIB, "TB"), (GIB, "GB"), (MIB, "MB"), (KIB, "kB")] {
        if bytes % unit == 0 {
            return format!("{}{}", bytes / unit, suffix);
        }
    }

    format!("{}B", bytes)
}
