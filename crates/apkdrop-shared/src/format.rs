//! Human-readable formatting for sizes and view counts.

use lazy_static::lazy_static;
use regex::Regex;

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

lazy_static! {
    static ref SUFFIXED_VIEWS: Regex =
        Regex::new(r"(?i)^(\d+(?:\.\d+)?)([km])$").expect("views pattern is valid");
}

/// Base-1024 size rounded to one decimal, e.g. `1536` -> `"1.5KB"`.
///
/// Whole values drop the decimal (`1048576` -> `"1MB"`). Anything at or
/// above 1 TiB is still expressed in GB.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0B".to_string();
    }

    let mut unit = 0;
    while unit + 1 < SIZE_UNITS.len() && bytes >= 1u64 << (10 * (unit + 1)) {
        unit += 1;
    }

    let value = bytes as f64 / (1u64 << (10 * unit)) as f64;
    let rounded = (value * 10.0).round() / 10.0;
    format!("{}{}", rounded, SIZE_UNITS[unit])
}

/// Normalize a free-form view count (`"1.5k"`, `"2M"`, `"1200"`) into a
/// comma-grouped integer string. Unrecognized input becomes `"0"`.
pub fn format_views(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() || raw == "0" {
        return "0".to_string();
    }

    if let Some(caps) = SUFFIXED_VIEWS.captures(raw) {
        let number: f64 = caps[1].parse().unwrap_or(0.0);
        let multiplier = if caps[2].eq_ignore_ascii_case("k") {
            1_000.0
        } else {
            1_000_000.0
        };
        return group_thousands((number * multiplier).round() as i64);
    }

    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => group_thousands(n.trunc() as i64),
        _ => "0".to_string(),
    }
}

/// `1234567` -> `"1,234,567"`.
pub fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0B");
        assert_eq!(format_file_size(512), "512B");
        assert_eq!(format_file_size(1024), "1KB");
        assert_eq!(format_file_size(1536), "1.5KB");
        assert_eq!(format_file_size(1048576), "1MB");
        assert_eq!(format_file_size(2621440), "2.5MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3GB");
    }

    #[test]
    fn test_format_file_size_caps_at_gb() {
        assert_eq!(format_file_size(2 * 1024 * 1024 * 1024 * 1024), "2048GB");
    }

    #[test]
    fn test_format_views_suffixes() {
        assert_eq!(format_views("1.5k"), "1,500");
        assert_eq!(format_views("12K"), "12,000");
        assert_eq!(format_views("2M"), "2,000,000");
        assert_eq!(format_views("0.5m"), "500,000");
    }

    #[test]
    fn test_format_views_plain_and_garbage() {
        assert_eq!(format_views("1234567"), "1,234,567");
        assert_eq!(format_views(" 999 "), "999");
        assert_eq!(format_views("12.9"), "12");
        assert_eq!(format_views(""), "0");
        assert_eq!(format_views("lots"), "0");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(100), "100");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(-1500), "-1,500");
    }
}
