//! Human-readable byte sizes for config values (e.g., "2GB", "500MB").

use thiserror::Error;

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size '{input}' - expected format like '2GB', '500MB', or '1024KB'")]
pub struct SizeParseError {
    input: String,
}

impl SizeParseError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Recognized suffixes, longest first so "GB" wins over "G" alone.
const UNITS: &[(&str, usize)] = &[
    ("GB", 1024 * 1024 * 1024),
    ("G", 1024 * 1024 * 1024),
    ("MB", 1024 * 1024),
    ("M", 1024 * 1024),
    ("KB", 1024),
    ("K", 1024),
];

/// Parse a human-readable size string into bytes.
///
/// Supports:
/// - Bare numbers (treated as bytes)
/// - KB/K suffix (1024 bytes)
/// - MB/M suffix (1024² bytes)
/// - GB/G suffix (1024³ bytes)
/// - Case-insensitive
/// - Whitespace tolerant
///
/// # Examples
///
/// ```
/// use globestream::config::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1024);
/// assert_eq!(parse_size("1 KB").unwrap(), 1024);
/// assert_eq!(parse_size("2GB").unwrap(), 2 * 1024 * 1024 * 1024);
/// assert_eq!(parse_size("500mb").unwrap(), 500 * 1024 * 1024);
/// ```
pub fn parse_size(s: &str) -> Result<usize, SizeParseError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(SizeParseError::new(s));
    }

    // Digits are unchanged by uppercasing, so both the suffix match and
    // the numeric parse can work on the uppercased copy.
    let upper = trimmed.to_uppercase();
    let (digits, multiplier) = UNITS
        .iter()
        .find_map(|(suffix, multiplier)| {
            upper
                .strip_suffix(suffix)
                .map(|digits| (digits.to_string(), *multiplier))
        })
        .unwrap_or_else(|| (upper.clone(), 1));

    let value: usize = digits
        .trim()
        .parse()
        .map_err(|_| SizeParseError::new(s))?;

    value
        .checked_mul(multiplier)
        .ok_or_else(|| SizeParseError::new(s))
}

/// Format a byte count as a human-readable string.
///
/// Falls back to bare bytes when the count is not a whole number of
/// KB/MB/GB.
///
/// # Examples
///
/// ```
/// use globestream::config::format_size;
///
/// assert_eq!(format_size(1024), "1KB");
/// assert_eq!(format_size(2 * 1024 * 1024 * 1024), "2GB");
/// assert_eq!(format_size(500 * 1024 * 1024), "500MB");
/// ```
pub fn format_size(bytes: usize) -> String {
    const GB: usize = 1024 * 1024 * 1024;
    const MB: usize = 1024 * 1024;
    const KB: usize = 1024;

    if bytes >= GB && bytes % GB == 0 {
        format!("{}GB", bytes / GB)
    } else if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes >= KB && bytes % KB == 0 {
        format!("{}KB", bytes / KB)
    } else {
        format!("{}", bytes)
    }
}
