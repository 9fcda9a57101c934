//! Utility functions for ferry-core

/// Format a byte count as a human-readable IEC string
///
/// # Arguments
/// * `bytes` - The byte count to format
///
/// # Returns
/// Exact bytes below one KiB, one decimal place above it
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
