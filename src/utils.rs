//! General utilities.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get the current Unix timestamp in milliseconds.
///
/// When the `VT_TEST_EPOCH_MS` environment variable is set (by tests),
/// returns that value instead of the actual current time. This enables
/// deterministic assertions on recorded mtimes.
///
/// All code that needs timestamps for display or storage should use this
/// function rather than `SystemTime::now()` directly.
pub fn now_ms() -> i64 {
    std::env::var("VT_TEST_EPOCH_MS")
        .ok()
        .and_then(|val| val.parse::<i64>().ok())
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("system clock before Unix epoch")
                .as_millis() as i64
        })
}

/// Milliseconds since epoch of a file's mtime.
pub fn mtime_ms(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Set a file's mtime to the given milliseconds since epoch.
///
/// Directories are skipped: their timestamps carry no sync meaning, and not
/// every platform allows opening a directory for writing.
pub fn set_mtime_ms(path: &Path, ms: i64) -> std::io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    let time = UNIX_EPOCH + Duration::from_millis(ms.max(0) as u64);
    let file = fs::File::options().write(true).open(path)?;
    file.set_modified(time)
}

/// Format a millisecond timestamp as ISO 8601 (e.g. "2025-01-01T00:00:00Z").
pub fn format_ms_iso8601(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| format!("invalid-timestamp({ms})"))
}
