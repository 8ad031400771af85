//! Canonical path handling.
//!
//! The remote store addresses items by POSIX-style relative paths. This
//! module converts whatever the local platform hands us into that canonical
//! form, and formats absolute paths for display.

use std::path::{Path, PathBuf};

use path_slash::PathExt;

/// Convert a relative path string to canonical POSIX form.
///
/// - Backslashes become `/`.
/// - Windows drive-absolute prefixes (`X:\...` or `X:/...`) are rewritten to
///   `/...`, dropping the drive letter.
/// - UNC doubled-slash prefixes are preserved.
/// - `.` and `..` segments are left intact.
///
/// # Examples
/// - `dir\b` → `dir/b`
/// - `C:\Users\x` → `/Users/x`
/// - `\\server\share` → `//server/share`
pub fn to_posix(path: &str) -> String {
    let unc = path.starts_with("\\\\") || path.starts_with("//");
    let mut out = path.replace('\\', "/");

    if !unc {
        let bytes = out.as_bytes();
        if bytes.len() >= 3
            && bytes[0].is_ascii_alphabetic()
            && bytes[1] == b':'
            && bytes[2] == b'/'
        {
            out = out[2..].to_string();
        }
    }

    out
}

/// Compute the canonical POSIX relative path of `path` under `root`.
///
/// Returns `None` when `path` is not under `root`.
pub fn relative_posix(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(to_posix(&rel.to_slash_lossy()))
}

/// Basename (final segment) of a canonical POSIX path.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parent of a canonical POSIX path, or `None` for root-level paths.
pub fn parent(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(dir, _)| dir)
}

/// Number of segments in a canonical POSIX path.
pub fn depth(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}

/// Get the user's home directory.
pub fn home_dir() -> Option<PathBuf> {
    home::home_dir()
}

/// Format a filesystem path for user-facing output.
///
/// Replaces the home directory prefix with `~`. Paths outside home are
/// returned unchanged.
pub fn format_path_for_display(path: &Path) -> String {
    if let Some(home) = home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        if stripped.as_os_str().is_empty() {
            return "~".to_string();
        }

        let mut display_path = PathBuf::from("~");
        display_path.push(stripped);
        return display_path.display().to_string();
    }

    path.display().to_string()
}
