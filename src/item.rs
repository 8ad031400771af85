//! Item types, warnings, and type inference.
//!
//! Every node in a val's tree is an item: a code file (script, http,
//! interval, or email), a plain file, or a directory. The type decides how
//! the platform executes the item, so the engine preserves remote types
//! where it can and falls back to filename heuristics for new files.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::api::Remote;
use crate::error::VtError;
use crate::path::basename;

/// Extensions the platform treats as code items.
pub const CODE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx"];

/// Maximum content length (in characters) the platform accepts for one file.
pub const MAX_FILE_CHARS: usize = 80_000;

/// Maximum basename length the platform accepts.
pub const MAX_FILENAME_LENGTH: usize = 100;

/// How many versions back a recreated path keeps its prior remote type.
pub const TYPE_LOOKBACK_VERSIONS: u64 = 5;

/// Platform name rule: no control characters, no path separators.
static VALID_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\x00-\x1f/\\]+$").expect("static regex compiles"));

/// The kind of an item in a val's tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Script,
    Http,
    Interval,
    Email,
    File,
    Directory,
}

impl ItemType {
    /// True for the four executable code kinds.
    pub fn is_code(self) -> bool {
        matches!(
            self,
            ItemType::Script | ItemType::Http | ItemType::Interval | ItemType::Email
        )
    }

    /// Sort priority used by status listings: executable kinds first,
    /// directories last.
    pub fn priority(self) -> u8 {
        match self {
            ItemType::Http => 0,
            ItemType::Interval => 1,
            ItemType::Email => 2,
            ItemType::Script => 3,
            ItemType::File => 4,
            ItemType::Directory => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Script => "script",
            ItemType::Http => "http",
            ItemType::Interval => "interval",
            ItemType::Email => "email",
            ItemType::File => "file",
            ItemType::Directory => "directory",
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-item condition the scanner attaches to status entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemWarning {
    /// Content contains NUL bytes
    Binary,
    /// Basename exceeds the maximum length or violates the platform name rule
    BadName,
    /// Zero-byte file
    Empty,
    /// Content exceeds `MAX_FILE_CHARS`
    TooLarge,
    /// Error raised while pushing this item
    Unknown(String),
}

impl ItemWarning {
    /// Whether this warning filters the item out before upload.
    ///
    /// `Unknown` records a push failure after the fact and never blocks.
    pub fn blocks_upload(&self) -> bool {
        !matches!(self, ItemWarning::Unknown(_))
    }
}

impl std::fmt::Display for ItemWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemWarning::Binary => f.write_str("binary"),
            ItemWarning::BadName => f.write_str("bad_name"),
            ItemWarning::Empty => f.write_str("empty"),
            ItemWarning::TooLarge => f.write_str("too_large"),
            ItemWarning::Unknown(msg) => write!(f, "unknown: {msg}"),
        }
    }
}

/// Validate a basename against the platform's rules.
pub fn validate_basename(name: &str) -> Option<ItemWarning> {
    if name.len() > MAX_FILENAME_LENGTH || !VALID_NAME.is_match(name) {
        Some(ItemWarning::BadName)
    } else {
        None
    }
}

/// Compute the scanner warnings for a local file's content.
pub fn content_warnings(rel_path: &str, content: &[u8]) -> Vec<ItemWarning> {
    let mut warnings = Vec::new();
    if content.contains(&0) {
        warnings.push(ItemWarning::Binary);
    }
    if let Some(w) = validate_basename(basename(rel_path)) {
        warnings.push(w);
    }
    if content.is_empty() {
        warnings.push(ItemWarning::Empty);
    } else if content.len() > MAX_FILE_CHARS {
        warnings.push(ItemWarning::TooLarge);
    }
    warnings
}

/// Classify a path by extension and basename heuristics alone.
///
/// Code extensions get one of the executable kinds: exactly one of the
/// substrings "http", "cron"/"interval", "email" in the basename selects
/// that kind; multiple or none selects `script`. Everything else is `file`.
pub fn guess_type_from_name(rel_path: &str) -> ItemType {
    let name = basename(rel_path);
    let ext = name.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
    if !CODE_EXTENSIONS.contains(&ext) {
        return ItemType::File;
    }

    let lower = name.to_lowercase();
    let mut hits = Vec::new();
    if lower.contains("http") {
        hits.push(ItemType::Http);
    }
    if lower.contains("cron") || lower.contains("interval") {
        hits.push(ItemType::Interval);
    }
    if lower.contains("email") {
        hits.push(ItemType::Email);
    }

    match hits.as_slice() {
        [one] => *one,
        _ => ItemType::Script,
    }
}

/// Infer the type of a path about to be created.
///
/// If the path existed remotely in any of the last
/// [`TYPE_LOOKBACK_VERSIONS`] versions, that recorded type wins, so a
/// delete-then-recreate keeps its semantics. Otherwise the filename
/// heuristics decide.
pub fn infer_item_type(
    remote: &dyn Remote,
    val_id: &str,
    branch_id: &str,
    version: u64,
    rel_path: &str,
) -> Result<ItemType, VtError> {
    let floor = version.saturating_sub(TYPE_LOOKBACK_VERSIONS.saturating_sub(1));
    for v in (floor..=version).rev() {
        let items = match remote.list_items(val_id, branch_id, v) {
            Ok(items) => items,
            // A version may predate the branch; keep looking further back
            Err(VtError::NotFound { .. }) => continue,
            Err(e) => return Err(e),
        };
        if let Some(item) = items.iter().find(|i| i.path == rel_path) {
            return Ok(item.kind);
        }
    }
    Ok(guess_type_from_name(rel_path))
}
