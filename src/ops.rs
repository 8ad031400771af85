//! The git-like operations.
//!
//! Each operation composes the scanner, the rename detector, the remote
//! façade, and atomic staging. The façade arrives by injection
//! (`&dyn Remote`) so tests can substitute an in-memory fake.
//!
//! Every operation accepts a `dry_run` flag; a dry run computes and
//! returns the would-be result without touching the filesystem or the
//! remote.

mod checkout;
mod clone;
mod create;
mod pull;
mod push;
mod remix;
mod status;

pub use checkout::{CheckoutOutcome, CheckoutTarget, checkout};
pub use clone::{CloneOutcome, clone_val};
pub use create::{CreateOutcome, create};
pub use pull::{PullOutcome, pull};
pub use push::push;
pub use remix::{RemixOutcome, remix};
pub use status::status;

use std::fs;
use std::path::{Path, PathBuf};

use crate::api::{Item, Remote};
use crate::error::VtError;
use crate::item::ItemType;
use crate::path::depth;
use crate::status::{ItemStatus, ItemStatusManager, Status};
use crate::utils;

/// Map a canonical POSIX item path to a location under `base`.
pub(crate) fn local_path(base: &Path, item_path: &str) -> PathBuf {
    let mut out = base.to_path_buf();
    for segment in item_path.split('/').filter(|s| !s.is_empty()) {
        out.push(segment);
    }
    out
}

/// Fail unless `root` is missing or empty.
pub(crate) fn ensure_empty(root: &Path) -> Result<(), VtError> {
    if root.is_dir() && fs::read_dir(root)?.next().is_some() {
        return Err(VtError::DirectoryNotEmpty {
            path: root.to_path_buf(),
        });
    }
    Ok(())
}

/// Write a branch snapshot into `dest`: directories before leaves, file
/// content fetched through the façade, mtimes set from the remote
/// `updated_at`.
///
/// Returns each written item with its decoded content, so callers can
/// build a status collection without re-fetching.
pub(crate) fn materialize(
    remote: &dyn Remote,
    dest: &Path,
    val_id: &str,
    branch_id: &str,
    version: u64,
) -> Result<Vec<(Item, Option<String>)>, VtError> {
    let mut items = remote.list_items(val_id, branch_id, version)?;
    items.sort_by_key(|i| depth(&i.path));

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let target = local_path(dest, &item.path);
        let content = if item.kind == ItemType::Directory {
            fs::create_dir_all(&target)?;
            None
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let bytes = remote.fetch_content(val_id, &item.path, branch_id, version)?;
            fs::write(&target, &bytes)?;
            utils::set_mtime_ms(&target, item.mtime_ms())?;
            Some(String::from_utf8_lossy(&bytes).into_owned())
        };
        out.push((item, content));
    }
    Ok(out)
}

/// Build the all-`Created` collection clone-like operations report.
pub(crate) fn listing_as_created(items: &[(Item, Option<String>)]) -> ItemStatusManager {
    let mut manager = ItemStatusManager::new();
    for (item, content) in items {
        manager.insert(ItemStatus {
            path: item.path.clone(),
            kind: item.kind,
            mtime: item.mtime_ms(),
            content: content.clone(),
            warnings: Vec::new(),
            status: Status::Created,
        });
    }
    manager
}

/// Remove local files whose tracked path disappeared between two remote
/// listings. Deepest entries go first; a directory still holding untracked
/// entries survives the `remove_dir`.
pub(crate) fn remove_vanished(
    root: &Path,
    old_items: &[Item],
    new_paths: &std::collections::HashSet<String>,
) -> Result<(), VtError> {
    let mut vanished: Vec<&Item> = old_items
        .iter()
        .filter(|i| !new_paths.contains(&i.path))
        .collect();
    vanished.sort_by_key(|i| std::cmp::Reverse(depth(&i.path)));

    for item in vanished {
        let target = local_path(root, &item.path);
        if !target.exists() {
            continue;
        }
        if item.kind == ItemType::Directory {
            // Leave the directory in place when untracked entries remain
            let _ = fs::remove_dir(&target);
        } else {
            fs::remove_file(&target)?;
        }
    }
    Ok(())
}
