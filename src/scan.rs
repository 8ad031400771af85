//! The scanner: classifies every path against the remote listing.
//!
//! Walks the local tree and the remote listing at the base version in
//! parallel, producing an [`ItemStatusManager`] describing creations,
//! deletions, modifications, unchanged entries, and warnings. Content
//! reads are deferred until a classification actually needs them.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::{Item, Remote};
use crate::error::VtError;
use crate::ignore_rules::IgnoreRules;
use crate::item::{self, ItemType};
use crate::path::relative_posix;
use crate::status::{ItemStatus, ItemStatusManager, ModifiedOn, Status};
use crate::utils;

/// What to scan against.
pub struct ScanParams<'a> {
    pub val_id: &'a str,
    pub branch_id: &'a str,
    /// Base version the status is computed against
    pub version: u64,
    pub rules: &'a IgnoreRules,
    /// Similarity threshold handed to rename consolidation
    pub rename_threshold: f64,
}

#[derive(Debug)]
struct LocalEntry {
    rel: String,
    abs: PathBuf,
    is_dir: bool,
    mtime: i64,
}

/// Compute the status of `root` against the remote at the base version.
pub fn scan(
    remote: &dyn Remote,
    root: &Path,
    params: &ScanParams,
) -> Result<ItemStatusManager, VtError> {
    let mut manager = ItemStatusManager::new();

    let locals = walk_local(root, params.rules)?;
    let remote_items: HashMap<String, Item> = remote
        .list_items(params.val_id, params.branch_id, params.version)?
        .into_iter()
        .filter(|i| !params.rules.should_ignore(&i.path, i.kind == ItemType::Directory))
        .map(|i| (i.path.clone(), i))
        .collect();

    for local in &locals {
        match remote_items.get(&local.rel) {
            None => manager.insert(classify_created(remote, local, params)?),

            Some(remote_item) if local.is_dir && remote_item.kind == ItemType::Directory => {
                manager.insert(ItemStatus {
                    path: local.rel.clone(),
                    kind: ItemType::Directory,
                    mtime: local.mtime,
                    content: None,
                    warnings: Vec::new(),
                    status: Status::NotModified,
                });
            }

            Some(remote_item) if local.is_dir != (remote_item.kind == ItemType::Directory) => {
                // A file shadowing a remote directory (or the reverse)
                // reads as a local modification of the path.
                let (content, warnings) = if local.is_dir {
                    (None, Vec::new())
                } else {
                    let bytes = fs::read(&local.abs)?;
                    let warnings = item::content_warnings(&local.rel, &bytes);
                    (Some(String::from_utf8_lossy(&bytes).into_owned()), warnings)
                };
                manager.insert(ItemStatus {
                    path: local.rel.clone(),
                    kind: if local.is_dir {
                        ItemType::Directory
                    } else {
                        remote_item.kind
                    },
                    mtime: local.mtime,
                    content,
                    warnings,
                    status: Status::Modified {
                        on: ModifiedOn::Local,
                    },
                });
            }

            Some(remote_item) => {
                manager.insert(classify_both_files(remote, local, remote_item, params)?)
            }
        }
    }

    for (path, item) in &remote_items {
        if locals.iter().any(|l| &l.rel == path) {
            continue;
        }
        let content = if item.kind == ItemType::Directory {
            None
        } else {
            let bytes =
                remote.fetch_content(params.val_id, path, params.branch_id, params.version)?;
            Some(String::from_utf8_lossy(&bytes).into_owned())
        };
        manager.insert(ItemStatus {
            path: path.clone(),
            kind: item.kind,
            mtime: item.mtime_ms(),
            content,
            warnings: Vec::new(),
            status: Status::Deleted,
        });
    }

    manager.consolidate_renames(params.rename_threshold);
    Ok(manager)
}

/// Classify a local path with no remote counterpart at the base version.
fn classify_created(
    remote: &dyn Remote,
    local: &LocalEntry,
    params: &ScanParams,
) -> Result<ItemStatus, VtError> {
    if local.is_dir {
        return Ok(ItemStatus {
            path: local.rel.clone(),
            kind: ItemType::Directory,
            mtime: local.mtime,
            content: None,
            warnings: Vec::new(),
            status: Status::Created,
        });
    }

    let bytes = fs::read(&local.abs)?;
    let kind = item::infer_item_type(
        remote,
        params.val_id,
        params.branch_id,
        params.version,
        &local.rel,
    )?;
    Ok(ItemStatus {
        path: local.rel.clone(),
        kind,
        mtime: local.mtime,
        content: Some(String::from_utf8_lossy(&bytes).into_owned()),
        warnings: item::content_warnings(&local.rel, &bytes),
        status: Status::Created,
    })
}

/// Classify a path present as a file on both sides.
fn classify_both_files(
    remote: &dyn Remote,
    local: &LocalEntry,
    remote_item: &Item,
    params: &ScanParams,
) -> Result<ItemStatus, VtError> {
    let remote_mtime = remote_item.mtime_ms();

    // Fast path: an mtime at or before the remote's means untouched
    if local.mtime <= remote_mtime {
        return Ok(ItemStatus {
            path: local.rel.clone(),
            kind: remote_item.kind,
            mtime: local.mtime,
            content: None,
            warnings: Vec::new(),
            status: Status::NotModified,
        });
    }

    let bytes = fs::read(&local.abs)?;
    let remote_bytes =
        remote.fetch_content(params.val_id, &local.rel, params.branch_id, params.version)?;

    let status = if bytes == remote_bytes {
        Status::NotModified
    } else {
        Status::Modified {
            on: ModifiedOn::Local,
        }
    };
    let warnings = match status {
        Status::Modified { .. } => item::content_warnings(&local.rel, &bytes),
        _ => Vec::new(),
    };

    Ok(ItemStatus {
        path: local.rel.clone(),
        kind: remote_item.kind,
        mtime: local.mtime,
        content: Some(String::from_utf8_lossy(&bytes).into_owned()),
        warnings,
        status,
    })
}

/// Recursively list the local tree, pruning ignored entries.
fn walk_local(root: &Path, rules: &IgnoreRules) -> Result<Vec<LocalEntry>, VtError> {
    let mut out = Vec::new();
    walk_into(root, root, rules, &mut out)?;
    Ok(out)
}

fn walk_into(
    root: &Path,
    dir: &Path,
    rules: &IgnoreRules,
    out: &mut Vec<LocalEntry>,
) -> Result<(), VtError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let abs = entry.path();
        let meta = entry.metadata()?;
        let is_dir = meta.is_dir();
        let Some(rel) = relative_posix(root, &abs) else {
            continue;
        };
        if rules.should_ignore(&rel, is_dir) {
            continue;
        }
        out.push(LocalEntry {
            rel,
            abs: abs.clone(),
            is_dir,
            mtime: utils::mtime_ms(&meta),
        });
        if is_dir {
            walk_into(root, &abs, rules, out)?;
        }
    }
    Ok(())
}
