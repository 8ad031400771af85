//! The `push` operation.
//!
//! Deliberately non-atomic: each remote call is independently meaningful,
//! so partial progress is acceptable. A failed call attaches an
//! `unknown:` warning to its item instead of aborting the batch.

use std::collections::HashMap;
use std::path::Path;

use rayon::prelude::*;

use crate::api::{ItemUpdate, NewItem, Remote};
use crate::error::VtError;
use crate::ignore_rules::IgnoreRules;
use crate::item::ItemType;
use crate::meta::{Meta, VtState};
use crate::path::{basename, depth, parent};
use crate::scan::{ScanParams, scan};
use crate::status::{ItemStatus, ItemStatusManager, ModifiedOn, Status};

/// Upload local changes to the remote branch.
///
/// Items carrying a blocking warning (`binary`, `bad_name`, `empty`,
/// `too_large`) are reported in the returned collection but not uploaded.
/// Parent directories are created first, sequentially; renames, creations,
/// modifications, and deletions are then dispatched concurrently and
/// joined. The base version is refreshed and persisted after all calls.
pub fn push(
    remote: &dyn Remote,
    root: &Path,
    state: &mut VtState,
    rules: &IgnoreRules,
    rename_threshold: f64,
    dry_run: bool,
) -> Result<ItemStatusManager, VtError> {
    let mut manager = scan(
        remote,
        root,
        &ScanParams {
            val_id: &state.val_id,
            branch_id: &state.current_branch_id,
            version: state.base_version,
            rules,
            rename_threshold,
        },
    )?;
    if dry_run {
        return Ok(manager);
    }

    let val_id = state.val_id.clone();
    let branch_id = state.current_branch_id.clone();

    // Remote directory ids at the base version; rename calls resolve their
    // destination parent against this map.
    let mut dir_ids: HashMap<String, String> = remote
        .list_items(&val_id, &branch_id, state.base_version)?
        .into_iter()
        .filter(|i| i.kind == ItemType::Directory)
        .map(|i| (i.path, i.id))
        .collect();

    // Required parent directories exist before any leaf call runs.
    let mut new_dirs: Vec<ItemStatus> = manager
        .created()
        .filter(|e| e.is_directory() && !e.blocks_upload())
        .cloned()
        .collect();
    new_dirs.sort_by_key(|e| depth(&e.path));

    let mut failures: Vec<(String, String)> = Vec::new();
    for dir in &new_dirs {
        let new = NewItem {
            path: dir.path.clone(),
            kind: ItemType::Directory,
            content: None,
            branch_id: branch_id.clone(),
        };
        match remote.create_item(&val_id, &new) {
            Ok(item) => {
                dir_ids.insert(dir.path.clone(), item.id);
            }
            // Idempotent create: someone already made it
            Err(VtError::AlreadyExists { .. }) => {}
            Err(e) => failures.push((dir.path.clone(), e.brief())),
        }
    }

    enum Call<'a> {
        Rename(&'a ItemStatus),
        Create(&'a ItemStatus),
        Modify(&'a ItemStatus),
        Delete(&'a ItemStatus),
    }

    let mut calls: Vec<Call> = Vec::new();
    calls.extend(
        manager
            .renamed()
            .filter(|e| !e.is_directory() && !e.blocks_upload())
            .map(Call::Rename),
    );
    calls.extend(
        manager
            .created()
            .filter(|e| !e.is_directory() && !e.blocks_upload())
            .map(Call::Create),
    );
    calls.extend(
        manager
            .modified()
            .filter(|e| {
                !e.is_directory()
                    && !e.blocks_upload()
                    && e.status
                        == Status::Modified {
                            on: ModifiedOn::Local,
                        }
            })
            .map(Call::Modify),
    );
    calls.extend(manager.deleted().map(Call::Delete));

    let results: Vec<(String, Result<(), VtError>)> = calls
        .par_iter()
        .map(|call| match call {
            Call::Rename(e) => (
                e.path.clone(),
                rename_item(remote, &val_id, &branch_id, &dir_ids, e),
            ),
            Call::Create(e) => {
                let new = NewItem {
                    path: e.path.clone(),
                    kind: e.kind,
                    content: e.content.clone(),
                    branch_id: branch_id.clone(),
                };
                (e.path.clone(), remote.create_item(&val_id, &new).map(|_| ()))
            }
            Call::Modify(e) => {
                let update = ItemUpdate {
                    path: e.path.clone(),
                    branch_id: branch_id.clone(),
                    content: e.content.clone(),
                    ..Default::default()
                };
                (e.path.clone(), remote.update_item(&val_id, &update).map(|_| ()))
            }
            Call::Delete(e) => {
                let result = match remote.delete_item(&val_id, &e.path, &branch_id, true) {
                    // A second delete of the same path already succeeded
                    Err(VtError::NotFound { .. }) => Ok(()),
                    other => other,
                };
                (e.path.clone(), result)
            }
        })
        .collect();

    for (path, msg) in failures {
        manager.update(&path, |e| e.add_unknown_warning(msg));
    }
    for (path, result) in results {
        if let Err(e) = result {
            log::warn!("push of {path} failed: {}", e.brief());
            manager.update(&path, |entry| entry.add_unknown_warning(e.brief()));
        }
    }

    state.base_version = remote.latest_version(&val_id, &branch_id)?;
    Meta::at(root).save(state)?;

    Ok(manager)
}

/// Move or rename one remote item so it keeps its id.
fn rename_item(
    remote: &dyn Remote,
    val_id: &str,
    branch_id: &str,
    dir_ids: &HashMap<String, String>,
    entry: &ItemStatus,
) -> Result<(), VtError> {
    let Status::Renamed { old_path, .. } = &entry.status else {
        return Ok(());
    };

    let mut update = ItemUpdate {
        path: old_path.clone(),
        branch_id: branch_id.to_string(),
        ..Default::default()
    };

    if basename(&entry.path) != basename(old_path) {
        update.new_name = Some(basename(&entry.path).to_string());
    }
    let (old_parent, new_parent) = (parent(old_path), parent(&entry.path));
    if old_parent != new_parent {
        update.new_parent_id = Some(match new_parent {
            // Explicit null: the item moves to the val root
            None => None,
            Some(dir) => Some(dir_ids.get(dir).cloned().ok_or_else(|| {
                VtError::not_found(format!("Directory '{dir}'"))
            })?),
        });
    }

    remote.update_item(val_id, &update)?;
    Ok(())
}
