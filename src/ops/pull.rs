//! The `pull` operation.

use std::collections::HashSet;
use std::path::Path;

use crate::api::Remote;
use crate::error::VtError;
use crate::ignore_rules::IgnoreRules;
use crate::meta::{Meta, VtState};
use crate::scan::{ScanParams, scan};
use crate::staging::do_atomically;
use crate::status::ItemStatusManager;

use super::{materialize, remove_vanished};

/// What a pull did (or, on dry run, would do).
#[derive(Debug)]
pub struct PullOutcome {
    /// The local tree diffed against the destination version
    pub manager: ItemStatusManager,
    pub from_version: u64,
    pub to_version: u64,
}

/// Advance the working tree to the branch's latest version.
///
/// Refuses a dirty tree unless `force`. Tracked files are overwritten from
/// the fresh snapshot, files whose remote path disappeared since the old
/// base are deleted, untracked files are preserved (staging copies into
/// the target rather than replacing it).
pub fn pull(
    remote: &dyn Remote,
    root: &Path,
    state: &mut VtState,
    rules: &IgnoreRules,
    rename_threshold: f64,
    force: bool,
    dry_run: bool,
) -> Result<PullOutcome, VtError> {
    let current = scan(
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
    if current.is_dirty() && !force {
        return Err(VtError::DirtyWorkingTree);
    }

    let latest = remote.latest_version(&state.val_id, &state.current_branch_id)?;

    // The change set: local tree against the destination version
    let manager = scan(
        remote,
        root,
        &ScanParams {
            val_id: &state.val_id,
            branch_id: &state.current_branch_id,
            version: latest,
            rules,
            rename_threshold,
        },
    )?;

    let outcome = PullOutcome {
        manager,
        from_version: state.base_version,
        to_version: latest,
    };
    if dry_run {
        return Ok(outcome);
    }

    let old_items = remote.list_items(&state.val_id, &state.current_branch_id, state.base_version)?;
    let new_paths: HashSet<String> = remote
        .list_items(&state.val_id, &state.current_branch_id, latest)?
        .into_iter()
        .map(|i| i.path)
        .collect();

    do_atomically("pull", root, |tmp| {
        materialize(remote, tmp, &state.val_id, &state.current_branch_id, latest)
    })?;

    remove_vanished(root, &old_items, &new_paths)?;

    state.base_version = latest;
    Meta::at(root).save(state)?;

    Ok(outcome)
}
