//! The `checkout` operation: switch to an existing branch or fork a new
//! one.

use std::collections::HashSet;
use std::path::Path;

use crate::api::{Remote, branch_by_name};
use crate::error::VtError;
use crate::ignore_rules::IgnoreRules;
use crate::meta::{Meta, VtState};
use crate::scan::{ScanParams, scan};
use crate::staging::do_atomically;

use super::{materialize, remove_vanished};

/// Which branch to end up on.
#[derive(Debug, Clone, Copy)]
pub enum CheckoutTarget<'a> {
    /// Switch to an existing branch by name
    Existing(&'a str),
    /// Fork a new branch off the current one
    NewBranch(&'a str),
}

/// What a checkout did.
#[derive(Debug)]
pub struct CheckoutOutcome {
    pub from_branch: String,
    pub to_branch: String,
    pub created_new: bool,
    /// Number of tracked paths that differ between the two branches
    pub changes: usize,
}

/// Move the working tree onto another branch.
///
/// Refuses a dirty tree unless `force`. The destination snapshot is staged
/// and copied over the tree; tracked files absent on the destination
/// branch are removed, untracked files are carried over because staging
/// copies into the target rather than replacing it.
pub fn checkout(
    remote: &dyn Remote,
    root: &Path,
    state: &mut VtState,
    rules: &IgnoreRules,
    rename_threshold: f64,
    target: CheckoutTarget,
    force: bool,
    dry_run: bool,
) -> Result<CheckoutOutcome, VtError> {
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

    let branches = remote.list_branches(&state.val_id)?;
    let from_branch = branches
        .iter()
        .find(|b| b.id == state.current_branch_id)
        .map(|b| b.name.clone())
        .unwrap_or_else(|| state.current_branch_id.clone());

    let old_items =
        remote.list_items(&state.val_id, &state.current_branch_id, state.base_version)?;

    let (branch, created_new) = match target {
        CheckoutTarget::Existing(name) => (branch_by_name(remote, &state.val_id, name)?, false),
        CheckoutTarget::NewBranch(name) => {
            if branches.iter().any(|b| b.name == name) {
                return Err(VtError::already_exists(format!("Branch '{name}'")));
            }
            if dry_run {
                // A dry run must not create the branch remotely
                return Ok(CheckoutOutcome {
                    from_branch,
                    to_branch: name.to_string(),
                    created_new: true,
                    changes: 0,
                });
            }
            (
                remote.create_branch(&state.val_id, &state.current_branch_id, name)?,
                true,
            )
        }
    };

    let latest = remote.latest_version(&state.val_id, &branch.id)?;
    let new_items = remote.list_items(&state.val_id, &branch.id, latest)?;
    let new_paths: HashSet<String> = new_items.iter().map(|i| i.path.clone()).collect();

    let changes = if created_new {
        // A fork starts from the current branch; nothing differs yet
        0
    } else {
        let old_paths: HashSet<String> = old_items.iter().map(|i| i.path.clone()).collect();
        old_paths.difference(&new_paths).count() + new_paths.difference(&old_paths).count()
    };

    let outcome = CheckoutOutcome {
        from_branch,
        to_branch: branch.name.clone(),
        created_new,
        changes,
    };
    if dry_run {
        return Ok(outcome);
    }

    do_atomically("checkout", root, |tmp| {
        materialize(remote, tmp, &state.val_id, &branch.id, latest)
    })?;

    remove_vanished(root, &old_items, &new_paths)?;

    state.current_branch_id = branch.id;
    state.base_version = latest;
    Meta::at(root).save(state)?;

    Ok(outcome)
}
