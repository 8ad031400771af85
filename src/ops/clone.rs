//! The `clone` operation.

use std::path::Path;

use crate::api::{Remote, Val};
use crate::error::VtError;
use crate::meta::{Meta, VtState};
use crate::staging::do_atomically;
use crate::status::ItemStatusManager;

use super::{ensure_empty, listing_as_created, materialize};

/// What a clone produced.
#[derive(Debug)]
pub struct CloneOutcome {
    /// Every written item, all `Created`
    pub manager: ItemStatusManager,
    /// The pinned tuple the new tree starts from
    pub state: VtState,
}

/// Clone a val's branch at a version into `root`.
///
/// The target must be missing or empty. The whole tree is staged in a
/// temporary directory and copied over only once every item fetched, so a
/// failed clone leaves no partial target behind.
pub fn clone_val(
    remote: &dyn Remote,
    root: &Path,
    val: &Val,
    branch_id: &str,
    version: u64,
    dry_run: bool,
) -> Result<CloneOutcome, VtError> {
    ensure_empty(root)?;

    let state = VtState {
        val_id: val.id.clone(),
        owner_username: val.owner_username.clone(),
        val_name: val.name.clone(),
        current_branch_id: branch_id.to_string(),
        base_version: version,
    };

    if dry_run {
        let items = remote.list_items(&val.id, branch_id, version)?;
        let listed: Vec<_> = items.into_iter().map(|i| (i, None)).collect();
        return Ok(CloneOutcome {
            manager: listing_as_created(&listed),
            state,
        });
    }

    let written = do_atomically("clone", root, |tmp| {
        materialize(remote, tmp, &val.id, branch_id, version)
    })?;

    Meta::at(root).init(&state)?;

    Ok(CloneOutcome {
        manager: listing_as_created(&written),
        state,
    })
}
