//! The `remix` operation: fork someone's val into a fresh one of your own.

use std::path::Path;

use crate::api::{DEFAULT_BRANCH_NAME, NewItem, NewVal, Remote, Val, branch_by_name};
use crate::error::VtError;
use crate::item::ItemType;
use crate::meta::{Meta, VtState};
use crate::path::depth;
use crate::staging::do_atomically;
use crate::status::ItemStatusManager;

use super::{ensure_empty, listing_as_created, materialize};

/// What a remix produced.
#[derive(Debug)]
pub struct RemixOutcome {
    /// The freshly created val
    pub val: Val,
    /// Every written item, all `Created`
    pub manager: ItemStatusManager,
    pub state: VtState,
}

/// Create a new val owned by the current user (optionally under an
/// organization), copy the source branch's items into it preserving their
/// types, then clone it into `root`.
///
/// A name collision surfaces as `AlreadyExists`; the caller provides a
/// pre-generated unique name. A failure after val creation leaves the
/// remote val orphaned: the staging temp dir is deleted, no rollback call
/// is issued.
pub fn remix(
    remote: &dyn Remote,
    root: &Path,
    source: &Val,
    source_branch_id: &str,
    new_val: &NewVal,
    dry_run: bool,
) -> Result<RemixOutcome, VtError> {
    ensure_empty(root)?;

    let source_version = remote.latest_version(&source.id, source_branch_id)?;
    let mut source_items = remote.list_items(&source.id, source_branch_id, source_version)?;
    source_items.sort_by_key(|i| depth(&i.path));

    if dry_run {
        let listed: Vec<_> = source_items.into_iter().map(|i| (i, None)).collect();
        return Ok(RemixOutcome {
            val: Val {
                id: String::new(),
                name: new_val.name.clone(),
                owner_username: String::new(),
                privacy: new_val.privacy,
                description: new_val.description.clone(),
            },
            manager: listing_as_created(&listed),
            state: VtState {
                val_id: String::new(),
                owner_username: String::new(),
                val_name: new_val.name.clone(),
                current_branch_id: String::new(),
                base_version: 0,
            },
        });
    }

    let val = remote.create_val(new_val)?;
    let main = branch_by_name(remote, &val.id, DEFAULT_BRANCH_NAME)?;

    // Server-side copy, directories before leaves, types preserved
    for item in &source_items {
        let content = if item.kind == ItemType::Directory {
            None
        } else {
            let bytes =
                remote.fetch_content(&source.id, &item.path, source_branch_id, source_version)?;
            Some(String::from_utf8_lossy(&bytes).into_owned())
        };
        remote.create_item(
            &val.id,
            &NewItem {
                path: item.path.clone(),
                kind: item.kind,
                content,
                branch_id: main.id.clone(),
            },
        )?;
    }

    let version = remote.latest_version(&val.id, &main.id)?;
    let written = do_atomically("remix", root, |tmp| {
        materialize(remote, tmp, &val.id, &main.id, version)
    })?;

    let state = VtState {
        val_id: val.id.clone(),
        owner_username: val.owner_username.clone(),
        val_name: val.name.clone(),
        current_branch_id: main.id.clone(),
        base_version: version,
    };
    Meta::at(root).init(&state)?;

    Ok(RemixOutcome {
        val,
        manager: listing_as_created(&written),
        state,
    })
}
