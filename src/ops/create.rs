//! The `create` operation: start a fresh val from a local directory.

use std::fs;
use std::path::Path;

use crate::api::{DEFAULT_BRANCH_NAME, NewVal, Remote, Val, branch_by_name};
use crate::error::VtError;
use crate::ignore_rules::IgnoreRules;
use crate::meta::{Meta, VtState};
use crate::status::ItemStatusManager;

use super::push::push;

/// Starter ignore file written by `create`.
const VTIGNORE_TEMPLATE: &str = "# Files vt should not sync\n.env\n";

/// Starter deno.json pointing editors at the platform's module host.
const DENO_JSON_TEMPLATE: &str = "{\n    \"imports\": {\n        \"vt/\": \"https://esm.town/v/\"\n    }\n}\n";

/// What a create produced.
#[derive(Debug)]
pub struct CreateOutcome {
    pub val: Val,
    pub state: VtState,
    /// Present when existing files were uploaded
    pub uploaded: Option<ItemStatusManager>,
}

/// Create a new val and pin `root` to it.
///
/// A non-empty target is refused unless the caller opted into uploading
/// the existing files. `editor_files` materializes starter files for
/// local editing; existing files are never overwritten.
pub fn create(
    remote: &dyn Remote,
    root: &Path,
    new_val: &NewVal,
    upload_existing: bool,
    editor_files: bool,
    rules: &IgnoreRules,
    rename_threshold: f64,
    dry_run: bool,
) -> Result<CreateOutcome, VtError> {
    let has_entries = root.is_dir() && fs::read_dir(root)?.next().is_some();
    if has_entries && !upload_existing {
        return Err(VtError::DirectoryNotEmpty {
            path: root.to_path_buf(),
        });
    }

    if dry_run {
        return Ok(CreateOutcome {
            val: Val {
                id: String::new(),
                name: new_val.name.clone(),
                owner_username: String::new(),
                privacy: new_val.privacy,
                description: new_val.description.clone(),
            },
            state: VtState {
                val_id: String::new(),
                owner_username: String::new(),
                val_name: new_val.name.clone(),
                current_branch_id: String::new(),
                base_version: 0,
            },
            uploaded: None,
        });
    }

    let val = remote.create_val(new_val)?;
    let main = branch_by_name(remote, &val.id, DEFAULT_BRANCH_NAME)?;
    let version = remote.latest_version(&val.id, &main.id)?;

    let mut state = VtState {
        val_id: val.id.clone(),
        owner_username: val.owner_username.clone(),
        val_name: val.name.clone(),
        current_branch_id: main.id.clone(),
        base_version: version,
    };
    Meta::at(root).init(&state)?;

    if editor_files {
        write_if_absent(&root.join(".vtignore"), VTIGNORE_TEMPLATE)?;
        write_if_absent(&root.join("deno.json"), DENO_JSON_TEMPLATE)?;
    }

    let uploaded = if upload_existing && has_entries {
        Some(push(remote, root, &mut state, rules, rename_threshold, false)?)
    } else {
        None
    };

    Ok(CreateOutcome {
        val,
        state,
        uploaded,
    })
}

fn write_if_absent(path: &Path, content: &str) -> Result<(), VtError> {
    if !path.exists() {
        fs::write(path, content)?;
    }
    Ok(())
}
