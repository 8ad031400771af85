//! The `status` operation.

use std::path::Path;

use crate::api::Remote;
use crate::error::VtError;
use crate::ignore_rules::IgnoreRules;
use crate::meta::VtState;
use crate::scan::{ScanParams, scan};
use crate::status::ItemStatusManager;

/// Compute the working tree's status against the remote at the pinned
/// base version.
pub fn status(
    remote: &dyn Remote,
    root: &Path,
    state: &VtState,
    rules: &IgnoreRules,
    rename_threshold: f64,
) -> Result<ItemStatusManager, VtError> {
    scan(
        remote,
        root,
        &ScanParams {
            val_id: &state.val_id,
            branch_id: &state.current_branch_id,
            version: state.base_version,
            rules,
            rename_threshold,
        },
    )
}
