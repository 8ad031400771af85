//! Rename detection over a scanned collection.
//!
//! A deletion and a creation with sufficiently similar content collapse
//! into a single `Renamed` entry, so a push can move the remote item
//! instead of deleting and recreating it (which would change its id).

use std::collections::HashSet;

use super::{ItemStatus, ItemStatusManager, Status};

/// Minimum content similarity for a (deletion, creation) pair to count as a
/// rename. The length-delta short-circuit reuses the same value.
pub const RENAME_DETECTION_THRESHOLD: f64 = 0.5;

/// Similarity of two contents in `[0, 1]`.
///
/// Byte-equal contents score 1 without the edit-distance pass. Otherwise
/// `1 - levenshtein / max(len)`, or `None` when the length delta alone
/// already exceeds the threshold.
fn similarity(a: &str, b: &str, threshold: f64) -> Option<f64> {
    let (la, lb) = (a.chars().count(), b.chars().count());
    let max = la.max(lb);
    if max == 0 {
        // Two empty files are identical
        return Some(1.0);
    }
    if (la.abs_diff(lb) as f64) / (max as f64) > threshold {
        return None;
    }
    if a == b {
        return Some(1.0);
    }
    let dist = strsim::levenshtein(a, b);
    Some(1.0 - (dist as f64) / (max as f64))
}

impl ItemStatusManager {
    /// Pair deletions with creations whose content similarity exceeds
    /// `threshold`, replacing each pair with a `Renamed` entry.
    ///
    /// Directories never participate. When several files share identical
    /// content, the ambiguity guard leaves the entries untouched rather
    /// than guess which creation continues which deletion. Idempotent:
    /// committed renames leave no deletions or creations to re-pair.
    pub fn consolidate_renames(&mut self, threshold: f64) {
        let mut deletions: Vec<ItemStatus> = self
            .deleted()
            .filter(|e| !e.is_directory())
            .cloned()
            .collect();
        let mut creations: Vec<ItemStatus> = self
            .created()
            .filter(|e| !e.is_directory())
            .cloned()
            .collect();
        deletions.sort_by(|a, b| b.mtime.cmp(&a.mtime));
        creations.sort_by(|a, b| b.mtime.cmp(&a.mtime));

        let mut claimed: HashSet<String> = HashSet::new();
        let mut renames: Vec<ItemStatus> = Vec::new();

        for del in &deletions {
            let del_content = del.content.as_deref().unwrap_or("");

            let mut best: Option<(&ItemStatus, f64)> = None;
            for cre in &creations {
                if claimed.contains(&cre.path) || cre.path == del.path {
                    continue;
                }
                let cre_content = cre.content.as_deref().unwrap_or("");
                let Some(score) = similarity(del_content, cre_content, threshold) else {
                    continue;
                };
                if score >= 1.0 {
                    best = Some((cre, 1.0));
                    break;
                }
                if score > threshold && best.is_none_or(|(_, s)| score > s) {
                    best = Some((cre, score));
                }
            }

            let Some((cre, score)) = best else { continue };

            // Ambiguity guard: when another deletion shares this deletion's
            // content, or another creation shares the candidate's content,
            // with an mtime at least as new, the pairing is guesswork.
            let duplicate_deletion = deletions.iter().any(|other| {
                other.path != del.path && other.content == del.content && other.mtime >= del.mtime
            });
            let duplicate_creation = creations.iter().any(|other| {
                other.path != cre.path
                    && !claimed.contains(&other.path)
                    && other.content == cre.content
                    && other.mtime >= del.mtime
            });
            if duplicate_deletion || duplicate_creation {
                continue;
            }

            claimed.insert(cre.path.clone());
            renames.push(ItemStatus {
                path: cre.path.clone(),
                kind: del.kind,
                mtime: cre.mtime,
                content: cre.content.clone(),
                warnings: cre.warnings.clone(),
                status: Status::Renamed {
                    old_path: del.path.clone(),
                    similarity: score,
                },
            });
        }

        for rename in renames {
            self.insert(rename);
        }
    }
}
