//! The typed file-state model.
//!
//! An [`ItemStatus`] describes one path's relationship between the local
//! tree and the remote listing at the base version. The
//! [`ItemStatusManager`] is the collection the scanner produces and the
//! operations consume. Pure data; no I/O happens here.

mod rename;

use indexmap::IndexMap;

use crate::item::{ItemType, ItemWarning};
use crate::path::{basename, depth};

pub use rename::RENAME_DETECTION_THRESHOLD;

/// Which side changed a `modified` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifiedOn {
    Local,
    Remote,
}

/// The tagged state of one path.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    /// Present locally, absent remotely at the base version
    Created,
    /// Absent locally, present remotely at the base version
    Deleted,
    /// Present on both sides with differing content
    Modified { on: ModifiedOn },
    /// Present on both sides with equal content
    NotModified,
    /// Inferred pair of (deletion of `old_path`, creation of this path)
    Renamed { old_path: String, similarity: f64 },
}

impl Status {
    /// Sort priority for status listings.
    pub fn priority(&self) -> u8 {
        match self {
            Status::Renamed { .. } => 0,
            Status::Created => 1,
            Status::Deleted => 2,
            Status::Modified { .. } => 3,
            Status::NotModified => 4,
        }
    }

    /// One-letter marker used by the status listing.
    pub fn marker(&self) -> &'static str {
        match self {
            Status::Created => "A",
            Status::Deleted => "D",
            Status::Modified { .. } => "M",
            Status::NotModified => " ",
            Status::Renamed { .. } => "R",
        }
    }
}

/// One path's state, content, and warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemStatus {
    /// Canonical POSIX-style relative path
    pub path: String,
    pub kind: ItemType,
    /// Milliseconds since epoch
    pub mtime: i64,
    /// Absent for directories
    pub content: Option<String>,
    pub warnings: Vec<ItemWarning>,
    pub status: Status,
}

impl ItemStatus {
    pub fn is_directory(&self) -> bool {
        self.kind == ItemType::Directory
    }

    /// Whether any warning filters this item out before upload.
    pub fn blocks_upload(&self) -> bool {
        self.warnings.iter().any(|w| w.blocks_upload())
    }

    /// Attach a push-failure warning.
    pub fn add_unknown_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(ItemWarning::Unknown(msg.into()));
    }
}

/// The scanner's output: a collection of item statuses keyed by path.
///
/// Invariants:
/// - a path lives in at most one status bucket;
/// - inserting `Created` over an existing `Deleted` at the same path (or
///   the reverse) collapses both into `Modified { on: Local }`;
/// - inserting `Renamed` evicts any `Created`/`Deleted` at either endpoint.
#[derive(Debug, Clone, Default)]
pub struct ItemStatusManager {
    created: IndexMap<String, ItemStatus>,
    deleted: IndexMap<String, ItemStatus>,
    modified: IndexMap<String, ItemStatus>,
    not_modified: IndexMap<String, ItemStatus>,
    renamed: IndexMap<String, ItemStatus>,
}

impl ItemStatusManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, applying the collapse rules above.
    pub fn insert(&mut self, entry: ItemStatus) {
        match &entry.status {
            Status::Created => {
                if let Some(prior) = self.deleted.shift_remove(&entry.path) {
                    // Delete-then-recreate: both sides have the path, the
                    // local content differs. The remote-recorded type wins.
                    let mut merged = entry;
                    merged.kind = prior.kind;
                    merged.status = Status::Modified {
                        on: ModifiedOn::Local,
                    };
                    self.remove(&merged.path);
                    self.modified.insert(merged.path.clone(), merged);
                    return;
                }
            }
            Status::Deleted => {
                if let Some(prior) = self.created.shift_remove(&entry.path) {
                    let mut merged = prior;
                    merged.kind = entry.kind;
                    merged.status = Status::Modified {
                        on: ModifiedOn::Local,
                    };
                    self.remove(&merged.path);
                    self.modified.insert(merged.path.clone(), merged);
                    return;
                }
            }
            Status::Renamed { old_path, .. } => {
                let old_path = old_path.clone();
                self.created.shift_remove(&old_path);
                self.deleted.shift_remove(&old_path);
            }
            _ => {}
        }

        self.remove(&entry.path);
        self.bucket_mut(&entry.status).insert(entry.path.clone(), entry);
    }

    fn bucket_mut(&mut self, status: &Status) -> &mut IndexMap<String, ItemStatus> {
        match status {
            Status::Created => &mut self.created,
            Status::Deleted => &mut self.deleted,
            Status::Modified { .. } => &mut self.modified,
            Status::NotModified => &mut self.not_modified,
            Status::Renamed { .. } => &mut self.renamed,
        }
    }

    pub fn get(&self, path: &str) -> Option<&ItemStatus> {
        self.created
            .get(path)
            .or_else(|| self.deleted.get(path))
            .or_else(|| self.modified.get(path))
            .or_else(|| self.not_modified.get(path))
            .or_else(|| self.renamed.get(path))
    }

    pub fn has(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Remove a path from whichever bucket holds it.
    pub fn remove(&mut self, path: &str) -> Option<ItemStatus> {
        self.created
            .shift_remove(path)
            .or_else(|| self.deleted.shift_remove(path))
            .or_else(|| self.modified.shift_remove(path))
            .or_else(|| self.not_modified.shift_remove(path))
            .or_else(|| self.renamed.shift_remove(path))
    }

    /// Patch an existing entry in place. Returns false when the path is
    /// unknown. Changing `status` through the patch is not supported; use
    /// [`ItemStatusManager::insert`] for transitions.
    pub fn update(&mut self, path: &str, patch: impl FnOnce(&mut ItemStatus)) -> bool {
        for bucket in [
            &mut self.created,
            &mut self.deleted,
            &mut self.modified,
            &mut self.not_modified,
            &mut self.renamed,
        ] {
            if let Some(entry) = bucket.get_mut(path) {
                patch(entry);
                return true;
            }
        }
        false
    }

    /// Entries in `other` override entries with the same path here.
    ///
    /// Override means direct replacement; the created/deleted collapse does
    /// not apply across a merge.
    pub fn merge(&mut self, other: ItemStatusManager) {
        for entry in other.into_iter() {
            self.remove(&entry.path);
            self.bucket_mut(&entry.status).insert(entry.path.clone(), entry);
        }
    }

    /// A new collection holding the entries matching `pred`.
    pub fn filter(&self, pred: impl Fn(&ItemStatus) -> bool) -> Self {
        let mut out = Self::new();
        for entry in self.iter().filter(|e| pred(e)) {
            out.bucket_mut(&entry.status)
                .insert(entry.path.clone(), entry.clone());
        }
        out
    }

    /// A new collection with `f` applied to every entry.
    pub fn map(&self, f: impl Fn(&ItemStatus) -> ItemStatus) -> Self {
        let mut out = Self::new();
        for entry in self.iter() {
            let mapped = f(entry);
            out.insert(mapped);
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemStatus> {
        self.created
            .values()
            .chain(self.deleted.values())
            .chain(self.modified.values())
            .chain(self.not_modified.values())
            .chain(self.renamed.values())
    }

    pub fn into_iter(self) -> impl Iterator<Item = ItemStatus> {
        self.created
            .into_values()
            .chain(self.deleted.into_values())
            .chain(self.modified.into_values())
            .chain(self.not_modified.into_values())
            .chain(self.renamed.into_values())
    }

    /// All entries, optionally in the canonical listing order:
    /// deepest paths first, then type priority, then status priority, then
    /// basename length, then path.
    pub fn entries(&self, sorted: bool) -> Vec<&ItemStatus> {
        let mut all: Vec<&ItemStatus> = self.iter().collect();
        if sorted {
            all.sort_by(|a, b| {
                depth(&b.path)
                    .cmp(&depth(&a.path))
                    .then_with(|| a.kind.priority().cmp(&b.kind.priority()))
                    .then_with(|| a.status.priority().cmp(&b.status.priority()))
                    .then_with(|| basename(&a.path).len().cmp(&basename(&b.path).len()))
                    .then_with(|| a.path.cmp(&b.path))
            });
        }
        all
    }

    pub fn created(&self) -> impl Iterator<Item = &ItemStatus> {
        self.created.values()
    }

    pub fn deleted(&self) -> impl Iterator<Item = &ItemStatus> {
        self.deleted.values()
    }

    pub fn modified(&self) -> impl Iterator<Item = &ItemStatus> {
        self.modified.values()
    }

    pub fn not_modified(&self) -> impl Iterator<Item = &ItemStatus> {
        self.not_modified.values()
    }

    pub fn renamed(&self) -> impl Iterator<Item = &ItemStatus> {
        self.renamed.values()
    }

    /// Total number of entries across all buckets.
    pub fn size(&self) -> usize {
        self.created.len()
            + self.deleted.len()
            + self.modified.len()
            + self.not_modified.len()
            + self.renamed.len()
    }

    /// Number of entries that differ from the remote at the base version.
    pub fn changes(&self) -> usize {
        self.size() - self.not_modified.len()
    }

    /// Whether the working tree differs from the remote in any way other
    /// than `NotModified`.
    pub fn is_dirty(&self) -> bool {
        self.changes() > 0
    }
}
