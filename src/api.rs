//! Typed façade over the Val Town HTTP API.
//!
//! Operations receive the façade by injection (as `&dyn Remote`) so tests
//! can substitute an in-memory fake. The HTTP implementation lives in
//! [`http::Api`].
//!
//! Each method is a contract, not a wire format: pagination is drained
//! internally, and HTTP statuses are normalized into the structured
//! [`VtError`](crate::error::VtError) taxonomy (404 → `NotFound`,
//! 409 → `AlreadyExists`, other non-2xx → `Transport`).

pub mod http;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VtError;
use crate::item::ItemType;

/// One node in a val's tree at a specific version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    /// Canonical POSIX-style path within the val
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemType,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Milliseconds since epoch of the remote update time.
    pub fn mtime_ms(&self) -> i64 {
        self.updated_at.timestamp_millis()
    }
}

/// A named linear history within a val.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: String,
    pub name: String,
    /// Monotonic integer version
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Who can see a val.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Public,
    Unlisted,
    Private,
}

/// A remote unit of ownership containing files and branches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Val {
    pub id: String,
    pub name: String,
    pub owner_username: String,
    pub privacy: Privacy,
    #[serde(default)]
    pub description: Option<String>,
}

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
}

/// Payload for creating an item.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub path: String,
    pub kind: ItemType,
    /// Absent for directories
    pub content: Option<String>,
    pub branch_id: String,
}

/// Payload for updating an item in place or moving it.
///
/// `new_parent_id` is tri-state: `None` leaves the parent unchanged,
/// `Some(None)` moves the item to the val root, `Some(Some(id))` moves it
/// under the given directory.
#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    pub path: String,
    pub branch_id: String,
    pub content: Option<String>,
    pub new_name: Option<String>,
    pub new_parent_id: Option<Option<String>>,
}

/// Payload for creating a val.
#[derive(Debug, Clone)]
pub struct NewVal {
    pub name: String,
    pub privacy: Privacy,
    pub description: Option<String>,
    pub org_id: Option<String>,
}

/// The remote store's surface, injectable for tests.
///
/// A `(val, branch, version)` triple identifies an immutable snapshot, so
/// implementations may memoize listings per triple within a process run.
/// `Sync` because push dispatches per-item calls from rayon workers.
pub trait Remote: Sync {
    /// Full recursive listing of a branch at a version.
    fn list_items(&self, val_id: &str, branch_id: &str, version: u64)
    -> Result<Vec<Item>, VtError>;

    /// Raw content of one file at a version.
    fn fetch_content(
        &self,
        val_id: &str,
        path: &str,
        branch_id: &str,
        version: u64,
    ) -> Result<Vec<u8>, VtError>;

    fn create_item(&self, val_id: &str, new: &NewItem) -> Result<Item, VtError>;

    fn update_item(&self, val_id: &str, update: &ItemUpdate) -> Result<Item, VtError>;

    fn delete_item(
        &self,
        val_id: &str,
        path: &str,
        branch_id: &str,
        recursive: bool,
    ) -> Result<(), VtError>;

    fn list_branches(&self, val_id: &str) -> Result<Vec<Branch>, VtError>;

    fn create_branch(
        &self,
        val_id: &str,
        from_branch_id: &str,
        name: &str,
    ) -> Result<Branch, VtError>;

    /// Latest version of a branch.
    fn latest_version(&self, val_id: &str, branch_id: &str) -> Result<u64, VtError>;

    fn create_val(&self, new: &NewVal) -> Result<Val, VtError>;

    fn delete_val(&self, val_id: &str) -> Result<(), VtError>;

    fn get_val(&self, val_id: &str) -> Result<Val, VtError>;

    /// Look a val up by `owner/name`.
    fn resolve_val(&self, owner: &str, name: &str) -> Result<Val, VtError>;

    fn current_user(&self) -> Result<User, VtError>;
}

/// The default branch every val starts with.
pub const DEFAULT_BRANCH_NAME: &str = "main";

/// Find a branch by name in a val.
pub fn branch_by_name(remote: &dyn Remote, val_id: &str, name: &str) -> Result<Branch, VtError> {
    remote
        .list_branches(val_id)?
        .into_iter()
        .find(|b| b.name == name)
        .ok_or_else(|| VtError::not_found(format!("Branch '{name}'")))
}
