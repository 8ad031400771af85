//! Test harness: an in-memory fake of the remote store.
//!
//! The operations take the remote façade by injection, so the suites run
//! the real scanner, rename detector, staging, and orchestration against
//! [`FakeRemote`] and a tempdir working tree — no network, no live API.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};

use vt::VtError;
use vt::api::{Branch, Item, ItemUpdate, NewItem, NewVal, Remote, User, Val};
use vt::item::ItemType;

/// Deterministic timestamp for a version: the fake epoch plus one second
/// per version. Keeps every remote mtime safely in the past, so locally
/// edited files always look newer than the listing.
pub fn stamp(version: u64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(version as i64)
}

#[derive(Clone)]
struct FakeItem {
    item: Item,
    content: Option<Vec<u8>>,
}

struct FakeBranch {
    branch: Branch,
    /// `snapshots[v]` is the full listing at version `v`
    snapshots: Vec<Vec<FakeItem>>,
}

struct FakeVal {
    val: Val,
    branches: HashMap<String, FakeBranch>,
}

#[derive(Default)]
struct Store {
    vals: HashMap<String, FakeVal>,
    counter: u64,
}

impl Store {
    fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{prefix}_{}", self.counter)
    }

    fn val_mut(&mut self, val_id: &str) -> Result<&mut FakeVal, VtError> {
        self.vals
            .get_mut(val_id)
            .ok_or_else(|| VtError::not_found(format!("Val {val_id}")))
    }

    fn val(&self, val_id: &str) -> Result<&FakeVal, VtError> {
        self.vals
            .get(val_id)
            .ok_or_else(|| VtError::not_found(format!("Val {val_id}")))
    }
}

fn branch_of<'a>(val: &'a FakeVal, branch_id: &str) -> Result<&'a FakeBranch, VtError> {
    val.branches
        .get(branch_id)
        .ok_or_else(|| VtError::not_found(format!("Branch {branch_id}")))
}

fn branch_of_mut<'a>(val: &'a mut FakeVal, branch_id: &str) -> Result<&'a mut FakeBranch, VtError> {
    val.branches
        .get_mut(branch_id)
        .ok_or_else(|| VtError::not_found(format!("Branch {branch_id}")))
}

/// In-memory implementation of the remote façade.
pub struct FakeRemote {
    store: Mutex<Store>,
    /// Paths whose mutations fail with an injected transport error
    failing_paths: Mutex<HashSet<String>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
            failing_paths: Mutex::new(HashSet::new()),
        }
    }

    /// Make every create/update/delete of `path` fail with HTTP 500.
    pub fn fail_writes_on(&self, path: &str) {
        self.failing_paths
            .lock()
            .unwrap()
            .insert(path.to_string());
    }

    fn check_injected_failure(&self, path: &str) -> Result<(), VtError> {
        if self.failing_paths.lock().unwrap().contains(path) {
            return Err(VtError::Transport {
                status: Some(500),
                msg: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    /// Create a val owned by `owner` with a seeded `main` branch.
    ///
    /// `files` maps paths to `Some(content)` (file) or `None` (directory);
    /// missing parent directories are created implicitly. Returns
    /// `(val_id, main_branch_id)`.
    pub fn seed_val(
        &self,
        owner: &str,
        name: &str,
        files: &[(&str, Option<&str>)],
    ) -> (String, String) {
        let mut store = self.store.lock().unwrap();
        let val_id = store.next_id("val");
        let branch_id = store.next_id("branch");

        let mut items: Vec<FakeItem> = Vec::new();
        let mut known_dirs: HashSet<String> = HashSet::new();
        for (path, content) in files {
            // Implicit parent directories, outermost first
            if let Some(parent) = vt::path::parent(path) {
                let mut acc = String::new();
                for segment in parent.split('/') {
                    acc = if acc.is_empty() {
                        segment.to_string()
                    } else {
                        format!("{acc}/{segment}")
                    };
                    if known_dirs.insert(acc.clone()) {
                        let id = store.next_id("item");
                        items.push(make_item(id, &acc, ItemType::Directory, None, stamp(0)));
                    }
                }
            }
            let id = store.next_id("item");
            match content {
                None => {
                    if known_dirs.insert(path.to_string()) {
                        items.push(make_item(id, path, ItemType::Directory, None, stamp(0)));
                    }
                }
                Some(text) => {
                    let kind = vt::item::guess_type_from_name(path);
                    items.push(make_item(
                        id,
                        path,
                        kind,
                        Some(text.as_bytes().to_vec()),
                        stamp(0),
                    ));
                }
            }
        }
        fix_parent_ids(&mut items);

        let branch = FakeBranch {
            branch: Branch {
                id: branch_id.clone(),
                name: "main".to_string(),
                version: 0,
                created_at: stamp(0),
                updated_at: stamp(0),
            },
            snapshots: vec![items],
        };

        let val = FakeVal {
            val: Val {
                id: val_id.clone(),
                name: name.to_string(),
                owner_username: owner.to_string(),
                privacy: vt::api::Privacy::Public,
                description: None,
            },
            branches: HashMap::from([(branch_id.clone(), branch)]),
        };
        store.vals.insert(val_id.clone(), val);
        (val_id, branch_id)
    }

    /// Simulate another client writing a file (bumps the version).
    pub fn remote_write(&self, val_id: &str, branch_id: &str, path: &str, content: &str) {
        self.mutate(val_id, branch_id, |items, version, next_id| {
            match items.iter_mut().find(|i| i.item.path == path) {
                Some(existing) => {
                    existing.content = Some(content.as_bytes().to_vec());
                    existing.item.updated_at = stamp(version);
                }
                None => {
                    let kind = vt::item::guess_type_from_name(path);
                    items.push(make_item(
                        next_id,
                        path,
                        kind,
                        Some(content.as_bytes().to_vec()),
                        stamp(version),
                    ));
                }
            }
        });
    }

    /// Simulate another client deleting a path (bumps the version).
    pub fn remote_delete(&self, val_id: &str, branch_id: &str, path: &str) {
        self.mutate(val_id, branch_id, |items, _, _| {
            items.retain(|i| i.item.path != path && !i.item.path.starts_with(&format!("{path}/")));
        });
    }

    fn mutate(
        &self,
        val_id: &str,
        branch_id: &str,
        f: impl FnOnce(&mut Vec<FakeItem>, u64, String),
    ) {
        let mut store = self.store.lock().unwrap();
        let next_id = store.next_id("item");
        let val = store.vals.get_mut(val_id).expect("val exists");
        let fake_branch = val.branches.get_mut(branch_id).expect("branch exists");
        let mut snapshot = fake_branch.snapshots.last().cloned().unwrap_or_default();
        let version = fake_branch.branch.version + 1;
        f(&mut snapshot, version, next_id);
        fix_parent_ids(&mut snapshot);
        fake_branch.snapshots.push(snapshot);
        fake_branch.branch.version = version;
        fake_branch.branch.updated_at = stamp(version);
    }

    // ---------------------------------------------------------------
    // Inspection helpers for assertions
    // ---------------------------------------------------------------

    /// The item at a path on the branch's latest version.
    pub fn item_at(&self, val_id: &str, branch_id: &str, path: &str) -> Option<Item> {
        let store = self.store.lock().unwrap();
        let branch = &store.vals[val_id].branches[branch_id];
        branch
            .snapshots
            .last()?
            .iter()
            .find(|i| i.item.path == path)
            .map(|i| i.item.clone())
    }

    /// Decoded content at a path on the branch's latest version.
    pub fn content_at(&self, val_id: &str, branch_id: &str, path: &str) -> Option<String> {
        let store = self.store.lock().unwrap();
        let branch = &store.vals[val_id].branches[branch_id];
        branch
            .snapshots
            .last()?
            .iter()
            .find(|i| i.item.path == path)
            .and_then(|i| i.content.as_ref())
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    /// All paths on the branch's latest version.
    pub fn paths_at_latest(&self, val_id: &str, branch_id: &str) -> Vec<String> {
        let store = self.store.lock().unwrap();
        let branch = &store.vals[val_id].branches[branch_id];
        let mut paths: Vec<String> = branch
            .snapshots
            .last()
            .map(|s| s.iter().map(|i| i.item.path.clone()).collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }
}

fn make_item(
    id: String,
    path: &str,
    kind: ItemType,
    content: Option<Vec<u8>>,
    updated_at: DateTime<Utc>,
) -> FakeItem {
    FakeItem {
        item: Item {
            id,
            path: path.to_string(),
            name: vt::path::basename(path).to_string(),
            kind,
            parent_id: None,
            updated_at,
        },
        content,
    }
}

/// Recompute every item's `parent_id` from the directory entries present.
fn fix_parent_ids(items: &mut [FakeItem]) {
    let dirs: HashMap<String, String> = items
        .iter()
        .filter(|i| i.item.kind == ItemType::Directory)
        .map(|i| (i.item.path.clone(), i.item.id.clone()))
        .collect();
    for fake in items.iter_mut() {
        let parent_id = vt::path::parent(&fake.item.path).and_then(|p| dirs.get(p)).cloned();
        fake.item.parent_id = parent_id;
    }
}

impl Remote for FakeRemote {
    fn list_items(
        &self,
        val_id: &str,
        branch_id: &str,
        version: u64,
    ) -> Result<Vec<Item>, VtError> {
        let store = self.store.lock().unwrap();
        let branch = branch_of(store.val(val_id)?, branch_id)?;
        let snapshot = branch
            .snapshots
            .get(version as usize)
            .ok_or_else(|| VtError::not_found(format!("Version {version}")))?;
        Ok(snapshot.iter().map(|i| i.item.clone()).collect())
    }

    fn fetch_content(
        &self,
        val_id: &str,
        path: &str,
        branch_id: &str,
        version: u64,
    ) -> Result<Vec<u8>, VtError> {
        let store = self.store.lock().unwrap();
        let branch = branch_of(store.val(val_id)?, branch_id)?;
        let snapshot = branch
            .snapshots
            .get(version as usize)
            .ok_or_else(|| VtError::not_found(format!("Version {version}")))?;
        snapshot
            .iter()
            .find(|i| i.item.path == path)
            .and_then(|i| i.content.clone())
            .ok_or_else(|| VtError::not_found(path))
    }

    fn create_item(&self, val_id: &str, new: &NewItem) -> Result<Item, VtError> {
        self.check_injected_failure(&new.path)?;
        let mut store = self.store.lock().unwrap();
        let item_id = store.next_id("item");
        let val = store.val_mut(val_id)?;
        let fake_branch = branch_of_mut(val, &new.branch_id)?;

        let current = fake_branch.snapshots.last().cloned().unwrap_or_default();
        if current.iter().any(|i| i.item.path == new.path) {
            return Err(VtError::already_exists(&new.path));
        }
        if let Some(parent) = vt::path::parent(&new.path)
            && !current
                .iter()
                .any(|i| i.item.path == parent && i.item.kind == ItemType::Directory)
        {
            return Err(VtError::not_found(format!("Directory '{parent}'")));
        }

        let version = fake_branch.branch.version + 1;
        let mut snapshot = current;
        let content = match new.kind {
            ItemType::Directory => None,
            _ => Some(new.content.clone().unwrap_or_default().into_bytes()),
        };
        snapshot.push(make_item(item_id, &new.path, new.kind, content, stamp(version)));
        fix_parent_ids(&mut snapshot);

        let created = snapshot.last().unwrap().item.clone();
        fake_branch.snapshots.push(snapshot);
        fake_branch.branch.version = version;
        fake_branch.branch.updated_at = stamp(version);
        Ok(created)
    }

    fn update_item(&self, val_id: &str, update: &ItemUpdate) -> Result<Item, VtError> {
        self.check_injected_failure(&update.path)?;
        let mut store = self.store.lock().unwrap();
        let val = store.val_mut(val_id)?;
        let fake_branch = branch_of_mut(val, &update.branch_id)?;

        let mut snapshot = fake_branch.snapshots.last().cloned().unwrap_or_default();
        let version = fake_branch.branch.version + 1;

        let dir_paths: HashMap<String, String> = snapshot
            .iter()
            .filter(|i| i.item.kind == ItemType::Directory)
            .map(|i| (i.item.id.clone(), i.item.path.clone()))
            .collect();

        let idx = snapshot
            .iter()
            .position(|i| i.item.path == update.path)
            .ok_or_else(|| VtError::not_found(&update.path))?;
        let old_path = snapshot[idx].item.path.clone();
        let old_kind = snapshot[idx].item.kind;

        let name = update
            .new_name
            .clone()
            .unwrap_or_else(|| snapshot[idx].item.name.clone());
        let parent_path = match &update.new_parent_id {
            None => vt::path::parent(&old_path).map(str::to_string),
            Some(None) => None,
            Some(Some(dir_id)) => Some(
                dir_paths
                    .get(dir_id)
                    .ok_or_else(|| VtError::not_found(format!("Directory {dir_id}")))?
                    .clone(),
            ),
        };
        let new_path = match &parent_path {
            None => name.clone(),
            Some(p) => format!("{p}/{name}"),
        };

        {
            let target = &mut snapshot[idx];
            if let Some(content) = &update.content {
                target.content = Some(content.as_bytes().to_vec());
            }
            target.item.name = name;
            target.item.path = new_path.clone();
            target.item.updated_at = stamp(version);
        }

        // A moved directory carries its children along
        if old_kind == ItemType::Directory && old_path != new_path {
            let prefix = format!("{old_path}/");
            for child in snapshot.iter_mut() {
                let child_path = child.item.path.clone();
                if let Some(rest) = child_path.strip_prefix(&prefix) {
                    child.item.path = format!("{new_path}/{rest}");
                }
            }
        }

        fix_parent_ids(&mut snapshot);
        let updated = snapshot[idx].item.clone();
        fake_branch.snapshots.push(snapshot);
        fake_branch.branch.version = version;
        fake_branch.branch.updated_at = stamp(version);
        Ok(updated)
    }

    fn delete_item(
        &self,
        val_id: &str,
        path: &str,
        branch_id: &str,
        recursive: bool,
    ) -> Result<(), VtError> {
        self.check_injected_failure(path)?;
        let mut store = self.store.lock().unwrap();
        let val = store.val_mut(val_id)?;
        let fake_branch = branch_of_mut(val, branch_id)?;

        let mut snapshot = fake_branch.snapshots.last().cloned().unwrap_or_default();
        if !snapshot.iter().any(|i| i.item.path == path) {
            return Err(VtError::not_found(path));
        }
        let child_prefix = format!("{path}/");
        if !recursive && snapshot.iter().any(|i| i.item.path.starts_with(&child_prefix)) {
            return Err(VtError::Transport {
                status: Some(400),
                msg: format!("directory {path} is not empty"),
            });
        }
        snapshot.retain(|i| i.item.path != path && !i.item.path.starts_with(&child_prefix));

        let version = fake_branch.branch.version + 1;
        fake_branch.snapshots.push(snapshot);
        fake_branch.branch.version = version;
        fake_branch.branch.updated_at = stamp(version);
        Ok(())
    }

    fn list_branches(&self, val_id: &str) -> Result<Vec<Branch>, VtError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .val(val_id)?
            .branches
            .values()
            .map(|b| b.branch.clone())
            .collect())
    }

    fn create_branch(
        &self,
        val_id: &str,
        from_branch_id: &str,
        name: &str,
    ) -> Result<Branch, VtError> {
        let mut store = self.store.lock().unwrap();
        let branch_id = store.next_id("branch");
        let val = store.val_mut(val_id)?;
        if val.branches.values().any(|b| b.branch.name == name) {
            return Err(VtError::already_exists(format!("Branch '{name}'")));
        }
        let source = branch_of(val, from_branch_id)?;
        let snapshot = source.snapshots.last().cloned().unwrap_or_default();

        let branch = Branch {
            id: branch_id.clone(),
            name: name.to_string(),
            version: 0,
            created_at: stamp(0),
            updated_at: stamp(0),
        };
        val.branches.insert(
            branch_id,
            FakeBranch {
                branch: branch.clone(),
                snapshots: vec![snapshot],
            },
        );
        Ok(branch)
    }

    fn latest_version(&self, val_id: &str, branch_id: &str) -> Result<u64, VtError> {
        let store = self.store.lock().unwrap();
        Ok(branch_of(store.val(val_id)?, branch_id)?.branch.version)
    }

    fn create_val(&self, new: &NewVal) -> Result<Val, VtError> {
        let mut store = self.store.lock().unwrap();
        if store
            .vals
            .values()
            .any(|v| v.val.name == new.name && v.val.owner_username == "testuser")
        {
            return Err(VtError::already_exists(format!("Val '{}'", new.name)));
        }
        let val_id = store.next_id("val");
        let branch_id = store.next_id("branch");

        let val = Val {
            id: val_id.clone(),
            name: new.name.clone(),
            owner_username: "testuser".to_string(),
            privacy: new.privacy,
            description: new.description.clone(),
        };
        store.vals.insert(
            val_id,
            FakeVal {
                val: val.clone(),
                branches: HashMap::from([(
                    branch_id.clone(),
                    FakeBranch {
                        branch: Branch {
                            id: branch_id,
                            name: "main".to_string(),
                            version: 0,
                            created_at: stamp(0),
                            updated_at: stamp(0),
                        },
                        snapshots: vec![Vec::new()],
                    },
                )]),
            },
        );
        Ok(val)
    }

    fn delete_val(&self, val_id: &str) -> Result<(), VtError> {
        let mut store = self.store.lock().unwrap();
        store
            .vals
            .remove(val_id)
            .map(|_| ())
            .ok_or_else(|| VtError::not_found(format!("Val {val_id}")))
    }

    fn get_val(&self, val_id: &str) -> Result<Val, VtError> {
        let store = self.store.lock().unwrap();
        Ok(store.val(val_id)?.val.clone())
    }

    fn resolve_val(&self, owner: &str, name: &str) -> Result<Val, VtError> {
        let store = self.store.lock().unwrap();
        store
            .vals
            .values()
            .find(|v| v.val.owner_username == owner && v.val.name == name)
            .map(|v| v.val.clone())
            .ok_or_else(|| VtError::not_found(format!("Val '{owner}/{name}'")))
    }

    fn current_user(&self) -> Result<User, VtError> {
        Ok(User {
            id: "user_1".to_string(),
            username: "testuser".to_string(),
        })
    }
}

/// Clone `val_id`'s branch into a fresh tempdir and return the pieces the
/// suites keep reusing.
pub struct ClonedTree {
    pub dir: tempfile::TempDir,
    pub state: vt::meta::VtState,
    pub rules: vt::ignore_rules::IgnoreRules,
}

impl ClonedTree {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(rel)).unwrap()
    }

    pub fn remove(&self, rel: &str) {
        std::fs::remove_file(self.dir.path().join(rel)).unwrap();
    }

    pub fn mkdir(&self, rel: &str) {
        std::fs::create_dir_all(self.dir.path().join(rel)).unwrap();
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.dir.path().join(rel).exists()
    }
}

/// Clone a seeded val into a tempdir working tree.
pub fn clone_into_tempdir(remote: &FakeRemote, val_id: &str, branch_id: &str) -> ClonedTree {
    let parent = tempfile::tempdir().unwrap();
    let val = remote.get_val(val_id).unwrap();
    let version = remote.latest_version(val_id, branch_id).unwrap();

    let outcome = vt::ops::clone_val(remote, parent.path(), &val, branch_id, version, false)
        .expect("clone succeeds");
    let rules = vt::ignore_rules::for_tree(parent.path()).unwrap();
    ClonedTree {
        dir: parent,
        state: outcome.state,
        rules,
    }
}
