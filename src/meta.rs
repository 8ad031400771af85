//! Per-working-tree metadata: the `.vt/` folder.
//!
//! The folder pins the working tree to a `(val, branch, base version)`
//! tuple in `state.json`, holds the watcher's lock file, and may carry a
//! local `config.yaml` with per-tree overrides.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::VtError;

/// Hidden metadata folder under the working tree root.
pub const STATE_DIR: &str = ".vt";
/// The pinned tuple, JSON with 4-space indent.
pub const STATE_FILE: &str = "state.json";
/// Lock file holding the owning watcher's PID.
pub const LOCK_FILE: &str = "vt.lock";
/// Optional per-tree config overrides.
pub const LOCAL_CONFIG_FILE: &str = "config.yaml";

/// The pinned tuple for one working tree.
///
/// `val_id`, `owner_username`, and `val_name` never change after init.
/// `current_branch_id` moves on checkout; `base_version` advances on pull
/// and on successful push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VtState {
    pub val_id: String,
    pub owner_username: String,
    pub val_name: String,
    pub current_branch_id: String,
    pub base_version: u64,
}

/// Handle on a working tree's `.vt/` folder.
#[derive(Debug, Clone)]
pub struct Meta {
    root: PathBuf,
}

impl Meta {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir().join(STATE_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir().join(LOCK_FILE)
    }

    pub fn local_config_path(&self) -> PathBuf {
        self.dir().join(LOCAL_CONFIG_FILE)
    }

    /// Whether `root` is a vt working tree.
    pub fn exists(&self) -> bool {
        self.state_path().is_file()
    }

    /// Create the metadata folder and write the initial state.
    pub fn init(&self, state: &VtState) -> Result<(), VtError> {
        fs::create_dir_all(self.dir())?;
        self.save(state)
    }

    /// Load the pinned tuple.
    ///
    /// Missing metadata means the directory is not a working tree; a
    /// present but unparsable file is a fatal schema violation.
    pub fn load(&self) -> Result<VtState, VtError> {
        let path = self.state_path();
        let text = fs::read_to_string(&path).map_err(|_| {
            VtError::not_found(format!(
                "Working tree metadata at {} (run 'vt clone' or 'vt create' first)",
                path.display()
            ))
        })?;
        serde_json::from_str(&text).map_err(|e| VtError::ConfigInvalid {
            msg: format!("{}: {e}", path.display()),
        })
    }

    /// Persist the pinned tuple as JSON with 4-space indentation.
    pub fn save(&self, state: &VtState) -> Result<(), VtError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        state.serialize(&mut ser)?;
        buf.push(b'\n');
        fs::write(self.state_path(), buf)?;
        Ok(())
    }

    /// Take the watcher lock for this tree.
    ///
    /// A second watcher finds the file already present and fails with
    /// [`VtError::LockHeld`]; the recorded PID is diagnostics only, no
    /// liveness probe happens.
    pub fn acquire_lock(&self) -> Result<LockGuard, VtError> {
        fs::create_dir_all(self.dir())?;
        let path = self.lock_path();
        match fs::File::options().write(true).create_new(true).open(&path) {
            Ok(file) => {
                use std::io::Write;
                let mut file = file;
                let _ = write!(file, "{}", std::process::id());
                Ok(LockGuard { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let pid = fs::read_to_string(&path)
                    .ok()
                    .and_then(|s| s.trim().parse::<u32>().ok());
                Err(VtError::LockHeld { pid, path })
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Removes the lock file when dropped (clean watcher exit).
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
