//! Error types shared across the sync engine.

use std::path::PathBuf;

/// Errors surfaced by the sync engine.
///
/// Operations return these unchanged, with three deliberate downgrades:
/// push converts per-item [`VtError::Transport`] failures into item
/// warnings, directory creation treats [`VtError::AlreadyExists`] as
/// success, and a repeated delete treats [`VtError::NotFound`] as success.
#[derive(Debug)]
pub enum VtError {
    /// A val, branch, item, or directory does not exist
    NotFound { what: String },
    /// A val or branch with this name already exists
    AlreadyExists { what: String },
    /// The working tree differs from the remote at the base version
    DirtyWorkingTree,
    /// Target directory for clone/create already has entries
    DirectoryNotEmpty { path: PathBuf },
    /// Another watcher holds the lock for this working tree
    LockHeld { pid: Option<u32>, path: PathBuf },
    /// Remote call failed (HTTP status when one was received)
    Transport { status: Option<u16>, msg: String },
    /// State or config file violates its schema
    ConfigInvalid { msg: String },
    /// Missing or rejected credential
    Auth,
    /// Local filesystem failure
    Io(String),
}

impl VtError {
    /// NotFound with a short description of the missing thing.
    pub fn not_found(what: impl Into<String>) -> Self {
        VtError::NotFound { what: what.into() }
    }

    /// AlreadyExists with a short description of the conflicting thing.
    pub fn already_exists(what: impl Into<String>) -> Self {
        VtError::AlreadyExists { what: what.into() }
    }

    /// Transport failure without an HTTP status (connection-level errors).
    pub fn transport(msg: impl Into<String>) -> Self {
        VtError::Transport {
            status: None,
            msg: msg.into(),
        }
    }

    /// True when the error came from the remote transport layer.
    ///
    /// Push uses this to decide which per-item failures become `unknown:`
    /// warnings instead of aborting the batch.
    pub fn is_transport(&self) -> bool {
        matches!(self, VtError::Transport { .. })
    }

    /// Unstyled one-line message, for logs and item warnings.
    pub fn brief(&self) -> String {
        match self {
            VtError::NotFound { what } => format!("{what} not found"),
            VtError::AlreadyExists { what } => format!("{what} already exists"),
            VtError::DirtyWorkingTree => "working tree has unpushed changes".to_string(),
            VtError::DirectoryNotEmpty { path } => {
                format!("directory {} is not empty", path.display())
            }
            VtError::LockHeld { path, .. } => {
                format!("lock already held at {}", path.display())
            }
            VtError::Transport { status: Some(code), msg } => format!("HTTP {code}: {msg}"),
            VtError::Transport { status: None, msg } => msg.clone(),
            VtError::ConfigInvalid { msg } => format!("invalid configuration: {msg}"),
            VtError::Auth => "not authenticated".to_string(),
            VtError::Io(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for VtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::styling::{ERROR, ERROR_BOLD, ERROR_EMOJI, HINT, HINT_EMOJI};

        match self {
            VtError::NotFound { what } => {
                write!(f, "{ERROR_EMOJI} {ERROR}{what} not found{ERROR:#}")
            }

            VtError::AlreadyExists { what } => {
                write!(f, "{ERROR_EMOJI} {ERROR}{what} already exists{ERROR:#}")
            }

            VtError::DirtyWorkingTree => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Working tree has unpushed changes{ERROR:#}\n\n{HINT_EMOJI} {HINT}Push them first, or pass --force to discard them{HINT:#}"
                )
            }

            VtError::DirectoryNotEmpty { path } => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Directory {ERROR_BOLD}{}{ERROR_BOLD:#}{ERROR} is not empty{ERROR:#}",
                    path.display()
                )
            }

            VtError::LockHeld { pid, path } => {
                let owner = pid
                    .map(|p| format!(" (held by pid {p})"))
                    .unwrap_or_default();
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}A watcher is already running in this tree{owner}{ERROR:#}\n\n{HINT_EMOJI} {HINT}If it crashed, remove {} and retry{HINT:#}",
                    path.display()
                )
            }

            VtError::Transport { status, msg } => match status {
                Some(code) => {
                    write!(f, "{ERROR_EMOJI} {ERROR}Remote error (HTTP {code}): {msg}{ERROR:#}")
                }
                None => write!(f, "{ERROR_EMOJI} {ERROR}Remote error: {msg}{ERROR:#}"),
            },

            VtError::ConfigInvalid { msg } => {
                write!(f, "{ERROR_EMOJI} {ERROR}Invalid configuration: {msg}{ERROR:#}")
            }

            VtError::Auth => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Not authenticated{ERROR:#}\n\n{HINT_EMOJI} {HINT}Set VAL_TOWN_API_KEY or add apiKey to your config{HINT:#}"
                )
            }

            VtError::Io(msg) => write!(f, "{ERROR_EMOJI} {ERROR}{msg}{ERROR:#}"),
        }
    }
}

impl std::error::Error for VtError {}

impl From<std::io::Error> for VtError {
    fn from(e: std::io::Error) -> Self {
        VtError::Io(e.to_string())
    }
}

impl From<reqwest::Error> for VtError {
    fn from(e: reqwest::Error) -> Self {
        VtError::Transport {
            status: e.status().map(|s| s.as_u16()),
            msg: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for VtError {
    fn from(e: serde_json::Error) -> Self {
        VtError::ConfigInvalid { msg: e.to_string() }
    }
}

impl From<serde_yaml::Error> for VtError {
    fn from(e: serde_yaml::Error) -> Self {
        VtError::ConfigInvalid { msg: e.to_string() }
    }
}
