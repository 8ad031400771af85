//! Gitignore-style rule evaluation for the working tree.
//!
//! The effective rule set for every operation is
//! `ALWAYS_IGNORE ∪ DEFAULT_IGNORE ∪ <tree>/.vtignore`. Rules use gitignore
//! semantics (negation, directory suffixes, `**` globs); an empty rule list
//! never ignores anything.

use std::fs;
use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::error::VtError;

/// Name of the per-tree ignore file (newline-delimited gitignore rules).
pub const IGNORE_FILE: &str = ".vtignore";

/// Rules that always apply; the metadata folder must never sync.
pub const ALWAYS_IGNORE: &[&str] = &[".vt", ".vt/**"];

/// Default rules a tree starts with; a `.vtignore` rule can re-include
/// anything here except the metadata folder.
pub const DEFAULT_IGNORE: &[&str] = &[".vtignore", ".DS_Store", ".env", "*.env"];

/// A compiled set of ignore rules for one working tree.
#[derive(Debug)]
pub struct IgnoreRules {
    matcher: Gitignore,
    empty: bool,
}

impl IgnoreRules {
    /// Compile `rules` (gitignore lines) rooted at `root`.
    pub fn new(root: &Path, rules: &[String]) -> Result<Self, VtError> {
        let mut builder = GitignoreBuilder::new(root);
        for line in rules {
            builder
                .add_line(None, line)
                .map_err(|e| VtError::ConfigInvalid {
                    msg: format!("bad ignore rule {line:?}: {e}"),
                })?;
        }
        let matcher = builder.build().map_err(|e| VtError::ConfigInvalid {
            msg: format!("failed to compile ignore rules: {e}"),
        })?;
        Ok(Self {
            matcher,
            empty: rules.is_empty(),
        })
    }

    /// An empty rule set (ignores nothing).
    pub fn none(root: &Path) -> Self {
        Self::new(root, &[]).expect("empty rule set always compiles")
    }

    /// Whether `rel_path` (canonical POSIX relative) should be ignored.
    ///
    /// A path is ignored when it or any parent matches a non-negated rule.
    pub fn should_ignore(&self, rel_path: &str, is_dir: bool) -> bool {
        if self.empty || rel_path.is_empty() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(rel_path, is_dir)
            .is_ignore()
    }
}

/// Load the effective rule list for a working tree:
/// built-in rules plus the lines of `.vtignore` when present.
pub fn load_rules(root: &Path) -> Vec<String> {
    let mut rules: Vec<String> = ALWAYS_IGNORE
        .iter()
        .chain(DEFAULT_IGNORE.iter())
        .map(|s| s.to_string())
        .collect();

    let ignore_file = root.join(IGNORE_FILE);
    if let Ok(text) = fs::read_to_string(&ignore_file) {
        for line in text.lines() {
            let line = line.trim();
            if !line.is_empty() && !line.starts_with('#') {
                rules.push(line.to_string());
            }
        }
    }

    rules
}

/// Compile the effective rules for a working tree.
pub fn for_tree(root: &Path) -> Result<IgnoreRules, VtError> {
    IgnoreRules::new(root, &load_rules(root))
}
