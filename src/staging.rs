//! Atomic staging of destructive operations.
//!
//! Clone, pull, and checkout never write into the target directly. They
//! prepare the result in a fresh temporary directory and copy it over the
//! target only once the whole preparation succeeded. On any failure the
//! target is untouched.

use std::fs;
use std::path::Path;

use crate::error::VtError;
use crate::ignore_rules::IgnoreRules;
use crate::path::relative_posix;
use crate::utils;

/// Run `op` against a fresh temporary directory and, on success, copy the
/// result into `target`.
///
/// The copy overwrites colliding entries but leaves everything else in
/// `target` alone, which is what carries untracked files across pull and
/// checkout. Copy, not rename: a rename would replace the target wholesale.
///
/// When `op` fails the temporary directory is deleted and the error is
/// re-raised; `target` is not created or modified.
pub fn do_atomically<T>(
    label: &str,
    target: &Path,
    op: impl FnOnce(&Path) -> Result<T, VtError>,
) -> Result<T, VtError> {
    let tmp = tempfile::Builder::new()
        .prefix(&format!("vt-{label}-"))
        .tempdir()?;
    log::debug!("staging {label} in {}", tmp.path().display());

    let out = op(tmp.path())?;

    fs::create_dir_all(target)?;
    copy_tree(tmp.path(), target)?;
    Ok(out)
}

/// Recursively copy `src` into `dst`, preserving file mtimes and
/// overwriting colliding entries.
fn copy_tree(src: &Path, dst: &Path) -> Result<(), VtError> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let meta = entry.metadata()?;
        if meta.is_dir() {
            fs::create_dir_all(&to)?;
            copy_tree(&from, &to)?;
        } else {
            fs::copy(&from, &to)?;
            utils::set_mtime_ms(&to, utils::mtime_ms(&meta))?;
        }
    }
    Ok(())
}

/// Remove every entry of `dir` not matched by `rules`, recursing into
/// directories. A directory that still holds ignored entries afterwards is
/// kept.
pub fn clean_directory(dir: &Path, rules: &IgnoreRules) -> Result<(), VtError> {
    clean_below(dir, dir, rules)
}

fn clean_below(root: &Path, dir: &Path, rules: &IgnoreRules) -> Result<(), VtError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_dir = entry.metadata()?.is_dir();
        let Some(rel) = relative_posix(root, &path) else {
            continue;
        };
        if rules.should_ignore(&rel, is_dir) {
            continue;
        }
        if is_dir {
            clean_below(root, &path, rules)?;
            // Keep the directory when ignored entries survived inside it
            if fs::read_dir(&path)?.next().is_none() {
                fs::remove_dir(&path)?;
            }
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignore_rules::IgnoreRules;

    #[test]
    fn failure_leaves_target_untouched() {
        let target = tempfile::tempdir().unwrap();
        fs::write(target.path().join("existing.txt"), "keep me").unwrap();

        let result: Result<(), VtError> = do_atomically("test", target.path(), |tmp| {
            fs::write(tmp.join("half-written.txt"), "partial")?;
            Err(VtError::transport("boom"))
        });

        assert!(result.is_err());
        assert!(!target.path().join("half-written.txt").exists());
        assert_eq!(
            fs::read_to_string(target.path().join("existing.txt")).unwrap(),
            "keep me"
        );
    }

    #[test]
    fn success_copies_staging_tree_into_target() {
        let target = tempfile::tempdir().unwrap();
        fs::write(target.path().join("untracked.txt"), "mine").unwrap();

        do_atomically("test", target.path(), |tmp| {
            fs::create_dir_all(tmp.join("dir"))?;
            fs::write(tmp.join("a.tsx"), "// a")?;
            fs::write(tmp.join("dir/b"), "b")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(fs::read_to_string(target.path().join("a.tsx")).unwrap(), "// a");
        assert_eq!(fs::read_to_string(target.path().join("dir/b")).unwrap(), "b");
        // Copy-into semantics: entries already in the target survive
        assert_eq!(
            fs::read_to_string(target.path().join("untracked.txt")).unwrap(),
            "mine"
        );
    }

    #[test]
    fn copy_preserves_mtimes() {
        let target = tempfile::tempdir().unwrap();

        do_atomically("test", target.path(), |tmp| {
            let file = tmp.join("pinned.txt");
            fs::write(&file, "x")?;
            utils::set_mtime_ms(&file, 1_600_000_000_000)?;
            Ok(())
        })
        .unwrap();

        let meta = fs::metadata(target.path().join("pinned.txt")).unwrap();
        assert!((utils::mtime_ms(&meta) - 1_600_000_000_000).abs() < 1_000);
    }

    #[test]
    fn creates_missing_target() {
        let parent = tempfile::tempdir().unwrap();
        let target = parent.path().join("fresh");

        do_atomically("test", &target, |tmp| {
            fs::write(tmp.join("f"), "1")?;
            Ok(())
        })
        .unwrap();

        assert!(target.join("f").is_file());
    }

    #[test]
    fn clean_directory_respects_ignore_rules() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tracked.ts"), "x").unwrap();
        fs::write(dir.path().join("keep.env"), "secret").unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/file"), "y").unwrap();

        let rules =
            IgnoreRules::new(dir.path(), &["*.env".to_string()]).unwrap();
        clean_directory(dir.path(), &rules).unwrap();

        assert!(!dir.path().join("tracked.ts").exists());
        assert!(!dir.path().join("sub").exists());
        assert!(dir.path().join("keep.env").exists());
    }

    #[test]
    fn clean_directory_keeps_dirs_holding_ignored_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/.env"), "secret").unwrap();
        fs::write(dir.path().join("sub/code.ts"), "x").unwrap();

        let rules = IgnoreRules::new(dir.path(), &[".env".to_string()]).unwrap();
        clean_directory(dir.path(), &rules).unwrap();

        assert!(dir.path().join("sub/.env").exists());
        assert!(!dir.path().join("sub/code.ts").exists());
    }
}
