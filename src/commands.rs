//! Command handlers: wire the CLI surface onto the library operations and
//! render their results.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use vt::api::http::Api;
use vt::api::{DEFAULT_BRANCH_NAME, NewVal, Privacy, Remote, branch_by_name};
use vt::config;
use vt::ignore_rules::{self, IgnoreRules};
use vt::meta::{Meta, VtState};
use vt::ops::{self, CheckoutTarget};
use vt::path::format_path_for_display;
use vt::status::{ItemStatusManager, Status};
use vt::styling::{
    ADDITION, CURRENT, CYAN, DELETION, HINT, MODIFICATION, RENAME, eprintln, hint_message,
    println, success_message, warning_message,
};
use vt::utils;
use vt::watch::{WatchOptions, watch};

use crate::cli::parse_val_uri;

/// Everything a command inside a working tree needs.
struct TreeContext {
    api: Api,
    root: PathBuf,
    state: VtState,
    rules: IgnoreRules,
    threshold: f64,
}

fn open_tree(root: &Path) -> anyhow::Result<TreeContext> {
    let state = Meta::at(root).load()?;
    let config = config::load(Some(root))?;
    let api = Api::new(config.api_key()?)?;
    let rules = ignore_rules::for_tree(root)?;
    Ok(TreeContext {
        api,
        root: root.to_path_buf(),
        state,
        rules,
        threshold: config.rename_threshold(),
    })
}

fn open_api() -> anyhow::Result<Api> {
    let config = config::load(None)?;
    Ok(Api::new(config.api_key()?)?)
}

/// Record that the credential worked, for the onboarding flow's
/// "last successful auth" display. Best effort only.
fn touch_auth_cache() {
    let mut cache = config::VtCache::load();
    cache.last_auth_at = Some(utils::now_ms());
    if let Err(e) = cache.save() {
        log::debug!("could not update auth cache: {}", e.brief());
    }
}

/// Print the change listing in the canonical order.
fn render_changes(manager: &ItemStatusManager) {
    for entry in manager.entries(true) {
        match &entry.status {
            Status::NotModified => continue,
            Status::Created => println!("{ADDITION}A {}{ADDITION:#}", entry.path),
            Status::Deleted => println!("{DELETION}D {}{DELETION:#}", entry.path),
            Status::Modified { .. } => println!("{MODIFICATION}M {}{MODIFICATION:#}", entry.path),
            Status::Renamed {
                old_path,
                similarity,
            } => println!(
                "{RENAME}R {old_path} -> {} ({:.0}%){RENAME:#}",
                entry.path,
                similarity * 100.0
            ),
        }
    }
    for entry in manager.entries(true) {
        for warning in &entry.warnings {
            eprintln!("{}", warning_message(format!("{}: {warning}", entry.path)));
        }
    }
}

fn render_clean_or_changes(manager: &ItemStatusManager) {
    if manager.is_dirty() {
        render_changes(manager);
    } else {
        eprintln!("{HINT}Working tree clean{HINT:#}");
    }
}

pub fn handle_clone(
    cwd: &Path,
    val_uri: &str,
    dir: Option<PathBuf>,
    branch: Option<String>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let api = open_api()?;
    let (owner, name) = parse_val_uri(val_uri).map_err(|e| anyhow::anyhow!(e))?;
    let val = api.resolve_val(&owner, &name)?;

    let branch_name = branch.as_deref().unwrap_or(DEFAULT_BRANCH_NAME);
    let branch = branch_by_name(&api, &val.id, branch_name)?;
    let version = api.latest_version(&val.id, &branch.id)?;

    let target = cwd.join(dir.unwrap_or_else(|| PathBuf::from(&val.name)));
    let outcome = ops::clone_val(&api, &target, &val, &branch.id, version, dry_run)?;

    if dry_run {
        render_changes(&outcome.manager);
        return Ok(());
    }
    eprintln!(
        "{}",
        success_message(format!(
            "Cloned {owner}/{name} ({} items) to {}",
            outcome.manager.size(),
            format_path_for_display(&target)
        ))
    );
    touch_auth_cache();
    Ok(())
}

pub fn handle_status(cwd: &Path) -> anyhow::Result<()> {
    let ctx = open_tree(cwd)?;
    let branch_name = ctx
        .api
        .list_branches(&ctx.state.val_id)?
        .into_iter()
        .find(|b| b.id == ctx.state.current_branch_id)
        .map(|b| b.name)
        .unwrap_or_else(|| ctx.state.current_branch_id.clone());
    eprintln!(
        "{CYAN}On branch {branch_name} at version {}{CYAN:#}",
        ctx.state.base_version
    );

    let manager = ops::status(&ctx.api, &ctx.root, &ctx.state, &ctx.rules, ctx.threshold)?;
    render_clean_or_changes(&manager);
    touch_auth_cache();
    Ok(())
}

pub fn handle_pull(cwd: &Path, force: bool, dry_run: bool) -> anyhow::Result<()> {
    let mut ctx = open_tree(cwd)?;
    let outcome = ops::pull(
        &ctx.api,
        &ctx.root,
        &mut ctx.state,
        &ctx.rules,
        ctx.threshold,
        force,
        dry_run,
    )?;

    render_changes(&outcome.manager);
    if dry_run {
        eprintln!(
            "{}",
            hint_message(format!(
                "Dry run: would pull version {} -> {}",
                outcome.from_version, outcome.to_version
            ))
        );
    } else {
        eprintln!(
            "{}",
            success_message(format!(
                "Pulled version {} -> {}",
                outcome.from_version, outcome.to_version
            ))
        );
        touch_auth_cache();
    }
    Ok(())
}

pub fn handle_push(cwd: &Path, dry_run: bool) -> anyhow::Result<()> {
    let mut ctx = open_tree(cwd)?;
    let manager = ops::push(
        &ctx.api,
        &ctx.root,
        &mut ctx.state,
        &ctx.rules,
        ctx.threshold,
        dry_run,
    )?;

    render_changes(&manager);
    if dry_run {
        eprintln!(
            "{}",
            hint_message(format!("Dry run: {} changes to push", manager.changes()))
        );
    } else if manager.changes() == 0 {
        eprintln!("{HINT}Nothing to push{HINT:#}");
    } else {
        eprintln!(
            "{}",
            success_message(format!(
                "Pushed {} changes; now at version {}",
                manager.changes(),
                ctx.state.base_version
            ))
        );
        touch_auth_cache();
    }
    Ok(())
}

pub fn handle_branch(cwd: &Path) -> anyhow::Result<()> {
    let ctx = open_tree(cwd)?;
    let mut branches = ctx.api.list_branches(&ctx.state.val_id)?;
    branches.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    for branch in branches {
        if branch.id == ctx.state.current_branch_id {
            println!("{CURRENT}* {} (v{}){CURRENT:#}", branch.name, branch.version);
        } else {
            println!("  {} (v{})", branch.name, branch.version);
        }
    }
    Ok(())
}

pub fn handle_checkout(
    cwd: &Path,
    name: Option<String>,
    new_branch: Option<String>,
    force: bool,
    dry_run: bool,
) -> anyhow::Result<()> {
    let mut ctx = open_tree(cwd)?;
    let target = match (&new_branch, &name) {
        (Some(new), _) => CheckoutTarget::NewBranch(new),
        (None, Some(existing)) => CheckoutTarget::Existing(existing),
        (None, None) => anyhow::bail!("checkout needs a branch name"),
    };

    let outcome = ops::checkout(
        &ctx.api,
        &ctx.root,
        &mut ctx.state,
        &ctx.rules,
        ctx.threshold,
        target,
        force,
        dry_run,
    )?;

    let verb = if dry_run { "Would switch" } else { "Switched" };
    if outcome.created_new {
        eprintln!(
            "{}",
            success_message(format!(
                "{verb} to new branch {} (forked from {})",
                outcome.to_branch, outcome.from_branch
            ))
        );
    } else {
        eprintln!(
            "{}",
            success_message(format!(
                "{verb} from {} to {} ({} paths differ)",
                outcome.from_branch, outcome.to_branch, outcome.changes
            ))
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn handle_create(
    cwd: &Path,
    name: String,
    dir: Option<PathBuf>,
    privacy: Privacy,
    description: Option<String>,
    upload_existing: bool,
    no_editor_files: bool,
) -> anyhow::Result<()> {
    let target = dir.map(|d| cwd.join(d)).unwrap_or_else(|| cwd.to_path_buf());
    let config = config::load(None)?;
    let api = Api::new(config.api_key()?)?;
    let rules = ignore_rules::for_tree(&target)?;
    let editor_files = !no_editor_files && config.editor_files.unwrap_or(true);

    let new_val = NewVal {
        name,
        privacy,
        description,
        org_id: None,
    };
    let outcome = ops::create(
        &api,
        &target,
        &new_val,
        upload_existing,
        editor_files,
        &rules,
        config.rename_threshold(),
        false,
    )?;

    if let Some(uploaded) = &outcome.uploaded {
        render_changes(uploaded);
    }
    eprintln!(
        "{}",
        success_message(format!(
            "Created val {}/{} at https://www.val.town/x/{}/{}",
            outcome.val.owner_username,
            outcome.val.name,
            outcome.val.owner_username,
            outcome.val.name
        ))
    );
    Ok(())
}

pub fn handle_remix(
    cwd: &Path,
    src_uri: Option<String>,
    new_name: Option<String>,
    dir: Option<PathBuf>,
    privacy: Privacy,
    description: Option<String>,
) -> anyhow::Result<()> {
    let api = open_api()?;

    // Default source: the val this working tree is pinned to
    let (source, source_branch_id) = match &src_uri {
        Some(uri) => {
            let (owner, name) = parse_val_uri(uri).map_err(|e| anyhow::anyhow!(e))?;
            let val = api.resolve_val(&owner, &name)?;
            let main = branch_by_name(&api, &val.id, DEFAULT_BRANCH_NAME)?;
            (val, main.id)
        }
        None => {
            let state = Meta::at(cwd)
                .load()
                .context("no source val given and this is not a vt working tree")?;
            (api.get_val(&state.val_id)?, state.current_branch_id)
        }
    };

    let name = new_name.unwrap_or_else(|| {
        format!("{}_remix_{:05}", source.name, utils::now_ms().rem_euclid(100_000))
    });
    let target = cwd.join(dir.unwrap_or_else(|| PathBuf::from(&name)));

    let new_val = NewVal {
        name,
        privacy,
        description,
        org_id: None,
    };
    let outcome = ops::remix(&api, &target, &source, &source_branch_id, &new_val, false)?;

    eprintln!(
        "{}",
        success_message(format!(
            "Remixed {}/{} into {}/{} at {}",
            source.owner_username,
            source.name,
            outcome.val.owner_username,
            outcome.val.name,
            format_path_for_display(&target)
        ))
    );
    Ok(())
}

pub fn handle_watch(cwd: &Path, interval: Option<u64>) -> anyhow::Result<()> {
    let mut ctx = open_tree(cwd)?;
    let options = WatchOptions {
        interval: interval.map(Duration::from_secs),
        ..WatchOptions::default()
    };

    eprintln!(
        "{CYAN}Watching {} (Ctrl-C to stop){CYAN:#}",
        format_path_for_display(&ctx.root)
    );
    watch(
        &ctx.api,
        &ctx.root,
        &mut ctx.state,
        &ctx.rules,
        ctx.threshold,
        &options,
        |manager| {
            if manager.changes() > 0 {
                render_changes(manager);
                eprintln!(
                    "{}",
                    success_message(format!("Pushed {} changes", manager.changes()))
                );
            }
        },
    )?;
    eprintln!("{HINT}Watcher stopped{HINT:#}");
    Ok(())
}
