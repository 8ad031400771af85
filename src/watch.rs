//! The long-running watcher: push on every quiet moment.
//!
//! Two producers feed one debounced consumer: a filesystem-event stream
//! and an optional periodic tick. Events coalesce under a trailing
//! debounce; each firing runs exactly one push, and the consumer only
//! accepts the next event once that push finished, so pushes never
//! overlap.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, never, tick, unbounded};
use notify::{RecursiveMode, Watcher};

use crate::api::Remote;
use crate::error::VtError;
use crate::ignore_rules::IgnoreRules;
use crate::meta::{Meta, VtState};
use crate::ops;
use crate::path::relative_posix;
use crate::status::ItemStatusManager;

/// Trailing debounce applied to filesystem events.
pub const DEBOUNCE: Duration = Duration::from_millis(300);

/// How often the loop polls the shutdown flag while idle.
const IDLE_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub debounce: Duration,
    /// Optional periodic push regardless of filesystem activity
    pub interval: Option<Duration>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: DEBOUNCE,
            interval: None,
        }
    }
}

/// Watch `root` and push on changes until interrupted.
///
/// Takes the working tree lock for the whole run; a second watcher in the
/// same tree fails with [`VtError::LockHeld`]. On SIGINT/SIGTERM the lock
/// file is removed and the loop returns. `on_cycle` observes each push's
/// result.
pub fn watch(
    remote: &dyn Remote,
    root: &Path,
    state: &mut VtState,
    rules: &IgnoreRules,
    rename_threshold: f64,
    options: &WatchOptions,
    mut on_cycle: impl FnMut(&ItemStatusManager),
) -> Result<(), VtError> {
    let meta = Meta::at(root);
    let _lock = meta.acquire_lock()?;

    let stop = Arc::new(AtomicBool::new(false));
    register_signal_handlers(&stop)?;

    let (tx, events) = unbounded::<notify::Event>();
    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        if let Ok(event) = res {
            let _ = tx.send(event);
        }
    })
    .map_err(|e| VtError::Io(e.to_string()))?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| VtError::Io(e.to_string()))?;

    let ticker: Receiver<std::time::Instant> = match options.interval {
        Some(interval) => tick(interval),
        None => never(),
    };

    log::info!("watching {} for changes", root.display());

    while !stop.load(Ordering::Relaxed) {
        crossbeam_channel::select! {
            recv(events) -> event => {
                let Ok(event) = event else { break };
                if !is_relevant(root, rules, &event) {
                    continue;
                }
                // Trailing debounce: keep draining while events arrive
                while events.recv_timeout(options.debounce).is_ok() {}
                run_push(remote, root, state, rules, rename_threshold, &mut on_cycle)?;
            }
            recv(ticker) -> _ => {
                run_push(remote, root, state, rules, rename_threshold, &mut on_cycle)?;
            }
            default(IDLE_POLL) => {}
        }
    }

    Ok(())
}

/// One sequential push cycle.
///
/// Authentication and schema failures are fatal; transient remote
/// failures are logged and the loop keeps watching.
fn run_push(
    remote: &dyn Remote,
    root: &Path,
    state: &mut VtState,
    rules: &IgnoreRules,
    rename_threshold: f64,
    on_cycle: &mut impl FnMut(&ItemStatusManager),
) -> Result<(), VtError> {
    match ops::push(remote, root, state, rules, rename_threshold, false) {
        Ok(manager) => {
            on_cycle(&manager);
            Ok(())
        }
        Err(e @ (VtError::Auth | VtError::ConfigInvalid { .. })) => Err(e),
        Err(e) => {
            log::warn!("push failed, still watching: {}", e.brief());
            Ok(())
        }
    }
}

/// Whether an event touches a path the engine cares about.
fn is_relevant(root: &Path, rules: &IgnoreRules, event: &notify::Event) -> bool {
    event.paths.iter().any(|p| {
        match relative_posix(root, p) {
            Some(rel) if !rel.is_empty() => !rules.should_ignore(&rel, p.is_dir()),
            _ => false,
        }
    })
}

#[cfg(unix)]
fn register_signal_handlers(stop: &Arc<AtomicBool>) -> Result<(), VtError> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(stop))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn register_signal_handlers(_stop: &Arc<AtomicBool>) -> Result<(), VtError> {
    Ok(())
}
