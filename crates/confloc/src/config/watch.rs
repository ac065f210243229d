//! File watching for sources created with `reload_on_change(true)`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::error::ConfigError;

/// Keeps a filesystem watcher alive; dropping it stops watching.
pub(crate) struct ConfigWatcher {
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Watch the parent directory of each file (editors often replace files
    /// rather than write them in place) and call `on_change` for events that
    /// touch one of `files`.
    pub(crate) fn spawn<F>(files: &[PathBuf], on_change: F) -> Result<Self, ConfigError>
    where
        F: Fn() + Send + 'static,
    {
        let targets: Vec<(PathBuf, OsString)> = files.iter().filter_map(|f| target(f)).collect();
        let matcher = targets.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "file watcher error");
                    return;
                }
            };
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            let hit = event
                .paths
                .iter()
                .any(|p| target(p).is_some_and(|t| matcher.contains(&t)));
            if hit {
                debug!(paths = ?event.paths, "resource file changed");
                on_change();
            }
        })?;

        let mut dirs: Vec<&Path> = targets.iter().map(|(dir, _)| dir.as_path()).collect();
        dirs.sort();
        dirs.dedup();
        for dir in dirs {
            if !dir.is_dir() {
                warn!(dir = %dir.display(), "not watching missing directory");
                continue;
            }
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
            debug!(dir = %dir.display(), "watching for resource changes");
        }

        Ok(Self { _watcher: watcher })
    }
}

/// Canonical parent directory plus file name.
fn target(path: &Path) -> Option<(PathBuf, OsString)> {
    let path = std::path::absolute(path).ok()?;
    let name = path.file_name()?.to_os_string();
    let parent = path.parent()?;
    let parent = parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf());
    Some((parent, name))
}
