//! File watcher: reload a datastore when files under its folder change.
//!
//! Uses the notify crate to watch the data folder, debounces events per
//! datastore, and reloads through the registry. A failed reload leaves the
//! previous snapshot published.

mod watcher;

use std::path::{Component, Path};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::Result;
use crate::registry::GraphRegistry;

/// Datastore a changed path belongs to: its first component under `root`.
pub fn datastore_for_path(path: &Path, root: &Path) -> Option<String> {
    let relative = match path.strip_prefix(root) {
        Ok(r) => r.to_path_buf(),
        Err(_) => {
            let root = root.canonicalize().ok()?;
            path.strip_prefix(&root).ok()?.to_path_buf()
        }
    };

    match relative.components().next() {
        Some(Component::Normal(name)) => {
            let name = name.to_str()?;
            if name.starts_with('.') {
                None
            } else {
                Some(name.to_string())
            }
        }
        _ => None,
    }
}

/// Run the file watcher until the watcher thread exits.
pub async fn run_watcher(registry: Arc<GraphRegistry>, root: &Path, debounce: Duration) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let thread_root = root.to_path_buf();

    std::thread::spawn(move || {
        if let Err(e) = watcher::run_watcher_thread(&thread_root, debounce, tx) {
            log::error!("watcher thread error: {}", e);
        }
    });

    log::info!("Watching {} for datastore changes", root.display());

    while let Some(name) = rx.recv().await {
        if !registry.is_tracked(&name) {
            log::debug!("watch: ignoring change in untracked folder '{}'", name);
            continue;
        }
        match registry.load(&name).await {
            Ok(ds) => log::info!("watch: reloaded '{}' (generation {})", name, ds.generation()),
            Err(e) => log::error!("watch: reload of '{}' failed, keeping previous snapshot: {}", name, e),
        }
    }
    Ok(())
}
