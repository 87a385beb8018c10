//! Watcher thread: notify + debounce, send changed datastore names to main.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{Result, SmartKgError};

/// Watch `root` and send the name of each datastore whose files changed over `tx`,
/// once no further event touched it for `debounce`.
/// The thread exits when the receiver is dropped or on watcher error.
pub fn run_watcher_thread(root: &Path, debounce: Duration, tx: UnboundedSender<String>) -> Result<()> {
    let root = root.to_path_buf();
    let (event_tx, event_rx) = mpsc::channel::<Vec<PathBuf>>();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(ev) = res {
            let _ = event_tx.send(ev.paths);
        }
    })
    .map_err(|e| SmartKgError::Config(e.to_string()))?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| SmartKgError::Config(e.to_string()))?;

    let mut pending: HashMap<String, Instant> = HashMap::new();

    loop {
        match event_rx.recv_timeout(debounce) {
            Ok(paths) => {
                let now = Instant::now();
                for name in paths.iter().filter_map(|p| super::datastore_for_path(p, &root)) {
                    pending.insert(name, now);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        // Flush after every wakeup, not only on timeout.
        let now = Instant::now();
        let ready: Vec<String> = pending
            .iter()
            .filter(|(_, t)| now.duration_since(**t) >= debounce)
            .map(|(name, _)| name.clone())
            .collect();
        for name in ready {
            pending.remove(&name);
            if tx.send(name).is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}
