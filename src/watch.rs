use std::path::Path;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Creates a watcher for the task store file and returns a receiver for
/// change events. The watcher must be kept alive for events to be received.
///
/// The store is replaced by renaming a temp file over it, so we watch the
/// parent directory and keep only events that name the store file itself.
pub fn watch_store(store_path: &Path) -> Result<(RecommendedWatcher, Receiver<()>)> {
    let (tx, rx) = mpsc::channel();

    let store_filename = store_path
        .file_name()
        .map(|f| f.to_os_string())
        .unwrap_or_default();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(event) = res {
            // Reads of the store (ours included) must not wake anyone.
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            let touches_store = event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(store_filename.as_os_str()));
            if touches_store {
                let _ = tx.send(());
            }
        }
    })
    .context("failed to create file watcher")?;

    let watch_path = match store_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(watch_path)
        .with_context(|| format!("failed to create directory {}", watch_path.display()))?;
    watcher
        .watch(watch_path, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", watch_path.display()))?;

    Ok((watcher, rx))
}

/// Waits for a store change event with timeout.
/// Returns true if an event was received, false on timeout.
pub fn wait_for_change(rx: &Receiver<()>, timeout: Duration) -> bool {
    rx.recv_timeout(timeout).is_ok()
}

/// Drains any pending events from the receiver.
pub fn drain_events(rx: &Receiver<()>) {
    while rx.try_recv().is_ok() {}
}
