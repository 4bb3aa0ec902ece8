//! Reference file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// A watcher that monitors the labels file for changes.
pub struct ReferenceWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<()>,
}

impl ReferenceWatcher {
    /// Create a new ReferenceWatcher.
    ///
    /// Returns the watcher and a receiver that yields one message per
    /// detected change.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned handle must be kept alive.
    ///
    /// The parent directory is watched so that a file created or replaced
    /// after startup is still noticed.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let target = self.path.clone();
        let file_name = self.path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove();
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if relevant && ours {
                        tracing::info!(path = %target.display(), "Reference file change detected");
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Reference watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_change_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.csv");
        std::fs::write(&path, "prompt,task\n").unwrap();

        let (watcher, mut rx) = ReferenceWatcher::new(&path);
        let _handle = watcher.run().unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(&path, "prompt,task\nfix bug,dev\n").unwrap();

        let got = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await;
        assert!(matches!(got, Ok(Some(()))));
    }
}
