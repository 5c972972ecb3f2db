//! Configuration file watching
//!
//! Watches the directory holding the configuration file rather than the file
//! itself, since editors commonly save by writing a new file and renaming it
//! over the old one.

use crate::domain::{Result, SurgeError};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Quiet period that folds one save's burst of events into one change
const DEBOUNCE: Duration = Duration::from_millis(500);

/// Reports changes to one configuration file
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<()>,
    path: PathBuf,
}

impl ConfigWatcher {
    /// Start watching `path`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file doesn't exist or the
    /// platform watcher can't be started.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().canonicalize().map_err(|e| {
            SurgeError::Configuration(format!(
                "Cannot watch {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let (dir, file_name) = match (path.parent(), path.file_name()) {
            (Some(dir), Some(name)) => (dir.to_path_buf(), name.to_os_string()),
            _ => {
                return Err(SurgeError::Configuration(format!(
                    "Cannot watch {}: not a file",
                    path.display()
                )))
            }
        };

        let (tx, events) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if touches(&event, &file_name) => {
                let _ = tx.send(());
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Configuration watcher error"),
        })
        .map_err(|e| SurgeError::Configuration(format!("Failed to start file watcher: {e}")))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                SurgeError::Configuration(format!("Failed to watch {}: {e}", dir.display()))
            })?;

        tracing::info!(path = %path.display(), "Watching configuration for changes");
        Ok(Self {
            _watcher: watcher,
            events,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the next change to the file
    pub async fn changed(&mut self) {
        if self.events.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(DEBOUNCE).await;
        while self.events.try_recv().is_ok() {}
        tracing::debug!(path = %self.path.display(), "Configuration file changed");
    }
}

fn touches(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rewrite_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surge.toml");
        std::fs::write(&path, "[load]\nbatch_size = 10\n").unwrap();
        let mut watcher = ConfigWatcher::new(&path).unwrap();

        std::fs::write(&path, "[load]\nbatch_size = 20\n").unwrap();

        tokio::time::timeout(Duration::from_secs(5), watcher.changed())
            .await
            .expect("change should be reported");
    }

    #[tokio::test]
    async fn test_other_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surge.toml");
        std::fs::write(&path, "").unwrap();
        let mut watcher = ConfigWatcher::new(&path).unwrap();

        std::fs::write(dir.path().join("notes.txt"), "unrelated").unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), watcher.changed()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_cannot_be_watched() {
        let result = ConfigWatcher::new("/nonexistent/surge.toml");
        assert!(matches!(result, Err(SurgeError::Configuration(_))));
    }
}
