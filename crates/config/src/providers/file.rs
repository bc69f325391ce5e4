//! File-backed provider with change notifications

use crate::core::{ConfigError, ConfigResult, Provider, Watchable};
use crate::watchers::{WatchCallback, WatchEvent, WatchEventKind, WatchLatch, WatchState};
use async_trait::async_trait;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Capacity of the channel between the notify thread and the delivery task
const EVENT_BUFFER: usize = 100;

/// Reads a configuration file and watches it for changes
///
/// The parent directory is watched rather than the file itself, so atomic
/// replacements (write to a temp file, rename over the target) and symlink
/// swaps are both observed. A swap that changes where the path resolves to is
/// reported as [`WatchEventKind::Retargeted`].
///
/// Deleting the file delivers [`ConfigError::SourceRemoved`] and ends the
/// watch.
pub struct FileProvider {
    path: PathBuf,
    latch: Arc<WatchLatch>,
    watcher: Arc<Mutex<Option<RecommendedWatcher>>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for FileProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileProvider")
            .field("path", &self.path)
            .field("state", &self.latch.state())
            .finish_non_exhaustive()
    }
}

impl FileProvider {
    /// Create a provider for `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            latch: Arc::new(WatchLatch::new()),
            watcher: Arc::new(Mutex::new(None)),
            cancel: CancellationToken::new(),
        }
    }

    /// The configured path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absolute path of the watched entry, resolved through its parent
    /// directory only so the entry itself may be a symlink
    fn watch_target(&self) -> ConfigResult<(PathBuf, PathBuf)> {
        let file_name = self.path.file_name().ok_or_else(|| {
            ConfigError::activation_failed(self.name(), "path has no file name")
        })?;

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let parent = std::fs::canonicalize(&parent).map_err(|e| {
            ConfigError::activation_failed(
                self.name(),
                format!("cannot resolve {}: {e}", parent.display()),
            )
        })?;

        let target = parent.join(file_name);
        Ok((parent, target))
    }

    fn activate(&self, callback: WatchCallback) -> ConfigResult<()> {
        let name = self.name();
        let (dir, target) = self.watch_target()?;

        let (tx, rx) = mpsc::channel::<notify::Result<Event>>(EVENT_BUFFER);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if tx.blocking_send(res).is_err() {
                strata_log::trace!("file watch event dropped: delivery task gone");
            }
        })
        .map_err(|e| ConfigError::activation_failed(&name, e))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                ConfigError::activation_failed(&name, format!("failed to watch {}: {e}", dir.display()))
            })?;

        *self.watcher.lock() = Some(watcher);
        strata_log::debug!(provider = %name, path = %target.display(), "watching configuration file");

        let delivery = Delivery {
            name,
            resolved: std::fs::canonicalize(&target).ok(),
            target,
            callback,
            latch: Arc::clone(&self.latch),
            watcher: Arc::clone(&self.watcher),
        };
        tokio::spawn(delivery.run(rx, self.cancel.clone()));
        Ok(())
    }
}

/// State owned by the background task translating notify events
struct Delivery {
    name: String,
    target: PathBuf,
    resolved: Option<PathBuf>,
    callback: WatchCallback,
    latch: Arc<WatchLatch>,
    watcher: Arc<Mutex<Option<RecommendedWatcher>>>,
}

impl Delivery {
    async fn run(mut self, mut rx: mpsc::Receiver<notify::Result<Event>>, cancel: CancellationToken) {
        loop {
            let res = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                res = rx.recv() => res,
            };

            match res {
                Some(Ok(event)) => {
                    if !self.handle(event).await {
                        break;
                    }
                }
                Some(Err(e)) => {
                    strata_log::warn!(provider = %self.name, error = %e, "file watcher error");
                    (self.callback)(Err(ConfigError::watch(&self.name, e))).await;
                }
                None => {
                    (self.callback)(Err(ConfigError::watch(&self.name, "file watcher closed"))).await;
                    break;
                }
            }
        }

        self.latch.terminate();
        self.watcher.lock().take();
        strata_log::debug!(provider = %self.name, "file watch stopped");
    }

    /// Forward one notify event; returns `false` once the watch must end
    async fn handle(&mut self, event: Event) -> bool {
        let touches_target = event.paths.iter().any(|p| p == &self.target);
        let resolved = std::fs::canonicalize(&self.target).ok();
        let retargeted = resolved.is_some() && resolved != self.resolved;
        if resolved.is_some() {
            self.resolved.clone_from(&resolved);
        }

        let kind = match event.kind {
            EventKind::Remove(kind) if touches_target => {
                if self.target.exists() {
                    WatchEventKind::Modified
                } else {
                    strata_log::warn!(provider = %self.name, ?kind, "watched file removed");
                    (self.callback)(Err(ConfigError::removed(
                        &self.name,
                        self.target.display().to_string(),
                    )))
                    .await;
                    return false;
                }
            }
            EventKind::Create(_) if touches_target => WatchEventKind::Created,
            EventKind::Modify(_) if touches_target => WatchEventKind::Modified,
            _ if retargeted => WatchEventKind::Retargeted,
            _ => return true,
        };

        strata_log::trace!(provider = %self.name, ?kind, "file change observed");
        let event = WatchEvent::new(kind, &self.name).with_path(self.target.clone());
        (self.callback)(Ok(event)).await;
        true
    }
}

#[async_trait]
impl Provider for FileProvider {
    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn read_bytes(&self) -> ConfigResult<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| ConfigError::fetch(self.name(), format!("{}: {e}", self.path.display())))
    }

    fn as_watchable(&self) -> Option<&dyn Watchable> {
        Some(self)
    }

    async fn close(&self) -> ConfigResult<()> {
        self.cancel.cancel();
        self.watcher.lock().take();
        if self.latch.state() != WatchState::Unarmed {
            self.latch.terminate();
        }
        Ok(())
    }
}

#[async_trait]
impl Watchable for FileProvider {
    async fn watch(&self, callback: WatchCallback) -> ConfigResult<()> {
        self.latch.arm(&self.name())?;

        self.activate(callback).inspect_err(|e| {
            strata_log::error!(provider = %self.name(), error = %e, "file watch activation failed");
            self.latch.terminate();
        })
    }

    fn watch_state(&self) -> WatchState {
        self.latch.state()
    }
}

impl Drop for FileProvider {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watchers::WatchNotification;
    use futures::FutureExt;
    use std::time::Duration;

    fn channel_callback() -> (WatchCallback, mpsc::UnboundedReceiver<WatchNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: WatchCallback = Arc::new(move |n| {
            let _ = tx.send(n);
            async {}.boxed()
        });
        (callback, rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<WatchNotification>) -> WatchNotification {
        tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("notification in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn reads_file_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        std::fs::write(&path, br#"{"a": 1}"#).unwrap();

        let provider = FileProvider::new(&path);
        assert_eq!(provider.read_bytes().await.unwrap(), br#"{"a": 1}"#);
        assert!(provider.read_map().await.is_err());
    }

    #[tokio::test]
    async fn missing_file_is_a_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileProvider::new(dir.path().join("absent.json"));
        let err = provider.read_bytes().await.unwrap_err();
        assert!(matches!(err, ConfigError::Fetch { .. }));
    }

    #[tokio::test]
    async fn missing_directory_fails_activation() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileProvider::new(dir.path().join("nope").join("app.json"));
        let (callback, _rx) = channel_callback();

        let err = provider.watch(callback).await.unwrap_err();
        assert!(matches!(err, ConfigError::WatchActivationFailed { .. }));
        assert_eq!(provider.watch_state(), WatchState::Terminated);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reports_modification_then_removal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        std::fs::write(&path, b"{}").unwrap();

        let provider = FileProvider::new(&path);
        let (callback, mut rx) = channel_callback();
        provider.watch(callback).await.unwrap();
        assert_eq!(provider.watch_state(), WatchState::Armed);

        std::fs::write(&path, br#"{"a": 2}"#).unwrap();
        let event = next(&mut rx).await.unwrap();
        assert!(event.path.is_some_and(|p| p.ends_with("app.json")));

        std::fs::remove_file(&path).unwrap();
        loop {
            match next(&mut rx).await {
                Ok(_) => continue,
                Err(err) => {
                    assert!(matches!(err, ConfigError::SourceRemoved { .. }));
                    break;
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(provider.watch_state(), WatchState::Terminated);
    }

    #[tokio::test]
    async fn second_watch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        std::fs::write(&path, b"{}").unwrap();

        let provider = FileProvider::new(&path);
        let (callback, _rx) = channel_callback();
        provider.watch(callback.clone()).await.unwrap();

        let err = provider.watch(callback).await.unwrap_err();
        assert!(matches!(err, ConfigError::WatchAlreadyActive { .. }));

        provider.close().await.unwrap();
        assert_eq!(provider.watch_state(), WatchState::Terminated);
    }
}
