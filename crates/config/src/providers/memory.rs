//! In-memory byte provider with scriptable change notifications

use crate::core::{ConfigError, ConfigResult, Provider, Watchable};
use crate::watchers::{
    WatchCallback, WatchEvent, WatchEventKind, WatchLatch, WatchNotification, WatchState,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct Content {
    bytes: Option<Vec<u8>>,
    failing_reads: usize,
    failure: String,
}

/// Byte provider backed by a buffer the application controls
///
/// Every [`set`](Self::set) publishes a change notification once watched;
/// [`remove`](Self::remove) and [`notify_error`](Self::notify_error) deliver
/// failures instead. Useful for embedding configuration that is edited at
/// runtime and for exercising reload paths in tests.
#[derive(Debug)]
pub struct MemoryProvider {
    name: String,
    content: RwLock<Content>,
    latch: WatchLatch,
    sender: Mutex<Option<mpsc::UnboundedSender<WatchNotification>>>,
    cancel: CancellationToken,
}

impl MemoryProvider {
    /// Create a provider holding `content`
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: RwLock::new(Content {
                bytes: Some(content.into()),
                ..Content::default()
            }),
            latch: WatchLatch::new(),
            sender: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the content and notify the watcher
    pub fn set(&self, content: impl Into<Vec<u8>>) {
        self.content.write().bytes = Some(content.into());
        self.send(Ok(WatchEvent::new(WatchEventKind::Modified, &self.name)));
    }

    /// Drop the content; reads fail until the next [`set`](Self::set)
    pub fn remove(&self) {
        self.content.write().bytes = None;
        self.send(Err(ConfigError::removed(&self.name, "content")));
    }

    /// Deliver a watch error without touching the content
    pub fn notify_error(&self, message: impl ToString) {
        self.send(Err(ConfigError::watch(&self.name, message)));
    }

    /// Make the next `count` reads fail with `message`
    pub fn fail_next_reads(&self, count: usize, message: impl Into<String>) {
        let mut content = self.content.write();
        content.failing_reads = count;
        content.failure = message.into();
    }

    fn send(&self, notification: WatchNotification) {
        if let Some(tx) = self.sender.lock().as_ref()
            && tx.send(notification).is_err()
        {
            strata_log::debug!(provider = %self.name, "memory watch delivery stopped");
        }
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn read_bytes(&self) -> ConfigResult<Vec<u8>> {
        let mut content = self.content.write();
        if content.failing_reads > 0 {
            content.failing_reads -= 1;
            return Err(ConfigError::fetch(&self.name, &content.failure));
        }

        content
            .bytes
            .clone()
            .ok_or_else(|| ConfigError::fetch(&self.name, "content was removed"))
    }

    fn as_watchable(&self) -> Option<&dyn Watchable> {
        Some(self)
    }

    async fn close(&self) -> ConfigResult<()> {
        self.cancel.cancel();
        self.sender.lock().take();
        if self.latch.state() == WatchState::Armed {
            self.latch.terminate();
        }
        Ok(())
    }
}

#[async_trait]
impl Watchable for MemoryProvider {
    async fn watch(&self, callback: WatchCallback) -> ConfigResult<()> {
        self.latch.arm(&self.name)?;

        let (tx, mut rx) = mpsc::unbounded_channel::<WatchNotification>();
        *self.sender.lock() = Some(tx);

        let cancel = self.cancel.clone();
        let name = self.name.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    notification = rx.recv() => match notification {
                        Some(notification) => callback(notification).await,
                        None => break,
                    },
                }
            }
            strata_log::debug!(provider = %name, "memory watch task finished");
        });

        strata_log::debug!(provider = %self.name, "memory watch armed");
        Ok(())
    }

    fn watch_state(&self) -> WatchState {
        self.latch.state()
    }
}

impl Drop for MemoryProvider {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
