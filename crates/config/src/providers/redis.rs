//! Redis string key as a byte provider
//!
//! Change detection relies on keyspace notifications, so the server must be
//! configured with `notify-keyspace-events` including `K` and the event
//! classes of interest (e.g. `KA`).

use crate::core::{ConfigError, ConfigResult, Provider, Watchable};
use crate::watchers::{WatchCallback, WatchEvent, WatchEventKind, WatchLatch, WatchState};
use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::DEFAULT_SYNC_TIMEOUT;

/// Reads one Redis key and watches it through keyspace notifications
pub struct RedisProvider {
    client: redis::Client,
    key: String,
    db: i64,
    sync_timeout: Duration,
    latch: Arc<WatchLatch>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for RedisProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisProvider")
            .field("key", &self.key)
            .field("db", &self.db)
            .field("state", &self.latch.state())
            .finish_non_exhaustive()
    }
}

impl RedisProvider {
    /// Create a provider for `key` on the server at `url`
    pub fn new(url: &str, key: impl Into<String>) -> ConfigResult<Self> {
        let client = redis::Client::open(url).map_err(|e| ConfigError::fetch("redis", e))?;
        Ok(Self {
            client,
            key: key.into(),
            db: database_from_url(url),
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
            latch: Arc::new(WatchLatch::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Deadline for the subscription handshake performed by `watch`
    #[must_use]
    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    /// Keyspace channel carrying events for the configured key
    fn channel(&self) -> String {
        format!("__keyspace@{}__:{}", self.db, self.key)
    }
}

/// Database index from the URL path, `0` when absent
fn database_from_url(url: &str) -> i64 {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .split_once("://")
        .and_then(|(_, rest)| rest.split_once('/'))
        .and_then(|(_, db)| db.parse().ok())
        .unwrap_or(0)
}

/// Map a keyspace event name to a notification
fn classify(provider: &str, key: &str, operation: &str) -> Option<ConfigResult<WatchEvent>> {
    match operation {
        "del" | "expired" | "evicted" => Some(Err(ConfigError::removed(provider, key))),
        "set" | "setrange" | "append" | "rename_to" | "restore" => Some(Ok(
            WatchEvent::new(WatchEventKind::Modified, provider).with_key(key),
        )),
        "expire" | "persist" => None,
        other => Some(Ok(WatchEvent::new(WatchEventKind::Other(other.to_string()), provider)
            .with_key(key))),
    }
}

#[async_trait]
impl Provider for RedisProvider {
    fn name(&self) -> String {
        format!("redis:{}", self.key)
    }

    async fn read_bytes(&self) -> ConfigResult<Vec<u8>> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ConfigError::fetch(self.name(), e))?;

        let value: Option<Vec<u8>> = conn
            .get(&self.key)
            .await
            .map_err(|e| ConfigError::fetch(self.name(), e))?;

        value.ok_or_else(|| ConfigError::fetch(self.name(), format!("key '{}' not found", self.key)))
    }

    fn as_watchable(&self) -> Option<&dyn Watchable> {
        Some(self)
    }

    async fn close(&self) -> ConfigResult<()> {
        self.cancel.cancel();
        if self.latch.state() != WatchState::Unarmed {
            self.latch.terminate();
        }
        Ok(())
    }
}

#[async_trait]
impl Watchable for RedisProvider {
    async fn watch(&self, callback: WatchCallback) -> ConfigResult<()> {
        let name = self.name();
        self.latch.arm(&name)?;

        let channel = self.channel();
        let subscribe = async {
            let mut pubsub = self.client.get_async_pubsub().await?;
            pubsub.psubscribe(&channel).await?;
            Ok::<_, redis::RedisError>(pubsub)
        };

        let pubsub = match tokio::time::timeout(self.sync_timeout, subscribe).await {
            Ok(Ok(pubsub)) => pubsub,
            Ok(Err(e)) => {
                self.latch.terminate();
                return Err(ConfigError::activation_failed(&name, e));
            }
            Err(_) => {
                self.latch.terminate();
                return Err(ConfigError::sync_timeout(&name, self.sync_timeout));
            }
        };
        strata_log::debug!(provider = %name, channel = %channel, "subscribed to keyspace events");

        let key = self.key.clone();
        let latch = Arc::clone(&self.latch);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            loop {
                let msg = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    msg = messages.next() => msg,
                };

                let Some(msg) = msg else {
                    callback(Err(ConfigError::watch(&name, "keyspace subscription closed"))).await;
                    break;
                };

                let operation: String = match msg.get_payload() {
                    Ok(op) => op,
                    Err(e) => {
                        callback(Err(ConfigError::watch(&name, e))).await;
                        continue;
                    }
                };

                if let Some(notification) = classify(&name, &key, &operation) {
                    callback(notification).await;
                }
            }
            latch.terminate();
            strata_log::debug!(provider = %name, "redis watch stopped");
        });

        Ok(())
    }

    fn watch_state(&self) -> WatchState {
        self.latch.state()
    }
}

impl Drop for RedisProvider {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watchers::WatchNotification;
    use futures::FutureExt;

    #[test]
    fn channel_targets_key_in_database() {
        let provider = RedisProvider::new("redis://127.0.0.1:6379/3", "app:config").unwrap();
        assert_eq!(provider.channel(), "__keyspace@3__:app:config");
        assert_eq!(provider.name(), "redis:app:config");
    }

    #[test]
    fn database_defaults_to_zero() {
        assert_eq!(database_from_url("redis://localhost"), 0);
        assert_eq!(database_from_url("redis://localhost/"), 0);
        assert_eq!(database_from_url("redis://:pw@localhost:6379/7?protocol=resp3"), 7);
    }

    #[test]
    fn deletions_are_removals_and_writes_are_changes() {
        let removed = classify("redis:k", "k", "del").unwrap().unwrap_err();
        assert!(removed.is_removal());

        let event = classify("redis:k", "k", "set").unwrap().unwrap();
        assert_eq!(event.kind, WatchEventKind::Modified);
        assert_eq!(event.key.as_deref(), Some("k"));

        assert!(classify("redis:k", "k", "expire").is_none());
    }

    #[tokio::test]
    async fn unreachable_server_fails_activation() {
        let provider = RedisProvider::new("redis://127.0.0.1:1/0", "k")
            .unwrap()
            .with_sync_timeout(Duration::from_secs(2));
        let callback: WatchCallback = Arc::new(|_: WatchNotification| async {}.boxed());

        let err = provider.watch(callback).await.unwrap_err();
        assert!(matches!(
            err,
            ConfigError::WatchActivationFailed { .. } | ConfigError::CacheSyncTimeout { .. }
        ));
        assert_eq!(provider.watch_state(), WatchState::Terminated);
    }
}
