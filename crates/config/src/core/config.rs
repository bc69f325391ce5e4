//! Main configuration container

use super::{ConfigError, ConfigMap, ConfigResult, Snapshot, Source, merge_map};
use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Invoked after every watch-triggered reload that published a snapshot
pub(crate) type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Invoked for every runtime failure: watch errors and failed reloads
pub(crate) type ErrorCallback = Arc<dyn Fn(&ConfigError) + Send + Sync>;

/// State shared between [`Config`] handles and the watch orchestrator
pub(crate) struct ConfigInner {
    pub(crate) sources: Vec<Source>,
    snapshot: ArcSwap<Snapshot>,
    /// Serializes load passes; held for the whole fetch-merge-publish cycle
    reload_lock: tokio::sync::Mutex<()>,
    pub(crate) on_config_changed: ChangeCallback,
    pub(crate) on_reload_error: ErrorCallback,
}

impl ConfigInner {
    pub(crate) fn new(
        sources: Vec<Source>,
        on_config_changed: ChangeCallback,
        on_reload_error: ErrorCallback,
    ) -> Self {
        Self {
            sources,
            snapshot: ArcSwap::from_pointee(Snapshot::empty()),
            reload_lock: tokio::sync::Mutex::new(()),
            on_config_changed,
            on_reload_error,
        }
    }

    /// Fetch every source in order, merge, and publish the result
    ///
    /// Any failure aborts the pass and leaves the published snapshot as it
    /// was. Concurrent callers queue on the reload lock, so passes never
    /// interleave and generations increase by one per published snapshot.
    pub(crate) async fn load(&self) -> ConfigResult<Arc<Snapshot>> {
        let _guard = self.reload_lock.lock().await;

        strata_log::debug!(sources = self.sources.len(), "loading configuration");

        let mut merged = ConfigMap::new();
        let mut metadata = Vec::with_capacity(self.sources.len());

        for (index, source) in self.sources.iter().enumerate() {
            let (map, meta) = source.fetch(index).await.inspect_err(|e| {
                strata_log::warn!(
                    provider = %source.name(),
                    index,
                    error = %e,
                    "failed to load configuration source"
                );
            })?;
            merge_map(&mut merged, map);
            metadata.push(meta);
        }

        let generation = self.snapshot.load().generation() + 1;
        let snapshot = Arc::new(Snapshot::new(merged, generation, metadata));
        self.snapshot.store(Arc::clone(&snapshot));

        strata_log::info!(
            generation,
            keys = snapshot.as_value().as_object().map_or(0, serde_json::Map::len),
            "configuration loaded"
        );
        Ok(snapshot)
    }

    pub(crate) fn current(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }
}

/// Live view over an ordered list of configuration sources
///
/// Cloning is cheap: clones share sources, the published snapshot and the
/// callbacks. Reads never block on a reload in progress; they see the last
/// published snapshot until the new one is swapped in whole.
#[derive(Clone)]
pub struct Config {
    inner: Arc<ConfigInner>,
}

impl Config {
    pub(crate) fn from_inner(inner: Arc<ConfigInner>) -> Self {
        Self { inner }
    }

    /// Re-read every source and publish a new snapshot
    ///
    /// On error nothing is published and the error is returned to the
    /// caller; the reload error callback is reserved for watch-driven
    /// reloads.
    pub async fn load(&self) -> ConfigResult<Arc<Snapshot>> {
        self.inner.load().await
    }

    /// Alias of [`load`](Self::load)
    pub async fn reload(&self) -> ConfigResult<Arc<Snapshot>> {
        self.load().await
    }

    /// The currently published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.current()
    }

    /// Generation of the currently published snapshot
    pub fn generation(&self) -> u64 {
        self.inner.snapshot.load().generation()
    }

    /// Configured sources, lowest precedence first
    pub fn sources(&self) -> &[Source] {
        &self.inner.sources
    }

    /// Get configuration value by path
    pub fn get<T>(&self, path: &str) -> ConfigResult<T>
    where
        T: DeserializeOwned,
    {
        self.inner.snapshot.load().get(path)
    }

    /// Get entire configuration as typed value
    pub fn get_all<T>(&self) -> ConfigResult<T>
    where
        T: DeserializeOwned,
    {
        self.inner.snapshot.load().get_all()
    }

    /// Get configuration value by path with default
    pub fn get_or<T>(&self, path: &str, default: T) -> T
    where
        T: DeserializeOwned,
    {
        self.inner.snapshot.load().get_or(path, default)
    }

    /// Get configuration value by path or compute a default
    pub fn get_or_else<T, F>(&self, path: &str, default_fn: F) -> T
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        self.get(path).unwrap_or_else(|_| default_fn())
    }

    /// Try to get configuration value by path, returning None on error
    pub fn get_opt<T>(&self, path: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        self.inner.snapshot.load().get_opt(path)
    }

    /// Check if configuration has a path
    pub fn has(&self, path: &str) -> bool {
        self.inner.snapshot.load().has(path)
    }

    /// Get all configuration keys at a path
    pub fn keys(&self, path: Option<&str>) -> ConfigResult<Vec<String>> {
        self.inner.snapshot.load().keys(path)
    }

    /// Get raw JSON value at path
    pub fn get_raw(&self, path: Option<&str>) -> ConfigResult<Value> {
        self.inner.snapshot.load().get_raw(path)
    }

    /// Get entire configuration as a JSON value
    pub fn as_value(&self) -> Value {
        self.inner.snapshot.load().as_value().clone()
    }

    /// Get all configuration as flat key-value map
    pub fn flatten(&self) -> HashMap<String, Value> {
        self.inner.snapshot.load().flatten()
    }

    /// Stop every provider's watch
    ///
    /// All providers are closed even if some fail; the first failure is
    /// returned.
    pub async fn close(&self) -> ConfigResult<()> {
        let mut first_error = None;

        for source in &self.inner.sources {
            if let Err(e) = source.provider().close().await {
                strata_log::warn!(provider = %source.name(), error = %e, "failed to close provider");
                first_error.get_or_insert(e);
            }
        }

        strata_log::debug!("configuration providers closed");
        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("sources", &self.inner.sources)
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}
