//! Kubernetes ConfigMap providers
//!
//! [`ConfigMapProvider`] exposes a ConfigMap's `data` as a flat mapping of
//! strings. [`ConfigMapFileProvider`] serves one key of it as a document,
//! to be decoded by a parser.
//!
//! Both watch the ConfigMap through a field-selected watcher. `watch` only
//! returns once the watcher's initial list has completed; if that does not
//! happen within the sync timeout, activation fails with
//! [`ConfigError::CacheSyncTimeout`].

use crate::core::{ConfigError, ConfigMap, ConfigResult, Provider, Watchable};
use crate::watchers::{
    WatchCallback, WatchEvent, WatchEventKind, WatchLatch, WatchNotification, WatchState,
};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use k8s_openapi::api::core::v1::ConfigMap as KubeConfigMap;
use kube::runtime::watcher::Event;
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::DEFAULT_SYNC_TIMEOUT;

type EventStream = BoxStream<'static, Result<Event<KubeConfigMap>, watcher::Error>>;

/// Watch machinery shared by both ConfigMap providers
struct ConfigMapWatch {
    api: Api<KubeConfigMap>,
    namespace: String,
    name: String,
    sync_timeout: Duration,
    latch: Arc<WatchLatch>,
    cancel: CancellationToken,
}

impl ConfigMapWatch {
    fn new(client: Client, namespace: String, name: String) -> Self {
        Self {
            api: Api::namespaced(client, &namespace),
            namespace,
            name,
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
            latch: Arc::new(WatchLatch::new()),
            cancel: CancellationToken::new(),
        }
    }

    fn resource(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    async fn get(&self, provider: &str) -> ConfigResult<KubeConfigMap> {
        self.api
            .get(&self.name)
            .await
            .map_err(|e| ConfigError::fetch(provider, format!("configmap {}: {e}", self.resource())))
    }

    async fn start(&self, provider: String, callback: WatchCallback) -> ConfigResult<()> {
        self.latch.arm(&provider)?;

        let config = watcher::Config::default().fields(&format!("metadata.name={}", self.name));
        let mut stream: EventStream = watcher(self.api.clone(), config)
            .default_backoff()
            .boxed();

        match tokio::time::timeout(self.sync_timeout, initial_list(&provider, &mut stream)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.latch.terminate();
                return Err(e);
            }
            Err(_) => {
                self.latch.terminate();
                return Err(ConfigError::sync_timeout(&provider, self.sync_timeout));
            }
        }
        strata_log::debug!(provider = %provider, resource = %self.resource(), "configmap watch synced");

        let resource = self.resource();
        let latch = Arc::clone(&self.latch);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    next = stream.next() => next,
                };

                match next {
                    Some(Ok(event)) => {
                        callback(classify(&provider, &resource, &event)).await;
                    }
                    Some(Err(e)) => {
                        strata_log::warn!(provider = %provider, error = %e, "configmap watcher error");
                        callback(Err(ConfigError::watch(&provider, e))).await;
                    }
                    None => {
                        callback(Err(ConfigError::watch(&provider, "configmap watcher closed")))
                            .await;
                        break;
                    }
                }
            }
            latch.terminate();
            strata_log::debug!(provider = %provider, "configmap watch stopped");
        });

        Ok(())
    }

    fn close(&self) {
        self.cancel.cancel();
        if self.latch.state() != WatchState::Unarmed {
            self.latch.terminate();
        }
    }
}

impl Drop for ConfigMapWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Drain events until the first full listing has been received
async fn initial_list(provider: &str, stream: &mut EventStream) -> ConfigResult<()> {
    loop {
        match stream.next().await {
            Some(Ok(Event::Restarted(_))) => return Ok(()),
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                strata_log::debug!(provider = %provider, error = %e, "configmap list failed, retrying");
            }
            None => {
                return Err(ConfigError::activation_failed(
                    provider,
                    "configmap watcher ended before the initial list",
                ));
            }
        }
    }
}

/// Map a watcher event to a notification
fn classify(provider: &str, resource: &str, event: &Event<KubeConfigMap>) -> WatchNotification {
    let changed = || Ok(WatchEvent::new(WatchEventKind::Modified, provider).with_key(resource));

    match event {
        Event::Applied(_) => changed(),
        Event::Deleted(_) => Err(ConfigError::removed(provider, resource)),
        // A relist after the watch fell behind; an empty list means the
        // ConfigMap disappeared in the meantime.
        Event::Restarted(objects) if objects.is_empty() => {
            Err(ConfigError::removed(provider, resource))
        }
        Event::Restarted(_) => changed(),
    }
}

fn data_to_map(config_map: KubeConfigMap) -> ConfigMap {
    config_map
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect()
}

fn file_bytes(config_map: KubeConfigMap, key: &str) -> Option<Vec<u8>> {
    let KubeConfigMap {
        data, binary_data, ..
    } = config_map;

    data.and_then(|mut d| d.remove(key))
        .map(String::into_bytes)
        .or_else(|| binary_data.and_then(|mut d| d.remove(key)).map(|b| b.0))
}

/// All keys of a ConfigMap's `data`, as string values
///
/// Values are used verbatim; placeholders are not expanded.
pub struct ConfigMapProvider {
    watch: ConfigMapWatch,
}

impl ConfigMapProvider {
    /// Create a provider for ConfigMap `name` in `namespace`
    pub fn new(client: Client, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            watch: ConfigMapWatch::new(client, namespace.into(), name.into()),
        }
    }

    /// Deadline for the initial list performed by `watch`
    #[must_use]
    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.watch.sync_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for ConfigMapProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigMapProvider")
            .field("resource", &self.watch.resource())
            .field("state", &self.watch.latch.state())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Provider for ConfigMapProvider {
    fn name(&self) -> String {
        format!("configmap:{}", self.watch.resource())
    }

    async fn read_map(&self) -> ConfigResult<ConfigMap> {
        let config_map = self.watch.get(&self.name()).await?;
        Ok(data_to_map(config_map))
    }

    fn as_watchable(&self) -> Option<&dyn Watchable> {
        Some(self)
    }

    async fn close(&self) -> ConfigResult<()> {
        self.watch.close();
        Ok(())
    }
}

#[async_trait]
impl Watchable for ConfigMapProvider {
    async fn watch(&self, callback: WatchCallback) -> ConfigResult<()> {
        self.watch.start(self.name(), callback).await
    }

    fn watch_state(&self) -> WatchState {
        self.watch.latch.state()
    }
}

/// One key of a ConfigMap served as a document
///
/// Text entries (`data`) take precedence over `binaryData` entries with the
/// same key.
pub struct ConfigMapFileProvider {
    watch: ConfigMapWatch,
    key: String,
}

impl ConfigMapFileProvider {
    /// Create a provider for `key` of ConfigMap `name` in `namespace`
    pub fn new(
        client: Client,
        namespace: impl Into<String>,
        name: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            watch: ConfigMapWatch::new(client, namespace.into(), name.into()),
            key: key.into(),
        }
    }

    /// Deadline for the initial list performed by `watch`
    #[must_use]
    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.watch.sync_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for ConfigMapFileProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigMapFileProvider")
            .field("resource", &self.watch.resource())
            .field("key", &self.key)
            .field("state", &self.watch.latch.state())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Provider for ConfigMapFileProvider {
    fn name(&self) -> String {
        format!("configmap:{}:{}", self.watch.resource(), self.key)
    }

    async fn read_bytes(&self) -> ConfigResult<Vec<u8>> {
        let name = self.name();
        let config_map = self.watch.get(&name).await?;
        file_bytes(config_map, &self.key).ok_or_else(|| {
            ConfigError::fetch(
                name,
                format!("key '{}' not found in configmap {}", self.key, self.watch.resource()),
            )
        })
    }

    fn as_watchable(&self) -> Option<&dyn Watchable> {
        Some(self)
    }

    async fn close(&self) -> ConfigResult<()> {
        self.watch.close();
        Ok(())
    }
}

#[async_trait]
impl Watchable for ConfigMapFileProvider {
    async fn watch(&self, callback: WatchCallback) -> ConfigResult<()> {
        self.watch.start(self.name(), callback).await
    }

    fn watch_state(&self) -> WatchState {
        self.watch.latch.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use k8s_openapi::ByteString;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn config_map(data: &[(&str, &str)]) -> KubeConfigMap {
        KubeConfigMap {
            data: Some(
                data.iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ),
            ..KubeConfigMap::default()
        }
    }

    /// A client pointed at a port nothing listens on
    fn offline_client() -> Client {
        let config = kube::Config::new("http://127.0.0.1:1".parse().unwrap());
        Client::try_from(config).unwrap()
    }

    #[test]
    fn data_becomes_string_values() {
        let map = data_to_map(config_map(&[("port", "8080"), ("mode", "${NOT_EXPANDED}")]));
        assert_eq!(
            Value::Object(map),
            json!({"port": "8080", "mode": "${NOT_EXPANDED}"})
        );
        assert!(data_to_map(KubeConfigMap::default()).is_empty());
    }

    #[test]
    fn file_key_prefers_text_over_binary() {
        let mut cm = config_map(&[("app.yaml", "a: 1")]);
        cm.binary_data = Some(BTreeMap::from([
            ("app.yaml".to_string(), ByteString(b"ignored".to_vec())),
            ("app.bson".to_string(), ByteString(vec![5, 0, 0, 0, 0])),
        ]));

        assert_eq!(file_bytes(cm.clone(), "app.yaml"), Some(b"a: 1".to_vec()));
        assert_eq!(file_bytes(cm.clone(), "app.bson"), Some(vec![5, 0, 0, 0, 0]));
        assert_eq!(file_bytes(cm, "missing"), None);
    }

    #[test]
    fn deletions_are_removals_and_applies_are_changes() {
        let event = classify("cm", "ns/app", &Event::Applied(config_map(&[]))).unwrap();
        assert_eq!(event.kind, WatchEventKind::Modified);
        assert_eq!(event.key.as_deref(), Some("ns/app"));

        let removed = classify("cm", "ns/app", &Event::Deleted(config_map(&[]))).unwrap_err();
        assert_eq!(removed, ConfigError::removed("cm", "ns/app"));

        assert!(classify("cm", "ns/app", &Event::Restarted(Vec::new())).unwrap_err().is_removal());
        assert!(classify("cm", "ns/app", &Event::Restarted(vec![config_map(&[])])).is_ok());
    }

    #[tokio::test]
    async fn names_identify_the_resource() {
        let whole = ConfigMapProvider::new(offline_client(), "prod", "app");
        assert_eq!(whole.name(), "configmap:prod/app");

        let file = ConfigMapFileProvider::new(offline_client(), "prod", "app", "app.yaml");
        assert_eq!(file.name(), "configmap:prod/app:app.yaml");
        assert!(file.read_map().await.is_err());
    }

    #[tokio::test]
    async fn unreachable_api_server_is_a_fetch_error() {
        let provider = ConfigMapProvider::new(offline_client(), "prod", "app");
        let err = provider.read_map().await.unwrap_err();
        assert!(matches!(err, ConfigError::Fetch { .. }));
    }

    #[tokio::test]
    async fn unsynced_watch_times_out() {
        let provider = ConfigMapFileProvider::new(offline_client(), "prod", "app", "app.yaml")
            .with_sync_timeout(Duration::from_millis(500));
        let callback: WatchCallback = Arc::new(|_: WatchNotification| async {}.boxed());

        let err = provider.watch(callback.clone()).await.unwrap_err();
        assert!(matches!(err, ConfigError::CacheSyncTimeout { .. }));
        assert_eq!(provider.watch_state(), WatchState::Terminated);

        let again = provider.watch(callback).await.unwrap_err();
        assert!(matches!(again, ConfigError::WatchAlreadyActive { .. }));
    }
}
