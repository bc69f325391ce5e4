//! Configuration builder

use super::config::{ChangeCallback, ConfigInner, ErrorCallback};
use super::{Config, ConfigError, ConfigResult, Source};
use crate::providers::StaticProvider;
use crate::watchers::WatchOrchestrator;
use serde_json::Value;
use std::sync::Arc;

/// Name of the provider holding builder defaults
pub const DEFAULTS_PROVIDER: &str = "defaults";

/// Configuration builder
///
/// Sources are merged in the order they are added, later ones winning.
/// [`build`](Self::build) performs the initial load and then activates the
/// watch on every watchable provider; a failure in either step is returned
/// and no [`Config`] is produced.
pub struct ConfigBuilder {
    /// Configuration sources
    sources: Vec<Source>,

    /// Default values, merged below every source
    defaults: Option<Value>,

    on_config_changed: Option<ChangeCallback>,
    on_reload_error: Option<ErrorCallback>,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            defaults: None,
            on_config_changed: None,
            on_reload_error: None,
        }
    }

    /// Add a configuration source
    pub fn with_source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }

    /// Add multiple configuration sources
    pub fn with_sources(mut self, sources: impl IntoIterator<Item = Source>) -> Self {
        self.sources.extend(sources);
        self
    }

    /// Set default values
    pub fn with_defaults<T>(mut self, defaults: T) -> ConfigResult<Self>
    where
        T: serde::Serialize,
    {
        let value = serde_json::to_value(defaults).map_err(|e| ConfigError::encode("json", e))?;
        self.defaults = Some(value);
        Ok(self)
    }

    /// Set default values from JSON
    ///
    /// The value must be an object; anything else fails at build time.
    pub fn with_defaults_json(mut self, defaults: Value) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Called after each watch-triggered reload that published a snapshot
    pub fn on_config_changed<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_config_changed = Some(Arc::new(callback));
        self
    }

    /// Called for each watch error and each failed watch-triggered reload
    pub fn on_reload_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ConfigError) + Send + Sync + 'static,
    {
        self.on_reload_error = Some(Arc::new(callback));
        self
    }

    /// Load every source and start watching
    pub async fn build(self) -> ConfigResult<Config> {
        let mut sources = Vec::with_capacity(self.sources.len() + 1);

        match self.defaults {
            Some(Value::Object(map)) => {
                sources.push(Source::map(Arc::new(StaticProvider::new(
                    DEFAULTS_PROVIDER,
                    map,
                ))));
            }
            Some(other) => {
                return Err(ConfigError::decode(
                    "json",
                    format!(
                        "defaults must be an object, found {}",
                        super::json_type_name(&other)
                    ),
                ));
            }
            None => {}
        }
        sources.extend(self.sources);

        let on_config_changed: ChangeCallback = match self.on_config_changed {
            Some(callback) => callback,
            None => Arc::new(|| {}),
        };
        let on_reload_error: ErrorCallback = match self.on_reload_error {
            Some(callback) => callback,
            None => Arc::new(|_: &ConfigError| {}),
        };

        strata_log::info!(sources = sources.len(), "building configuration");

        let inner = Arc::new(ConfigInner::new(sources, on_config_changed, on_reload_error));
        inner.load().await?;

        WatchOrchestrator::new(&inner).activate().await?;

        Ok(Config::from_inner(inner))
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigBuilder")
            .field("sources", &self.sources)
            .field("defaults", &self.defaults.is_some())
            .field("on_config_changed", &self.on_config_changed.is_some())
            .field("on_reload_error", &self.on_reload_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Watchable;
    use crate::parsers::JsonParser;
    use crate::providers::MemoryProvider;
    use crate::watchers::WatchState;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn defaults_sit_below_sources() {
        let config = ConfigBuilder::new()
            .with_defaults_json(json!({"port": 80, "host": "localhost"}))
            .with_source(Source::bytes(
                Arc::new(MemoryProvider::new("mem", r#"{"port": 8080}"#)),
                JsonParser::new(),
            ))
            .build()
            .await
            .unwrap();

        assert_eq!(config.as_value(), json!({"port": 8080, "host": "localhost"}));
        assert_eq!(config.sources()[0].name(), DEFAULTS_PROVIDER);
    }

    #[tokio::test]
    async fn typed_defaults() {
        #[derive(serde::Serialize)]
        struct Defaults {
            retries: u8,
        }

        let config = ConfigBuilder::new()
            .with_defaults(Defaults { retries: 3 })
            .unwrap()
            .build()
            .await
            .unwrap();
        assert_eq!(config.get::<u8>("retries").unwrap(), 3);
    }

    #[tokio::test]
    async fn non_object_defaults_are_rejected() {
        let err = ConfigBuilder::new()
            .with_defaults_json(json!([1, 2]))
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Decode { .. }));
    }

    #[tokio::test]
    async fn no_sources_builds_empty_config() {
        let config = ConfigBuilder::default().build().await.unwrap();
        assert!(config.snapshot().is_empty());
        assert_eq!(config.generation(), 1);
    }

    #[tokio::test]
    async fn initial_load_failure_is_returned() {
        let provider = Arc::new(MemoryProvider::new(
            "mem",
            r#"{"v": "${STRATA_TEST_BUILDER_UNSET}"}"#,
        ));
        let err = ConfigBuilder::new()
            .with_source(Source::bytes(Arc::clone(&provider), JsonParser::new()))
            .build()
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ConfigError::unresolved(vec!["STRATA_TEST_BUILDER_UNSET".into()])
        );
        // Load failed before activation, so nothing was watched.
        assert_eq!(provider.watch_state(), WatchState::Unarmed);
    }
}
