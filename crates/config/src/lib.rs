//! Strata Config - live configuration aggregation
//!
//! A [`Config`] is built from an ordered list of [`Source`]s. Each source pairs
//! a [`Provider`] (where the content lives) with an optional [`Parser`] (how
//! its bytes decode into a mapping). Sources are loaded in order and
//! deep-merged, later ones overriding earlier ones, into an immutable
//! [`Snapshot`] that is swapped in atomically.
//!
//! Byte content may reference environment variables as `${NAME}` or
//! `${NAME:default}`; they are expanded before parsing and every unresolved
//! name is reported in a single error.
//!
//! Providers that can detect changes are watched once the initial load has
//! succeeded. A change triggers a full reload; runtime failures go to the
//! reload error callback and the previous snapshot stays in place.
//!
//! # Example
//!
//! ```rust,no_run
//! use strata_config::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> ConfigResult<()> {
//!     let config = ConfigBuilder::new()
//!         .with_defaults_json(serde_json::json!({"server": {"port": 8080}}))
//!         .with_source(Source::bytes(
//!             Arc::new(FileProvider::new("config.yaml")),
//!             YamlParser::new(),
//!         ))
//!         .with_source(Source::map(Arc::new(EnvProvider::with_prefix("APP"))))
//!         .on_config_changed(|| info!("configuration reloaded"))
//!         .on_reload_error(|e| warn!(error = %e, "configuration reload failed"))
//!         .build()
//!         .await?;
//!
//!     let port: u16 = config.get("server.port")?;
//!     info!(port, "listening");
//!     Ok(())
//! }
//! ```

#![deny(unused_must_use)]
#![warn(missing_docs)]

// Core module with main functionality
pub mod core;

// Implementation modules
pub mod parsers;
pub mod providers;
pub mod watchers;

// Re-export main types from core
pub use crate::core::{
    Config, ConfigBuilder, ConfigError, ConfigMap, ConfigResult, ConfigResultExt, ErrorCategory,
    Snapshot, Source, SourceMetadata, merge_json, merge_map,
};

// Re-export traits
pub use crate::core::{Parser, Provider, Watchable};

// Re-export concrete implementations
#[cfg(feature = "bson")]
pub use parsers::BsonParser;
pub use parsers::JsonParser;
#[cfg(feature = "toml")]
pub use parsers::TomlParser;
#[cfg(feature = "yaml")]
pub use parsers::YamlParser;

#[cfg(feature = "kubernetes")]
pub use providers::{ConfigMapFileProvider, ConfigMapProvider};
#[cfg(feature = "mongodb")]
pub use providers::MongoProvider;
#[cfg(feature = "redis")]
pub use providers::RedisProvider;
pub use providers::{DEFAULT_SYNC_TIMEOUT, EnvProvider, FileProvider, MemoryProvider, StaticProvider};

pub use watchers::{WatchCallback, WatchEvent, WatchEventKind, WatchNotification, WatchState};

/// Prelude module for convenient imports
pub mod prelude {
    //! Prelude for common imports
    //!
    //! # Example
    //! ```rust
    //! use strata_config::prelude::*;
    //! ```

    // Core types
    pub use crate::core::{
        Config, ConfigBuilder, ConfigError, ConfigMap, ConfigResult, ConfigResultExt, Snapshot,
        Source,
    };

    pub use strata_log::{debug, error, info, warn};

    // Traits
    pub use crate::core::{Parser, Provider, Watchable};

    // Common parsers
    #[cfg(feature = "bson")]
    pub use crate::parsers::BsonParser;
    pub use crate::parsers::JsonParser;
    #[cfg(feature = "toml")]
    pub use crate::parsers::TomlParser;
    #[cfg(feature = "yaml")]
    pub use crate::parsers::YamlParser;

    // Common providers
    #[cfg(feature = "kubernetes")]
    pub use crate::providers::{ConfigMapFileProvider, ConfigMapProvider};
    #[cfg(feature = "mongodb")]
    pub use crate::providers::MongoProvider;
    #[cfg(feature = "redis")]
    pub use crate::providers::RedisProvider;
    pub use crate::providers::{EnvProvider, FileProvider, MemoryProvider, StaticProvider};

    // Watch types
    pub use crate::watchers::{WatchEvent, WatchEventKind, WatchState};
}

/// Builder pattern helpers
pub mod builders {
    //! Builder utilities for common source layouts

    use crate::core::{ConfigBuilder, ConfigResult, Source};
    use crate::parsers;
    use crate::providers::{EnvProvider, FileProvider};
    use std::path::PathBuf;
    use std::sync::Arc;

    /// A watched file whose parser is picked from its extension
    pub fn file_source(path: impl Into<PathBuf>) -> ConfigResult<Source> {
        let path = path.into();
        let parser = parsers::for_path(&path)?;
        Ok(Source::new(Arc::new(FileProvider::new(path)), Some(parser)))
    }

    /// Create a simple file-based configuration
    pub fn from_file(path: impl Into<PathBuf>) -> ConfigResult<ConfigBuilder> {
        Ok(ConfigBuilder::new().with_source(file_source(path)?))
    }

    /// Create a configuration from environment with prefix
    pub fn from_env_prefix(prefix: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new().with_source(Source::map(Arc::new(EnvProvider::with_prefix(prefix))))
    }

    /// Create a standard application configuration
    /// (config file + environment overrides)
    pub fn standard_app_config(
        config_file: impl Into<PathBuf>,
        env_prefix: impl Into<String>,
    ) -> ConfigResult<ConfigBuilder> {
        Ok(from_file(config_file)?
            .with_source(Source::map(Arc::new(EnvProvider::with_prefix(env_prefix)))))
    }
}
