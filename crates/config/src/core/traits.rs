//! Core traits for configuration system

use super::{ConfigError, ConfigMap, ConfigResult};
use crate::watchers::{WatchCallback, WatchState};
use async_trait::async_trait;

/// A backend supplying raw configuration content
///
/// A provider implements at least one of [`read_bytes`](Provider::read_bytes)
/// or [`read_map`](Provider::read_map); the other keeps its default, which
/// fails with [`ConfigError::UnsupportedOperation`] naming the concrete type.
///
/// Content returned by `read_map` is used as-is: it never passes through the
/// `${NAME}` substitution pass, which only runs on byte content inside a
/// parser.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human readable name used in logs and errors
    fn name(&self) -> String;

    /// Read the raw bytes of the configuration document
    async fn read_bytes(&self) -> ConfigResult<Vec<u8>> {
        Err(ConfigError::unsupported(short_type_name::<Self>(), "read_bytes"))
    }

    /// Read a ready-made mapping
    async fn read_map(&self) -> ConfigResult<ConfigMap> {
        Err(ConfigError::unsupported(short_type_name::<Self>(), "read_map"))
    }

    /// Capability query: the watch interface, if this provider supports it
    fn as_watchable(&self) -> Option<&dyn Watchable> {
        None
    }

    /// Release watch resources
    ///
    /// Closing a provider that never watched is a no-op.
    async fn close(&self) -> ConfigResult<()> {
        Ok(())
    }
}

/// Providers able to report changes asynchronously
///
/// `watch` returns once the subscription is established; every notification
/// after that is delivered from a task owned by the provider. The callback
/// may therefore run concurrently with callbacks of other providers.
#[async_trait]
pub trait Watchable: Send + Sync {
    /// Start delivering change notifications to `callback`
    ///
    /// May be invoked at most once per instance; later calls fail with
    /// [`ConfigError::WatchAlreadyActive`] without subscribing again.
    async fn watch(&self, callback: WatchCallback) -> ConfigResult<()>;

    /// Current position in the watch lifecycle
    fn watch_state(&self) -> WatchState;
}

/// Format-specific decoder/encoder between bytes and a mapping
pub trait Parser: Send + Sync {
    /// Format name, e.g. `"json"`
    fn name(&self) -> &'static str;

    /// Decode bytes into a mapping
    ///
    /// Implementations run the substitution pass before parsing unless they
    /// were built in raw mode.
    fn decode(&self, bytes: &[u8]) -> ConfigResult<ConfigMap>;

    /// Encode a mapping back into bytes
    fn encode(&self, map: &ConfigMap) -> ConfigResult<Vec<u8>>;

    /// Whether `decode` expands placeholders
    fn substitutes(&self) -> bool {
        true
    }
}

/// Last path segment of a type name, e.g. `FileProvider`
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
