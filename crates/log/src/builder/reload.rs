//! Reload logic for runtime filter changes

use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, Registry, layer::Layer};

use crate::error::{LogError, LogResult};

/// Handle for runtime filter changes
#[derive(Clone)]
pub struct ReloadHandle {
    filter: tracing_subscriber::reload::Handle<EnvFilter, Registry>,
    /// Current filter string, lock-free reads via ArcSwap
    current_filter: Arc<ArcSwap<String>>,
}

impl ReloadHandle {
    /// Reload the log filter at runtime
    ///
    /// The new directive string is parsed first; on failure the active
    /// filter stays in place.
    pub fn reload(&self, filter: &str) -> LogResult<()> {
        let new_filter =
            EnvFilter::try_new(filter).map_err(|e| LogError::Filter(format!("{filter}: {e}")))?;
        self.filter
            .reload(new_filter)
            .map_err(|e| LogError::Config(format!("failed to reload filter: {e}")))?;
        self.current_filter.store(Arc::new(filter.to_string()));
        Ok(())
    }

    /// Get the current filter string
    pub fn current_filter(&self) -> Arc<String> {
        self.current_filter.load_full()
    }
}

impl std::fmt::Debug for ReloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadHandle")
            .field("current_filter", &self.current_filter.load())
            .finish_non_exhaustive()
    }
}

/// Create a filter layer, optionally wrapping it in a reloadable layer
pub(super) fn create_filter_layer(
    filter: EnvFilter,
    level_str: &str,
    reloadable: bool,
) -> (
    Box<dyn Layer<Registry> + Send + Sync + 'static>,
    Option<ReloadHandle>,
) {
    if reloadable {
        let (layer, handle) = tracing_subscriber::reload::Layer::new(filter);
        let reload_handle = ReloadHandle {
            filter: handle,
            current_filter: Arc::new(ArcSwap::from_pointee(level_str.to_string())),
        };
        (Box::new(layer), Some(reload_handle))
    } else {
        (Box::new(filter), None)
    }
}
