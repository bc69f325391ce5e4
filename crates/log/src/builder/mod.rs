//! Logger builder implementation

mod reload;

pub use reload::ReloadHandle;

use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Format};
use crate::error::{LogError, LogResult};
use crate::format::Timer;

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Guard returned by the `init*` functions
///
/// Holds the reload handle when the logger was built with
/// `reloadable = true`. Dropping the guard does not uninstall the global
/// subscriber.
#[derive(Debug, Clone)]
pub struct LoggerGuard {
    reload_handle: Option<ReloadHandle>,
}

/// Applies the display options shared by every output format.
macro_rules! create_fmt_layer {
    ($format:ident, $display:expr) => {{
        tracing_subscriber::fmt::layer()
            .$format()
            .with_writer(std::io::stderr)
            .with_ansi($display.colors)
            .with_target($display.target)
            .with_file($display.source)
            .with_line_number($display.source)
            .with_thread_ids($display.thread_ids)
            .with_thread_names($display.thread_names)
            .with_timer(Timer::new($display.time))
    }};
}

/// Installs `Registry + filter + fmt` as the global default.
macro_rules! try_init_subscriber {
    ($filter_layer:expr, $fmt_layer:expr) => {{
        Registry::default()
            .with($filter_layer)
            .with($fmt_layer)
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized)
    }};
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Build and install the logger
    ///
    /// # Errors
    ///
    /// Returns error if the filter string cannot be parsed or a global
    /// subscriber is already installed.
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = EnvFilter::try_new(&self.config.level)
            .map_err(|e| LogError::Filter(format!("{}: {e}", self.config.level)))?;

        let (filter_layer, reload_handle) =
            reload::create_filter_layer(filter, &self.config.level, self.config.reloadable);

        let display = &self.config.display;
        match self.config.format {
            Format::Pretty => {
                try_init_subscriber!(filter_layer, create_fmt_layer!(pretty, display))?;
            }
            Format::Compact => {
                try_init_subscriber!(filter_layer, create_fmt_layer!(compact, display))?;
            }
            Format::Json => {
                let fmt_layer = create_fmt_layer!(json, display).with_current_span(true);
                try_init_subscriber!(filter_layer, fmt_layer)?;
            }
        }

        Ok(LoggerGuard { reload_handle })
    }
}

impl LoggerGuard {
    pub(crate) fn noop() -> Self {
        Self {
            reload_handle: None,
        }
    }

    /// Handle for swapping the filter at runtime, if enabled
    pub fn reload_handle(&self) -> Option<&ReloadHandle> {
        self.reload_handle.as_ref()
    }
}
