//! # Strata Log
//!
//! Logging setup shared by the strata crates.
//!
//! Library code emits events through the re-exported `tracing` macros and
//! never installs a subscriber itself. Binaries and tests pick a [`Config`]
//! and call one of the `init*` functions once.
//!
//! ```rust,no_run
//! use strata_log::prelude::*;
//!
//! fn main() -> LogResult<()> {
//!     let _guard = strata_log::auto_init()?;
//!     info!(sources = 3, "configuration loaded");
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod config;
mod error;
mod format;

pub use builder::{LoggerBuilder, LoggerGuard, ReloadHandle};
pub use config::{Config, DisplayConfig, Format};
pub use error::{LogError, LogResult};

// Re-export tracing macros
pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Config, Format, Level, LogError, LogResult, LoggerGuard, auto_init, debug, error, info,
        init, init_with, trace, warn,
    };
}

/// Auto-detect and initialize the best logging configuration
///
/// `STRATA_LOG` or `RUST_LOG` in the environment selects [`Config::from_env`];
/// otherwise debug builds get [`Config::development`] and release builds
/// [`Config::production`].
pub fn auto_init() -> LogResult<LoggerGuard> {
    if std::env::var("STRATA_LOG").is_ok() || std::env::var("RUST_LOG").is_ok() {
        init_with(Config::from_env())
    } else if cfg!(debug_assertions) {
        init_with(Config::development())
    } else {
        init_with(Config::production())
    }
}

/// Initialize with default configuration
pub fn init() -> LogResult<LoggerGuard> {
    init_with(Config::default())
}

/// Initialize with custom configuration
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}

/// Initialize for tests
///
/// Safe to call from every test: when a global subscriber is already
/// installed a no-op guard is returned instead of an error.
pub fn init_test() -> LogResult<LoggerGuard> {
    if tracing::dispatcher::has_been_set() {
        return Ok(LoggerGuard::noop());
    }
    match init_with(Config::test()) {
        Err(LogError::AlreadyInitialized) => Ok(LoggerGuard::noop()),
        other => other,
    }
}
