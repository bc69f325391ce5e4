//! Core configuration functionality

pub mod builder;
pub mod config;
pub mod error;
pub mod result;
pub mod snapshot;
pub mod source;
pub mod traits;

pub use builder::{ConfigBuilder, DEFAULTS_PROVIDER};
pub use config::Config;
pub(crate) use config::ConfigInner;
pub use error::{ConfigError, ErrorCategory};
pub use result::{ConfigResult, ConfigResultExt};
pub use snapshot::{ConfigMap, Snapshot, SourceMetadata, merge_json, merge_map};
pub(crate) use snapshot::json_type_name;
pub use source::Source;
pub use traits::{Parser, Provider, Watchable};
