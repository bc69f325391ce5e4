//! Built-in configuration providers

use std::time::Duration;

mod env;
mod file;
#[cfg(feature = "kubernetes")]
mod kubernetes;
mod memory;
#[cfg(feature = "mongodb")]
mod mongo;
#[cfg(feature = "redis")]
mod redis;
mod static_map;

pub use env::EnvProvider;
pub use file::FileProvider;
#[cfg(feature = "kubernetes")]
pub use kubernetes::{ConfigMapFileProvider, ConfigMapProvider};
pub use memory::MemoryProvider;
#[cfg(feature = "mongodb")]
pub use mongo::MongoProvider;
#[cfg(feature = "redis")]
pub use self::redis::RedisProvider;
pub use static_map::StaticProvider;

/// Default deadline for a remote watch to finish its initial handshake
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(10);
