//! Format parsers turning raw bytes into configuration maps
//!
//! Every parser runs [`substitute`] on its input unless built with `raw()`.

#[cfg(feature = "bson")]
mod bson;
mod json;
pub mod substitution;
#[cfg(feature = "toml")]
mod toml;
#[cfg(feature = "yaml")]
mod yaml;

#[cfg(feature = "bson")]
pub use self::bson::BsonParser;
pub use json::JsonParser;
pub use substitution::{substitute, substitute_with};
#[cfg(feature = "toml")]
pub use self::toml::TomlParser;
#[cfg(feature = "yaml")]
pub use yaml::YamlParser;

use crate::core::{ConfigError, ConfigMap, ConfigResult, Parser};
use serde_json::Value;
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

/// Pick a substituting parser from a file extension
pub fn for_path(path: &Path) -> ConfigResult<Arc<dyn Parser>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "json" => Ok(Arc::new(JsonParser::new())),
        #[cfg(feature = "bson")]
        "bson" => Ok(Arc::new(BsonParser::new())),
        #[cfg(feature = "toml")]
        "toml" => Ok(Arc::new(TomlParser::new())),
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => Ok(Arc::new(YamlParser::new())),
        _ => Err(ConfigError::decode(
            if extension.is_empty() { "unknown" } else { extension.as_str() },
            format!("no parser for {}", path.display()),
        )),
    }
}

/// Apply substitution when enabled
fn prepare(substitute_env: bool, bytes: &[u8]) -> ConfigResult<Cow<'_, [u8]>> {
    if substitute_env {
        substitute(bytes)
    } else {
        Ok(Cow::Borrowed(bytes))
    }
}

/// Require a decoded document to be a mapping at the root
fn into_map(format: &str, value: Value) -> ConfigResult<ConfigMap> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ConfigError::decode(
            format,
            format!(
                "expected a mapping at the document root, found {}",
                crate::core::json_type_name(&other)
            ),
        )),
    }
}
