//! Immutable, fully merged configuration

use super::{ConfigError, ConfigResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

/// Normalized mapping produced by every parser and map-based provider
pub type ConfigMap = serde_json::Map<String, Value>;

/// What a single source contributed to a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMetadata {
    /// Position of the source in the configured list
    pub index: usize,
    /// Provider name
    pub provider: String,
    /// Parser name, `None` for map-based sources
    pub format: Option<String>,
    /// Raw content length for byte-based sources
    pub size: Option<usize>,
    /// Number of top-level keys decoded from the source
    pub keys: usize,
    /// Whether placeholders were expanded before decoding
    pub substituted: bool,
}

/// The resolved configuration produced by one successful load pass
///
/// A snapshot is never mutated after it is published; reloads build a new
/// one and swap it in.
#[derive(Debug, Clone)]
pub struct Snapshot {
    data: Value,
    generation: u64,
    loaded_at: DateTime<Utc>,
    sources: Vec<SourceMetadata>,
}

impl Snapshot {
    pub(crate) fn new(data: ConfigMap, generation: u64, sources: Vec<SourceMetadata>) -> Self {
        Self {
            data: Value::Object(data),
            generation,
            loaded_at: Utc::now(),
            sources,
        }
    }

    /// An empty snapshot with generation 0
    pub fn empty() -> Self {
        Self::new(ConfigMap::new(), 0, Vec::new())
    }

    /// Number of successful loads that led to this snapshot
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When this snapshot was built
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Per-source metadata, in merge order
    pub fn sources(&self) -> &[SourceMetadata] {
        &self.sources
    }

    /// Whether the snapshot contains no keys at all
    pub fn is_empty(&self) -> bool {
        self.data.as_object().is_none_or(serde_json::Map::is_empty)
    }

    /// Get configuration value by path
    pub fn get<T>(&self, path: &str) -> ConfigResult<T>
    where
        T: DeserializeOwned,
    {
        let value = get_nested_value(&self.data, path)?;
        T::deserialize(value)
            .map_err(|e| ConfigError::type_error(e, std::any::type_name::<T>()))
    }

    /// Get entire configuration as typed value
    pub fn get_all<T>(&self) -> ConfigResult<T>
    where
        T: DeserializeOwned,
    {
        self.get("")
    }

    /// Get configuration value by path with default
    pub fn get_or<T>(&self, path: &str, default: T) -> T
    where
        T: DeserializeOwned,
    {
        self.get(path).unwrap_or(default)
    }

    /// Try to get configuration value by path, returning None on error
    pub fn get_opt<T>(&self, path: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        self.get(path).ok()
    }

    /// Check if configuration has a path
    pub fn has(&self, path: &str) -> bool {
        get_nested_value(&self.data, path).is_ok()
    }

    /// Get all configuration keys at a path
    pub fn keys(&self, path: Option<&str>) -> ConfigResult<Vec<String>> {
        let path = path.unwrap_or_default();
        match get_nested_value(&self.data, path)? {
            Value::Object(obj) => Ok(obj.keys().cloned().collect()),
            other => Err(ConfigError::path_error(
                format!("expected an object, found {}", json_type_name(other)),
                path,
            )),
        }
    }

    /// Get raw JSON value at path
    pub fn get_raw(&self, path: Option<&str>) -> ConfigResult<Value> {
        get_nested_value(&self.data, path.unwrap_or_default()).cloned()
    }

    /// Borrow the whole tree
    pub fn as_value(&self) -> &Value {
        &self.data
    }

    /// Get all configuration as flat key-value map
    pub fn flatten(&self) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        flatten_into("", &self.data, &mut map);
        map
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Get nested value from JSON using dot notation
fn get_nested_value<'a>(value: &'a Value, path: &str) -> ConfigResult<&'a Value> {
    if path.is_empty() {
        return Ok(value);
    }

    let mut current = value;

    for part in path.split('.') {
        match current {
            Value::Object(obj) => {
                current = obj.get(part).ok_or_else(|| {
                    ConfigError::path_error(format!("key '{part}' not found"), path)
                })?;
            }
            Value::Array(arr) => {
                let index: usize = part.parse().map_err(|_| {
                    ConfigError::path_error(format!("invalid array index '{part}'"), path)
                })?;
                current = arr.get(index).ok_or_else(|| {
                    ConfigError::path_error(
                        format!("array index {index} out of bounds (size: {})", arr.len()),
                        path,
                    )
                })?;
            }
            _ => {
                return Err(ConfigError::path_error(
                    format!("cannot index into {} with '{part}'", json_type_name(current)),
                    path,
                ));
            }
        }
    }

    Ok(current)
}

/// Get human-readable type name for a JSON value
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Deep-merge `source` into `target`
///
/// Objects merge key-wise; for every other combination the value from
/// `source` replaces the one in `target`.
pub fn merge_json(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_obj), Value::Object(source_obj)) => {
            merge_map(target_obj, source_obj);
        }
        (target, source) => {
            *target = source;
        }
    }
}

/// Deep-merge `source` into `target`, later keys winning
pub fn merge_map(target: &mut ConfigMap, source: ConfigMap) {
    for (key, value) in source {
        if let Some(existing) = target.get_mut(&key) {
            merge_json(existing, value);
        } else {
            target.insert(key, value);
        }
    }
}

/// Flatten serde_json::Value into a map with dot-notation keys
fn flatten_into(prefix: &str, value: &Value, map: &mut HashMap<String, Value>) {
    match value {
        Value::Object(obj) => {
            for (key, val) in obj {
                let full_key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(&full_key, val, map);
            }
        }
        Value::Array(arr) => {
            for (index, val) in arr.iter().enumerate() {
                let full_key = if prefix.is_empty() {
                    index.to_string()
                } else {
                    format!("{prefix}[{index}]")
                };
                flatten_into(&full_key, val, map);
            }
        }
        _ => {
            map.insert(prefix.to_string(), value.clone());
        }
    }
}
