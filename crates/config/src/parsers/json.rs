//! JSON parser

use super::{into_map, prepare};
use crate::core::{ConfigError, ConfigMap, ConfigResult, Parser};
use serde_json::Value;

/// JSON documents, optionally with `${NAME}` placeholders
#[derive(Debug, Clone, Copy)]
pub struct JsonParser {
    substitute_env: bool,
}

impl JsonParser {
    /// Parser that expands placeholders before decoding
    pub fn new() -> Self {
        Self {
            substitute_env: true,
        }
    }

    /// Parser that decodes the bytes untouched
    pub fn raw() -> Self {
        Self {
            substitute_env: false,
        }
    }
}

impl Default for JsonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for JsonParser {
    fn name(&self) -> &'static str {
        "json"
    }

    fn decode(&self, bytes: &[u8]) -> ConfigResult<ConfigMap> {
        let bytes = prepare(self.substitute_env, bytes)?;
        let value: Value =
            serde_json::from_slice(&bytes).map_err(|e| ConfigError::decode(self.name(), e))?;
        into_map(self.name(), value)
    }

    fn encode(&self, map: &ConfigMap) -> ConfigResult<Vec<u8>> {
        serde_json::to_vec_pretty(map).map_err(|e| ConfigError::encode(self.name(), e))
    }

    fn substitutes(&self) -> bool {
        self.substitute_env
    }
}
