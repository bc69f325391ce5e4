//! BSON parser
//!
//! BSON is length-prefixed, so placeholders cannot be expanded in the raw
//! bytes. The document is decoded first and the substitution pass runs over
//! its relaxed Extended JSON rendering instead.

use super::{into_map, prepare};
use crate::core::{ConfigError, ConfigMap, ConfigResult, Parser};
use bson::{Bson, Document};
use serde_json::Value;

/// BSON documents, optionally with `${NAME}` placeholders in their text
#[derive(Debug, Clone, Copy)]
pub struct BsonParser {
    substitute_env: bool,
}

impl BsonParser {
    /// Parser that expands placeholders after decoding
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

impl Default for BsonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for BsonParser {
    fn name(&self) -> &'static str {
        "bson"
    }

    fn decode(&self, bytes: &[u8]) -> ConfigResult<ConfigMap> {
        let decode_err = |e: &dyn std::fmt::Display| ConfigError::decode(self.name(), e);

        let document: Document = bson::from_slice(bytes).map_err(|e| decode_err(&e))?;
        let value = Bson::Document(document).into_relaxed_extjson();
        if !self.substitute_env {
            return into_map(self.name(), value);
        }

        let text = serde_json::to_vec(&value).map_err(|e| decode_err(&e))?;
        let text = prepare(true, &text)?;
        let value: Value = serde_json::from_slice(&text).map_err(|e| decode_err(&e))?;
        into_map(self.name(), value)
    }

    fn encode(&self, map: &ConfigMap) -> ConfigResult<Vec<u8>> {
        bson::to_vec(map).map_err(|e| ConfigError::encode(self.name(), e))
    }

    fn substitutes(&self) -> bool {
        self.substitute_env
    }
}
