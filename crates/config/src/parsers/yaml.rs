//! YAML parser

use super::{into_map, prepare};
use crate::core::{ConfigError, ConfigMap, ConfigResult, Parser};

/// YAML documents, optionally with `${NAME}` placeholders
#[derive(Debug, Clone, Copy)]
pub struct YamlParser {
    substitute_env: bool,
}

impl YamlParser {
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

impl Default for YamlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for YamlParser {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn decode(&self, bytes: &[u8]) -> ConfigResult<ConfigMap> {
        let bytes = prepare(self.substitute_env, bytes)?;
        let value: serde_yaml::Value =
            serde_yaml::from_slice(&bytes).map_err(|e| ConfigError::decode(self.name(), e))?;

        // An empty document contributes nothing.
        if value.is_null() {
            return Ok(ConfigMap::new());
        }

        let value = serde_json::to_value(value).map_err(|e| ConfigError::decode(self.name(), e))?;
        into_map(self.name(), value)
    }

    fn encode(&self, map: &ConfigMap) -> ConfigResult<Vec<u8>> {
        serde_yaml::to_string(map)
            .map(String::into_bytes)
            .map_err(|e| ConfigError::encode(self.name(), e))
    }

    fn substitutes(&self) -> bool {
        self.substitute_env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    #[test]
    fn decodes_mappings() {
        let map = YamlParser::new()
            .decode(b"server:\n  port: 8080\n  tls: false\nhosts:\n  - a\n  - b\n")
            .unwrap();
        assert_eq!(
            Value::Object(map),
            json!({"server": {"port": 8080, "tls": false}, "hosts": ["a", "b"]})
        );
    }

    #[test]
    fn empty_document_is_empty_map() {
        assert!(YamlParser::new().decode(b"").unwrap().is_empty());
        assert!(YamlParser::new().decode(b"# only a comment\n").unwrap().is_empty());
    }

    #[test]
    fn scalar_root_is_rejected() {
        let err = YamlParser::new().decode(b"just a string").unwrap_err();
        assert!(matches!(err, ConfigError::Decode { ref format, .. } if format == "yaml"));
    }

    #[test]
    fn substituted_default_is_typed_by_yaml() {
        let map = YamlParser::new()
            .decode(b"port: ${STRATA_TEST_YAML_UNSET_PORT:9090}\n")
            .unwrap();
        assert_eq!(map["port"], json!(9090));
    }
}
