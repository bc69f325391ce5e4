//! TOML parser

use super::{into_map, prepare};
use crate::core::{ConfigError, ConfigMap, ConfigResult, Parser};

/// TOML documents, optionally with `${NAME}` placeholders
#[derive(Debug, Clone, Copy)]
pub struct TomlParser {
    substitute_env: bool,
}

impl TomlParser {
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

impl Default for TomlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for TomlParser {
    fn name(&self) -> &'static str {
        "toml"
    }

    fn decode(&self, bytes: &[u8]) -> ConfigResult<ConfigMap> {
        let bytes = prepare(self.substitute_env, bytes)?;
        let decode_err = |e: &dyn std::fmt::Display| ConfigError::decode(self.name(), e);

        let text = std::str::from_utf8(&bytes).map_err(|e| decode_err(&e))?;
        let table: toml::Table = toml::from_str(text).map_err(|e| decode_err(&e))?;
        let value = serde_json::to_value(table).map_err(|e| decode_err(&e))?;
        into_map(self.name(), value)
    }

    fn encode(&self, map: &ConfigMap) -> ConfigResult<Vec<u8>> {
        toml::to_string(map)
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
    fn decodes_tables() {
        let map = TomlParser::new()
            .decode(b"name = \"app\"\n\n[server]\nport = 8080\nhosts = [\"a\", \"b\"]\n")
            .unwrap();
        assert_eq!(
            Value::Object(map),
            json!({"name": "app", "server": {"port": 8080, "hosts": ["a", "b"]}})
        );
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        let err = TomlParser::new().decode(&[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, ConfigError::Decode { ref format, .. } if format == "toml"));
    }

    #[test]
    fn syntax_errors_are_decode_errors() {
        let err = TomlParser::new().decode(b"[server\nport = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Decode { .. }));
    }

    #[test]
    fn nulls_cannot_be_encoded() {
        let mut map = ConfigMap::new();
        map.insert("missing".into(), Value::Null);
        let err = TomlParser::new().encode(&map).unwrap_err();
        assert!(matches!(err, ConfigError::Encode { .. }));
    }

    #[test]
    fn substitutes_before_parsing() {
        let map = TomlParser::new()
            .decode(b"level = \"${STRATA_TEST_TOML_UNSET:info}\"\n")
            .unwrap();
        assert_eq!(map["level"], json!("info"));
    }
}
