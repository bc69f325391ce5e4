//! Environment variables as a map-producing provider

use crate::core::{ConfigMap, ConfigResult, Provider};
use async_trait::async_trait;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Where variables are read from
#[derive(Debug, Clone)]
enum VarSource {
    /// `std::env::vars()` at read time
    Process,
    /// A fixed set captured at construction
    Fixed(Vec<(String, String)>),
}

/// Builds a nested mapping out of environment variables
///
/// With prefix `APP` and separator `_`, `APP_SERVER_PORT=8080` becomes
/// `{"server": {"port": 8080}}`. Values are typed: booleans, integers,
/// floats, inline JSON arrays/objects and comma-separated lists are
/// recognised, everything else stays a string.
///
/// The mapping is used verbatim; `${NAME}` placeholders inside values are not
/// expanded.
#[derive(Debug, Clone)]
pub struct EnvProvider {
    prefix: Option<String>,
    separator: String,
    case_sensitive: bool,
    log_sensitive: bool,
    vars: VarSource,
}

impl EnvProvider {
    /// Read every process variable
    pub fn new() -> Self {
        Self {
            prefix: None,
            separator: "_".to_string(),
            case_sensitive: false,
            log_sensitive: false,
            vars: VarSource::Process,
        }
    }

    /// Read only process variables starting with `prefix`
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::new()
        }
    }

    /// Read from a fixed set of variables instead of the process environment
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: VarSource::Fixed(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            ..Self::new()
        }
    }

    /// Restrict to variables starting with `prefix`
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set separator for nested keys
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Set case sensitivity
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Set whether to log sensitive values
    pub fn with_log_sensitive(mut self, log_sensitive: bool) -> Self {
        self.log_sensitive = log_sensitive;
        self
    }

    fn is_sensitive_key(key: &str) -> bool {
        let key_lower = key.to_lowercase();
        ["password", "secret", "token", "api_key", "private", "credential"]
            .iter()
            .any(|marker| key_lower.contains(marker))
    }

    fn all_vars(&self) -> Vec<(String, String)> {
        match &self.vars {
            VarSource::Process => std::env::vars().collect(),
            VarSource::Fixed(vars) => vars.clone(),
        }
    }

    /// Variables under the prefix with the prefix stripped, ordered by key
    ///
    /// A variable only matches when the prefix is followed by the separator,
    /// so `APP` selects `APP_PORT` but not `APPLE_COLOR`.
    fn filter_vars(&self) -> BTreeMap<String, String> {
        let Some(prefix) = &self.prefix else {
            return self.all_vars().into_iter().collect();
        };

        let fold = |s: &str| {
            if self.case_sensitive {
                s.to_string()
            } else {
                s.to_uppercase()
            }
        };
        let separator = fold(&self.separator);
        let prefix = fold(prefix);
        let prefix = prefix.trim_end_matches(separator.as_str());

        self.all_vars()
            .into_iter()
            .filter_map(|(key, value)| {
                let key = fold(&key);
                let stripped = key
                    .strip_prefix(prefix)?
                    .strip_prefix(separator.as_str())?
                    .trim_start_matches(separator.as_str());

                (!stripped.is_empty()).then(|| (stripped.to_string(), value))
            })
            .collect()
    }

    fn normalize_key(&self, key: &str) -> String {
        if self.case_sensitive {
            key.to_string()
        } else {
            key.to_lowercase()
        }
    }

    fn env_to_map(&self, vars: BTreeMap<String, String>) -> ConfigMap {
        let mut result = Map::new();

        for (key, value) in vars {
            if Self::is_sensitive_key(&key) && !self.log_sensitive {
                strata_log::trace!(key = %key, "loading env config: [REDACTED]");
            } else {
                strata_log::trace!(key = %key, value = %value, "loading env config");
            }

            let parts: Vec<&str> = key
                .split(self.separator.as_str())
                .filter(|p| !p.is_empty())
                .collect();
            self.insert_nested(&mut result, &parts, &value);
        }

        result
    }

    fn insert_nested(&self, obj: &mut ConfigMap, parts: &[&str], value: &str) {
        let [first, rest @ ..] = parts else {
            return;
        };
        let key = self.normalize_key(first);

        if rest.is_empty() {
            // Nested keys win over a scalar at the same path.
            if obj.get(&key).is_some_and(Value::is_object) {
                strata_log::trace!(key = %key, "scalar shadowed by nested variables");
            } else {
                obj.insert(key, parse_env_value(value));
            }
            return;
        }

        let nested = obj
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()));

        // A scalar set by a shorter variable yields to the nested one.
        if !nested.is_object() {
            *nested = Value::Object(Map::new());
        }
        if let Value::Object(nested_obj) = nested {
            self.insert_nested(nested_obj, rest, value);
        }
    }
}

impl Default for EnvProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Type an environment value
fn parse_env_value(value: &str) -> Value {
    if value.is_empty() {
        return Value::String(String::new());
    }

    if value.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if value.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    if let Ok(int_val) = value.parse::<i64>() {
        return Value::Number(int_val.into());
    }

    if let Some(num) = value.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(num);
    }

    // Inline JSON arrays and objects
    if ((value.starts_with('{') && value.ends_with('}'))
        || (value.starts_with('[') && value.ends_with(']')))
        && let Ok(json_val) = serde_json::from_str(value)
    {
        return json_val;
    }

    if value.contains(',') && !value.starts_with('"') {
        return Value::Array(
            value
                .split(',')
                .map(|s| parse_env_value(s.trim()))
                .collect(),
        );
    }

    Value::String(value.to_string())
}

#[async_trait]
impl Provider for EnvProvider {
    fn name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("env:{prefix}"),
            None => "env".to_string(),
        }
    }

    async fn read_map(&self) -> ConfigResult<ConfigMap> {
        let vars = self.filter_vars();

        if vars.is_empty() {
            strata_log::debug!(provider = %self.name(), "no environment variables found");
        } else {
            strata_log::debug!(
                provider = %self.name(),
                count = vars.len(),
                "loaded environment variables"
            );
        }

        Ok(self.env_to_map(vars))
    }
}
