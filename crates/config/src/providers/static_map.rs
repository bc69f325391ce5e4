//! Fixed in-process mapping

use crate::core::{ConfigMap, ConfigResult, Provider};
use async_trait::async_trait;

/// Provider returning the same mapping on every read
///
/// Used for defaults registered on the builder.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    name: String,
    map: ConfigMap,
}

impl StaticProvider {
    /// Create a provider serving `map`
    pub fn new(name: impl Into<String>, map: ConfigMap) -> Self {
        Self {
            name: name.into(),
            map,
        }
    }
}

#[async_trait]
impl Provider for StaticProvider {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn read_map(&self) -> ConfigResult<ConfigMap> {
        Ok(self.map.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConfigError;
    use serde_json::json;

    #[tokio::test]
    async fn serves_map_but_not_bytes() {
        let mut map = ConfigMap::new();
        map.insert("port".into(), json!(80));
        let provider = StaticProvider::new("defaults", map.clone());

        assert_eq!(provider.read_map().await.unwrap(), map);
        assert_eq!(
            provider.read_bytes().await.unwrap_err(),
            ConfigError::unsupported("StaticProvider", "read_bytes")
        );
    }
}
