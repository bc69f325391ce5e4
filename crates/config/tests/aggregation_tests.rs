//! Integration tests for loading and merging sources

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use strata_config::parsers::substitute_with;
use strata_config::prelude::*;

fn json_source(name: &str, content: &str) -> Source {
    Source::bytes(Arc::new(MemoryProvider::new(name, content)), JsonParser::new())
}

#[tokio::test]
async fn placeholder_default_overrides_earlier_source() {
    let config = ConfigBuilder::new()
        .with_source(json_source("base", r#"{"a": 1}"#))
        .with_source(json_source(
            "override",
            r#"{"a": "${STRATA_IT_AGG_UNSET_A:2}"}"#,
        ))
        .build()
        .await
        .unwrap();

    assert_eq!(config.get::<String>("a").unwrap(), "2");
}

#[tokio::test]
async fn nested_mappings_merge_per_key() {
    let config = ConfigBuilder::new()
        .with_source(json_source(
            "base",
            r#"{"db": {"host": "localhost", "port": 5432, "pool": {"min": 1, "max": 4}}}"#,
        ))
        .with_source(json_source("env", r#"{"db": {"pool": {"max": 32}}, "debug": false}"#))
        .build()
        .await
        .unwrap();

    assert_eq!(
        config.as_value(),
        json!({
            "db": {"host": "localhost", "port": 5432, "pool": {"min": 1, "max": 32}},
            "debug": false
        })
    );
}

#[tokio::test]
async fn every_unresolved_variable_is_reported() {
    let err = ConfigBuilder::new()
        .with_source(json_source(
            "mem",
            r#"{"a": "${STRATA_IT_AGG_UNSET_X}", "b": "${STRATA_IT_AGG_UNSET_Y}"}"#,
        ))
        .build()
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ConfigError::unresolved(vec![
            "STRATA_IT_AGG_UNSET_X".to_string(),
            "STRATA_IT_AGG_UNSET_Y".to_string(),
        ])
    );
}

#[test]
fn substitution_aggregates_names_across_the_document() {
    let lookup = |name: &str| (name == "SET").then(|| "value".to_string());
    let err = substitute_with(b"${A}\n${SET}\n${B}\n${A}", lookup).unwrap_err();
    assert_eq!(err, ConfigError::unresolved(vec!["A".into(), "B".into()]));
}

#[tokio::test]
async fn map_sources_are_not_substituted() {
    let config = ConfigBuilder::new()
        .with_source(Source::map(Arc::new(EnvProvider::from_vars([(
            "APP_URL",
            "${STRATA_IT_AGG_UNSET_URL}",
        )])
        .prefix("APP"))))
        .build()
        .await
        .unwrap();

    assert_eq!(
        config.get::<String>("url").unwrap(),
        "${STRATA_IT_AGG_UNSET_URL}"
    );
}

#[tokio::test]
async fn env_overrides_file_style_source() {
    let config = ConfigBuilder::new()
        .with_defaults_json(json!({"server": {"port": 80, "host": "0.0.0.0"}}))
        .with_source(json_source("file", r#"{"server": {"port": 8080}}"#))
        .with_source(Source::map(Arc::new(
            EnvProvider::from_vars([("APP_SERVER_PORT", "9090")]).prefix("APP"),
        )))
        .build()
        .await
        .unwrap();

    assert_eq!(config.get::<u16>("server.port").unwrap(), 9090);
    assert_eq!(config.get::<String>("server.host").unwrap(), "0.0.0.0");

    let sources: Vec<_> = config
        .snapshot()
        .sources()
        .iter()
        .map(|m| m.provider.clone())
        .collect();
    assert_eq!(sources, vec!["defaults", "file", "env:APP"]);
}

#[cfg(all(feature = "toml", feature = "yaml"))]
#[tokio::test]
async fn mixed_formats_merge_into_one_snapshot() {
    let config = ConfigBuilder::new()
        .with_source(Source::bytes(
            Arc::new(MemoryProvider::new("toml", "[server]\nport = 1\nname = \"toml\"\n")),
            TomlParser::new(),
        ))
        .with_source(Source::bytes(
            Arc::new(MemoryProvider::new("yaml", "server:\n  port: 2\n")),
            YamlParser::new(),
        ))
        .with_source(json_source("json", r#"{"server": {"tls": true}}"#))
        .build()
        .await
        .unwrap();

    assert_eq!(
        config.get_raw(Some("server")).unwrap(),
        json!({"port": 2, "name": "toml", "tls": true})
    );
}

#[tokio::test]
async fn empty_builder_yields_empty_snapshot() {
    let config = ConfigBuilder::new().build().await.unwrap();
    assert!(config.snapshot().is_empty());
    assert!(config.keys(None).unwrap().is_empty());
}

#[tokio::test]
async fn typed_access_to_whole_tree() {
    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Server {
        host: String,
        port: u16,
    }

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct AppConfig {
        server: Server,
    }

    let config = ConfigBuilder::new()
        .with_source(json_source(
            "mem",
            r#"{"server": {"host": "${STRATA_IT_AGG_UNSET_HOST:example.org}", "port": 443}}"#,
        ))
        .build()
        .await
        .unwrap();

    let app: AppConfig = config.get_all().unwrap();
    assert_eq!(
        app,
        AppConfig {
            server: Server {
                host: "example.org".into(),
                port: 443
            }
        }
    );
}

#[cfg(feature = "bson")]
#[tokio::test]
async fn bson_documents_merge_with_text_sources() {
    let document = bson::doc! {
        "db": { "host": "${STRATA_IT_AGG_UNSET_DB:db.internal}", "pool": 8_i32 },
    };
    let bytes = bson::to_vec(&document).unwrap();

    let config = ConfigBuilder::new()
        .with_source(Source::bytes(
            Arc::new(MemoryProvider::new("stored", bytes)),
            BsonParser::new(),
        ))
        .with_source(json_source("override", r#"{"db": {"pool": 16}}"#))
        .build()
        .await
        .unwrap();

    assert_eq!(
        config.as_value(),
        json!({"db": {"host": "db.internal", "pool": 16}})
    );
    assert_eq!(config.snapshot().sources()[0].format.as_deref(), Some("bson"));
}
