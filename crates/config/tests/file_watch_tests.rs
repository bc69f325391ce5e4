//! Integration tests for file-backed sources

use std::sync::Arc;
use std::time::Duration;
use strata_config::builders;
use strata_config::prelude::*;
use tokio::sync::mpsc;

async fn wait_for<F>(config: &Config, mut condition: F)
where
    F: FnMut(&Config) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition(config) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn editing_the_file_reloads_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.json");
    std::fs::write(&path, r#"{"workers": 2}"#).unwrap();

    let config = builders::from_file(&path)
        .unwrap()
        .build()
        .await
        .unwrap();
    assert_eq!(config.get::<u32>("workers").unwrap(), 2);

    std::fs::write(&path, r#"{"workers": 8}"#).unwrap();
    wait_for(&config, |c| c.get::<u32>("workers").ok() == Some(8)).await;
    config.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn atomic_replace_is_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.json");
    std::fs::write(&path, r#"{"mode": "a"}"#).unwrap();

    let config = ConfigBuilder::new()
        .with_source(Source::bytes(Arc::new(FileProvider::new(&path)), JsonParser::new()))
        .build()
        .await
        .unwrap();

    let staged = dir.path().join("app.json.tmp");
    std::fs::write(&staged, r#"{"mode": "b"}"#).unwrap();
    std::fs::rename(&staged, &path).unwrap();

    wait_for(&config, |c| c.get::<String>("mode").ok().as_deref() == Some("b")).await;
    config.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deleting_the_file_reports_removal_and_keeps_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.json");
    std::fs::write(&path, r#"{"keep": true}"#).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = ConfigBuilder::new()
        .with_source(Source::bytes(Arc::new(FileProvider::new(&path)), JsonParser::new()))
        .on_reload_error(move |e| {
            let _ = tx.send(e.clone());
        })
        .build()
        .await
        .unwrap();

    std::fs::remove_file(&path).unwrap();

    let removed = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match rx.recv().await {
                Some(e) if e.is_removal() => break e,
                Some(_) => continue,
                None => panic!("error channel closed"),
            }
        }
    })
    .await
    .expect("removal reported in time");

    assert!(matches!(removed, ConfigError::SourceRemoved { .. }));
    assert!(config.get::<bool>("keep").unwrap());
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn symlink_swap_is_reported_as_retarget() {
    let dir = tempfile::tempdir().unwrap();
    let v1 = dir.path().join("v1.json");
    let v2 = dir.path().join("v2.json");
    std::fs::write(&v1, r#"{"release": 1}"#).unwrap();
    std::fs::write(&v2, r#"{"release": 2}"#).unwrap();

    let link = dir.path().join("current.json");
    std::os::unix::fs::symlink(&v1, &link).unwrap();

    let config = ConfigBuilder::new()
        .with_source(Source::bytes(Arc::new(FileProvider::new(&link)), JsonParser::new()))
        .build()
        .await
        .unwrap();
    assert_eq!(config.get::<u32>("release").unwrap(), 1);

    let staged = dir.path().join("current.json.new");
    std::os::unix::fs::symlink(&v2, &staged).unwrap();
    std::fs::rename(&staged, &link).unwrap();

    wait_for(&config, |c| c.get::<u32>("release").ok() == Some(2)).await;
    config.close().await.unwrap();
}

#[tokio::test]
async fn missing_file_fails_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let err = builders::from_file(dir.path().join("absent.json"))
        .unwrap()
        .build()
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigError::Fetch { .. }));
}
