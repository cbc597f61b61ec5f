use std::sync::Arc;

use super::*;
use crate::Error;
use crate::VersionConfigError;

fn sample_config() -> VersionConfig {
    VersionConfig {
        product_label: "productLabelName=ProductName".into(),
        json_path: "{.appVersion}".into(),
        resource_name: "Chart.yaml".into(),
    }
}

#[tokio::test]
async fn file_provider_decodes_the_typed_contract() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("version-config.json");
    std::fs::write(
        &path,
        r#"{
            "productLabel": "productLabelName=ProductName",
            "jsonPath": "{.appVersion}",
            "resourceName": "Chart.yaml"
        }"#,
    )
    .unwrap();

    let manager = VersionConfigManager::new(Arc::new(FileConfigProvider::new(path)));
    let config = manager.obtain().await.unwrap();
    assert_eq!(config, sample_config());
}

#[tokio::test]
async fn file_provider_rejects_malformed_documents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("version-config.json");
    std::fs::write(&path, "{\"productLabel\": 42}").unwrap();

    let manager = VersionConfigManager::new(Arc::new(FileConfigProvider::new(path)));
    let result = manager.obtain().await;
    assert!(matches!(
        result,
        Err(Error::VersionConfig(VersionConfigError::Decode(_)))
    ));
}

#[tokio::test]
async fn missing_file_surfaces_the_source_path() {
    let manager = VersionConfigManager::new(Arc::new(FileConfigProvider::new(
        "/nonexistent/version-config.json",
    )));
    let result = manager.obtain().await;
    match result {
        Err(Error::VersionConfig(VersionConfigError::Io { path, .. })) => {
            assert!(path.contains("version-config.json"));
        }
        other => panic!("expected Io error, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn manager_delegates_to_the_provider() {
    let mut provider = MockConfigProvider::new();
    provider
        .expect_get_config()
        .times(1)
        .returning(|| Ok(sample_config()));

    let manager = VersionConfigManager::new(Arc::new(provider));
    assert_eq!(manager.obtain().await.unwrap(), sample_config());
}
