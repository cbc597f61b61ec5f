//! Typed lookup of the auxiliary version configuration.
//!
//! The configuration describes where an application's version lives inside
//! its rendered manifests. Providers decode straight into the typed
//! contract; there is no dynamic payload shape anywhere on this path.

use std::path::PathBuf;

#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;
use tonic::async_trait;

use crate::Result;
use crate::VersionConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionConfig {
    pub product_label: String,
    pub json_path: String,
    pub resource_name: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConfigProvider: Send + Sync + 'static {
    async fn get_config(&self) -> Result<VersionConfig>;
}

/// Reads the version config from a local JSON file, typically a mounted
/// config map.
pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    async fn get_config(&self) -> Result<VersionConfig> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| VersionConfigError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        let config: VersionConfig =
            serde_json::from_str(&raw).map_err(VersionConfigError::Decode)?;
        Ok(config)
    }
}

pub struct VersionConfigManager<P>
where
    P: ConfigProvider,
{
    provider: std::sync::Arc<P>,
}

impl<P> VersionConfigManager<P>
where
    P: ConfigProvider,
{
    pub fn new(provider: std::sync::Arc<P>) -> Self {
        Self { provider }
    }

    pub async fn obtain(&self) -> Result<VersionConfig> {
        self.provider.get_config().await
    }
}
