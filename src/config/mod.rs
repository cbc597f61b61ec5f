//! Configuration management for the change-revision engine.
//!
//! Settings are merged from three sources with increasing priority:
//! 1. Default values (hardcoded)
//! 2. Optional TOML file (`CONFIG_PATH` or an explicit path)
//! 3. Environment variables with the `CRENGINE` prefix (highest priority)
//!
//! Example: `CRENGINE__CONTROLLER__MAX_CONCURRENT_RECONCILES=32` overrides
//! `[controller] max_concurrent_reconciles`.

mod controller;
mod monitoring;
mod network;
mod retry;

pub use controller::*;
pub use monitoring::*;
pub use network::*;
pub use retry::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::Result;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    /// Event distribution and reconciliation parameters
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Metrics endpoint settings
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Upstream service endpoints and channel tuning
    #[serde(default)]
    pub network: NetworkConfig,

    /// Retry policies for connect/probe paths
    #[serde(default)]
    pub retry: RetryPolicies,
}

impl Settings {
    /// Load configuration with file and environment overlays.
    ///
    /// `config_path` wins over the `CONFIG_PATH` environment variable; when
    /// neither is set only defaults and `CRENGINE__*` overrides apply.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        } else if let Ok(path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("CRENGINE")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.controller.validate()?;
        self.monitoring.validate()?;
        self.network.validate()?;
        Ok(())
    }
}
