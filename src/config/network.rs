use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Upstream endpoints and gRPC channel tuning.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NetworkConfig {
    /// Application store / watch feed endpoint.
    #[serde(default = "default_application_service_address")]
    pub application_service_address: String,

    /// Revision-diff service endpoint.
    #[serde(default = "default_revision_service_address")]
    pub revision_service_address: String,

    /// Namespace to watch; empty watches all namespaces.
    #[serde(default)]
    pub watch_namespace: String,

    #[serde(default = "default_connect_timeout_in_ms")]
    pub connect_timeout_in_ms: u64,

    #[serde(default = "default_request_timeout_in_ms")]
    pub request_timeout_in_ms: u64,

    #[serde(default = "default_tcp_keepalive_in_secs")]
    pub tcp_keepalive_in_secs: u64,

    #[serde(default = "default_http2_keep_alive_interval_in_secs")]
    pub http2_keep_alive_interval_in_secs: u64,

    #[serde(default = "default_http2_keep_alive_timeout_in_secs")]
    pub http2_keep_alive_timeout_in_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            application_service_address: default_application_service_address(),
            revision_service_address: default_revision_service_address(),
            watch_namespace: String::new(),
            connect_timeout_in_ms: default_connect_timeout_in_ms(),
            request_timeout_in_ms: default_request_timeout_in_ms(),
            tcp_keepalive_in_secs: default_tcp_keepalive_in_secs(),
            http2_keep_alive_interval_in_secs: default_http2_keep_alive_interval_in_secs(),
            http2_keep_alive_timeout_in_secs: default_http2_keep_alive_timeout_in_secs(),
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        for (field, addr) in [
            (
                "application_service_address",
                &self.application_service_address,
            ),
            ("revision_service_address", &self.revision_service_address),
        ] {
            if !addr.starts_with("http://") && !addr.starts_with("https://") {
                return Err(Error::InvalidConfig(format!(
                    "{} must be an http(s) URI, got {}",
                    field, addr
                )));
            }
        }
        Ok(())
    }
}

fn default_application_service_address() -> String {
    "http://127.0.0.1:8081".to_string()
}

fn default_revision_service_address() -> String {
    "http://127.0.0.1:8091".to_string()
}

fn default_connect_timeout_in_ms() -> u64 {
    500
}

fn default_request_timeout_in_ms() -> u64 {
    5_000
}

fn default_tcp_keepalive_in_secs() -> u64 {
    300
}

fn default_http2_keep_alive_interval_in_secs() -> u64 {
    30
}

fn default_http2_keep_alive_timeout_in_secs() -> u64 {
    20
}
