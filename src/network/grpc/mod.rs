//! gRPC clients for the engine's external collaborators: the application
//! store, the revision-diff service, and the streaming watch feed.

mod grpc_app_store;
mod grpc_revision_service;
mod grpc_watch_feed;
mod health;

pub use grpc_app_store::*;
pub use grpc_revision_service::*;
pub use grpc_watch_feed::*;
pub use health::*;

use std::time::Duration;

use tonic::transport::Channel;
use tracing::error;

use crate::NetworkConfig;
use crate::NetworkError;
use crate::Result;

/// Open a channel with the crate-wide keepalive and timeout settings.
pub(crate) async fn connect_channel(addr: &str, settings: &NetworkConfig) -> Result<Channel> {
    let channel = Channel::from_shared(addr.to_string())
        .map_err(|_| NetworkError::InvalidUri(addr.into()))?
        .connect_timeout(Duration::from_millis(settings.connect_timeout_in_ms))
        .timeout(Duration::from_millis(settings.request_timeout_in_ms))
        .tcp_keepalive(Some(Duration::from_secs(settings.tcp_keepalive_in_secs)))
        .http2_keep_alive_interval(Duration::from_secs(
            settings.http2_keep_alive_interval_in_secs,
        ))
        .keep_alive_timeout(Duration::from_secs(settings.http2_keep_alive_timeout_in_secs))
        .connect()
        .await
        .map_err(|err| {
            error!("connect to {} failed: {}", addr, err);
            NetworkError::ConnectError
        })?;
    Ok(channel)
}
