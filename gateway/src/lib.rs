pub mod config;
pub mod errors;
pub mod forwarder;
pub mod guard;
pub mod pipeline;
pub mod router;
pub mod service;
pub mod translator;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testutils;

pub use errors::GatewayError;
pub use pipeline::Gateway;
pub use service::GatewayService;
pub use transport::{HttpTransport, ReqwestTransport};
pub use types::{InboundRequest, OutboundResponse, RequestBody};

use config::GatewayConfig;
use shared::http::run_http_service;
use std::sync::Arc;

/// Validates the configuration and serves the gateway until the listener fails.
pub async fn run(config: config::Config) -> Result<(), GatewayError> {
    let gateway_config = Arc::new(GatewayConfig::try_from(&config)?);
    let transport = ReqwestTransport::new()?;
    let gateway = Arc::new(Gateway::new(gateway_config, transport));

    tracing::info!(
        api = %config.upstreams.api_url,
        origins = config.allowed_origins.len(),
        "Starting gateway"
    );

    run_http_service(&config.listener.host, config.listener.port, move |peer_addr| {
        GatewayService::new(gateway.clone(), peer_addr)
    })
    .await
}
