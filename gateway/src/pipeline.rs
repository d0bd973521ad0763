//! Request pipeline
//!
//! Every claimed request moves through
//! `Claimed → Validated → Forwarded → Responded` and produces exactly one
//! [`OutboundResponse`]:
//!
//! ```text
//!            ┌────────┐  unmatched path → None (request untouched)
//! request ──▶│ Router │
//!            └───┬────┘
//!                │ Claim
//!                ▼
//!         ┌─────────────┐  denied → 403
//!         │ OriginGuard │  OPTIONS (API) → 204
//!         └──────┬──────┘
//!                ▼
//!      ┌──────────────────┐  timeout / transport error → 502
//!      │ RequestForwarder │
//!      └────────┬─────────┘
//!               ▼
//!     ┌────────────────────┐  SDK criterion failed → 502
//!     │ ResponseTranslator │
//!     └────────────────────┘
//! ```
//!
//! There is no retry edge. Each branch returns its response by value, so a
//! request cannot be answered twice.

use crate::config::GatewayConfig;
use crate::errors::GatewayError;
use crate::forwarder;
use crate::guard::{self, ApiAccess};
use crate::router::{Route, Router};
use crate::transport::{HttpTransport, upstream_identifier};
use crate::translator;
use crate::types::{InboundRequest, OutboundResponse};
use http::{HeaderMap, StatusCode};
use std::sync::Arc;

pub struct Gateway<T> {
    config: Arc<GatewayConfig>,
    router: Router,
    transport: T,
}

impl<T: HttpTransport> Gateway<T> {
    pub fn new(config: Arc<GatewayConfig>, transport: T) -> Self {
        let router = Router::new(config.sdk_filename.clone());
        Self {
            config,
            router,
            transport,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Handles the request if it belongs to one of the gateway routes.
    ///
    /// Returns `None` when the path is not claimed, leaving the response to the host.
    pub async fn handle(&self, request: &InboundRequest) -> Option<OutboundResponse> {
        let claim = self.router.claim(request)?;
        let route = claim.route();
        tracing::debug!(
            route = route.name(),
            method = %request.method,
            path = %request.path,
            "Claimed request"
        );

        let response = match route {
            Route::Sdk => self.handle_sdk(request).await,
            Route::Api => self.handle_api(request).await,
        };
        Some(response)
    }

    async fn handle_sdk(&self, request: &InboundRequest) -> OutboundResponse {
        if let Err(e) = guard::check_sdk(&self.config, request) {
            return deny(Route::Sdk, request, e, HeaderMap::new());
        }

        let outbound = forwarder::build_sdk_request(&self.config, request);
        let upstream = upstream_identifier(&outbound.url);

        forwarder::forward(&self.transport, outbound, self.config.sdk_timeout)
            .await
            .and_then(|response| translator::sdk_response(&upstream, response))
            .unwrap_or_else(|e| upstream_failure(Route::Sdk, request, e, HeaderMap::new()))
    }

    async fn handle_api(&self, request: &InboundRequest) -> OutboundResponse {
        let cors = guard::cors_headers(request);

        match guard::check_api(&self.config, request) {
            Ok(ApiAccess::Granted) => {}
            Ok(ApiAccess::Preflight) => {
                return OutboundResponse::empty(StatusCode::NO_CONTENT, cors);
            }
            Err(e) => return deny(Route::Api, request, e, cors),
        }

        let outbound = match forwarder::build_api_request(&self.config, request) {
            Ok(outbound) => outbound,
            Err(e) => return upstream_failure(Route::Api, request, e, cors),
        };

        match forwarder::forward(&self.transport, outbound, self.config.api_timeout).await {
            Ok(response) => {
                translator::api_response(response, &self.config.blocked_response_headers, cors)
            }
            Err(e) => upstream_failure(Route::Api, request, e, cors),
        }
    }
}

fn deny(
    route: Route,
    request: &InboundRequest,
    error: GatewayError,
    headers: HeaderMap,
) -> OutboundResponse {
    tracing::warn!(
        route = route.name(),
        path = %request.path,
        origin = request.header(http::header::ORIGIN).unwrap_or_default(),
        error = %error,
        "Request denied"
    );
    error.into_response(headers)
}

fn upstream_failure(
    route: Route,
    request: &InboundRequest,
    error: GatewayError,
    headers: HeaderMap,
) -> OutboundResponse {
    if error.is_transport_failure() {
        tracing::error!(
            route = route.name(),
            path = %request.path,
            error = %error,
            "Upstream request failed"
        );
    } else {
        tracing::warn!(
            route = route.name(),
            path = %request.path,
            error = %error,
            "Upstream request failed"
        );
    }
    error.into_response(headers)
}
