//! Caller validation against the configured allow-lists.
//!
//! Every check is a single hash set lookup on an exact string. Nothing here
//! normalizes origins: `https://shop.example.com` and `https://shop.example.com/`
//! are different origins.

use crate::config::GatewayConfig;
use crate::errors::{DeniedReason, GatewayError};
use crate::types::InboundRequest;
use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_HEADERS, HeaderName, ORIGIN, REFERER, VARY,
};
use http::{HeaderMap, HeaderValue, Method};

pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-braze-api-key");

const ALLOWED_METHODS: &str = "POST,GET,OPTIONS";

/// Outcome of a successful API route check
#[derive(Debug, PartialEq, Eq)]
pub enum ApiAccess {
    /// CORS preflight from an allowed origin, answered locally
    Preflight,
    /// Origin and API key are valid, forward upstream
    Granted,
}

/// SDK route: the referer must be an allowed origin followed by `/`.
pub fn check_sdk(config: &GatewayConfig, request: &InboundRequest) -> Result<(), GatewayError> {
    match request.header(REFERER) {
        Some(referer) if config.allowed_referers.contains(referer) => Ok(()),
        _ => Err(GatewayError::AccessDenied(DeniedReason::Origin)),
    }
}

/// API route: origin first, then preflight short-circuit, then API key.
pub fn check_api(config: &GatewayConfig, request: &InboundRequest) -> Result<ApiAccess, GatewayError> {
    match request.header(ORIGIN) {
        Some(origin) if config.allowed_origins.contains(origin) => {}
        _ => return Err(GatewayError::AccessDenied(DeniedReason::Origin)),
    }

    if request.method == Method::OPTIONS {
        return Ok(ApiAccess::Preflight);
    }

    match request.header(API_KEY_HEADER) {
        Some(key) if !key.is_empty() && config.allowed_api_keys.contains(key) => {
            Ok(ApiAccess::Granted)
        }
        _ => Err(GatewayError::AccessDenied(DeniedReason::ApiKey)),
    }
}

/// CORS headers for the API route.
///
/// Emitted before the origin is validated, so denied callers get their own
/// origin echoed back alongside the 403.
pub fn cors_headers(request: &InboundRequest) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(requested) = request.headers.get(ACCESS_CONTROL_REQUEST_HEADERS)
        && !requested.is_empty()
    {
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
    }
    if let Some(origin) = request.headers.get(ORIGIN) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    }
    headers.insert(
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(VARY, HeaderValue::from_static("origin"));

    headers
}
