use crate::config::ValidationError;
use crate::types::OutboundResponse;
use http::{HeaderMap, StatusCode};
use hyper::body::Bytes;
use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

/// Body of every 502. Upstream diagnostics are logged, never returned.
pub const UPSTREAM_ERROR_MESSAGE: &str = "Upstream service error";

/// Why a caller was turned away before any upstream call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeniedReason {
    /// Referer (SDK route) or origin (API route) not on the allow-list
    Origin,
    /// Missing or unknown `x-braze-api-key`
    ApiKey,
}

impl DeniedReason {
    pub fn message(&self) -> &'static str {
        match self {
            DeniedReason::Origin => "Origin not allowed",
            DeniedReason::ApiKey => "Invalid API key",
        }
    }
}

/// Errors that can occur while handling a gateway request
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Access denied: {}", .0.message())]
    AccessDenied(DeniedReason),

    #[error("Upstream timeout for {0}")]
    UpstreamTimeout(String),

    #[error("Upstream request failed for {0}: {1}")]
    UpstreamRequestFailed(String, String),

    #[error("Upstream {upstream} returned unusable response with status {status}")]
    UpstreamRejected { upstream: String, status: StatusCode },

    #[error("Failed to read response body: {0}")]
    ResponseBodyError(String),

    #[error("Failed to build upstream request: {0}")]
    InvalidRequest(String),

    #[error("HTTP client error: {0}")]
    HttpClientError(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Status code the client sees for this error
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::AccessDenied(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_GATEWAY,
        }
    }

    /// Transport-level failures: the upstream could not be reached or its
    /// response could not be read. Logged at error level.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            GatewayError::UpstreamRequestFailed(..)
                | GatewayError::ResponseBodyError(_)
                | GatewayError::HttpClientError(_)
        )
    }

    /// Maps the error to its fixed client response.
    ///
    /// `headers` holds whatever was emitted before the failure (the CORS headers
    /// on the API route) and is kept as-is.
    pub fn into_response(self, headers: HeaderMap) -> OutboundResponse {
        let body = match &self {
            GatewayError::AccessDenied(reason) => reason.message(),
            _ => UPSTREAM_ERROR_MESSAGE,
        };

        OutboundResponse {
            status: self.status(),
            headers,
            body: Bytes::from_static(body.as_bytes()),
        }
    }
}
