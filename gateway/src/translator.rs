use crate::errors::GatewayError;
use crate::transport::UpstreamResponse;
use crate::types::OutboundResponse;
use http::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderName};
use http::{HeaderMap, HeaderValue};
use std::collections::HashSet;

const SDK_CACHE_CONTROL: &str = "public, max-age=14400";
const SDK_CONTENT_TYPE: &str = "application/javascript";

/// SDK route: only a non-empty body with a status below 400 is served.
/// Anything else becomes [`GatewayError::UpstreamRejected`] and the
/// upstream status and body are discarded.
pub fn sdk_response(
    upstream: &str,
    response: UpstreamResponse,
) -> Result<OutboundResponse, GatewayError> {
    if response.body.is_empty() || response.status.as_u16() >= 400 {
        return Err(GatewayError::UpstreamRejected {
            upstream: upstream.to_string(),
            status: response.status,
        });
    }

    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(SDK_CACHE_CONTROL));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(SDK_CONTENT_TYPE));

    Ok(OutboundResponse {
        status: response.status,
        headers,
        body: response.body,
    })
}

/// API route: any upstream response is passed through with its status.
///
/// Upstream headers are layered over `headers` (the CORS headers), skipping
/// blocked names. The first upstream value of a name replaces a pre-set one,
/// later values of the same name are appended.
pub fn api_response(
    response: UpstreamResponse,
    blocked: &HashSet<HeaderName>,
    mut headers: HeaderMap,
) -> OutboundResponse {
    for name in response.headers.keys() {
        if blocked.contains(name) {
            continue;
        }

        let mut values = response.headers.get_all(name).iter();
        if let Some(first) = values.next() {
            headers.insert(name.clone(), first.clone());
        }
        for value in values {
            headers.append(name.clone(), value.clone());
        }
    }

    OutboundResponse {
        status: response.status,
        headers,
        body: response.body,
    }
}
