use crate::config::GatewayConfig;
use crate::errors::GatewayError;
use crate::transport::{HttpTransport, OutboundRequest, UpstreamResponse, upstream_identifier};
use crate::types::{InboundRequest, RequestBody};
use http::header::HeaderName;
use http::{HeaderMap, HeaderValue, Method};
use hyper::body::Bytes;
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::timeout;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Builds the API upstream request: same method, allow-listed headers,
/// normalized body.
pub fn build_api_request(
    config: &GatewayConfig,
    request: &InboundRequest,
) -> Result<OutboundRequest, GatewayError> {
    Ok(OutboundRequest {
        method: request.method.clone(),
        url: target_url(&config.api_base, &request.path, request.query.as_deref()),
        headers: forward_headers(&config.forwarded_headers, &request.headers, request.client_ip),
        body: normalize_body(&request.body)?,
    })
}

/// Builds the CDN request for the SDK bundle: a bare GET of the same path.
pub fn build_sdk_request(config: &GatewayConfig, request: &InboundRequest) -> OutboundRequest {
    OutboundRequest {
        method: Method::GET,
        url: target_url(&config.cdn_base, &request.path, None),
        headers: HeaderMap::new(),
        body: Bytes::new(),
    }
}

/// Sends the request and waits at most `limit` for the complete response.
///
/// On timeout the in-flight call is dropped. Exactly one call is made.
pub async fn forward<T: HttpTransport + ?Sized>(
    transport: &T,
    request: OutboundRequest,
    limit: Duration,
) -> Result<UpstreamResponse, GatewayError> {
    let upstream = upstream_identifier(&request.url);

    timeout(limit, transport.send(request))
        .await
        .map_err(|_| GatewayError::UpstreamTimeout(upstream))?
}

pub fn target_url(base: &str, path: &str, query: Option<&str>) -> String {
    match query {
        Some(query) if !query.is_empty() => format!("{base}{path}?{query}"),
        _ => format!("{base}{path}"),
    }
}

/// Copies allow-listed headers in allow-list order, then sets `x-forwarded-for`
/// to the client IP. Anything not on the allow-list is dropped.
pub fn forward_headers(
    allow_list: &[HeaderName],
    inbound: &HeaderMap,
    client_ip: Option<IpAddr>,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for name in allow_list {
        if let Some(value) = inbound.get(name)
            && !value.is_empty()
        {
            headers.insert(name.clone(), value.clone());
        }
    }

    if let Some(ip) = client_ip
        && let Ok(value) = HeaderValue::from_str(&ip.to_string())
    {
        headers.insert(X_FORWARDED_FOR, value);
    }

    headers
}

pub fn normalize_body(body: &RequestBody) -> Result<Bytes, GatewayError> {
    match body {
        RequestBody::Empty => Ok(Bytes::new()),
        RequestBody::Json(value) => serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| GatewayError::InvalidRequest(e.to_string())),
        RequestBody::Raw(bytes) => Ok(bytes.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{FakeTransport, inbound_request, test_config};
    use std::time::Instant;

    #[test]
    fn test_target_url() {
        let base = "https://sdk.iad-01.braze.com";
        assert_eq!(
            target_url(base, "/api/v3/data", Some("a=1&b=2")),
            "https://sdk.iad-01.braze.com/api/v3/data?a=1&b=2"
        );
        assert_eq!(
            target_url(base, "/api/v3/data", Some("")),
            "https://sdk.iad-01.braze.com/api/v3/data"
        );
        assert_eq!(
            target_url(base, "/api/v3/data", None),
            "https://sdk.iad-01.braze.com/api/v3/data"
        );
    }

    #[test]
    fn test_normalize_body() {
        assert!(normalize_body(&RequestBody::Empty).unwrap().is_empty());

        let json = RequestBody::Json(serde_json::json!({"a": 1}));
        assert_eq!(normalize_body(&json).unwrap().as_ref(), br#"{"a":1}"#);

        // Raw bodies are not re-encoded, even when they are JSON
        let raw = RequestBody::Raw(Bytes::from_static(b"{ \"a\" : 1 }"));
        assert_eq!(normalize_body(&raw).unwrap().as_ref(), b"{ \"a\" : 1 }");
    }

    #[test]
    fn test_forward_headers_allow_list() {
        let config = test_config();
        let mut inbound = HeaderMap::new();
        inbound.insert("X-Braze-Sdk-Version", HeaderValue::from_static("5.0.0"));
        inbound.insert("content-type", HeaderValue::from_static("text/plain"));
        inbound.insert("cookie", HeaderValue::from_static("session=secret"));
        inbound.insert("authorization", HeaderValue::from_static("Bearer secret"));
        inbound.insert("x-braze-device-id", HeaderValue::from_static(""));

        let headers = forward_headers(&config.forwarded_headers, &inbound, None);

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("x-braze-sdk-version").unwrap(), "5.0.0");
        assert_eq!(headers.get("content-type").unwrap(), "text/plain");
        assert!(headers.get("cookie").is_none());
        assert!(headers.get("authorization").is_none());
        // Empty values are not forwarded
        assert!(headers.get("x-braze-device-id").is_none());
    }

    #[test]
    fn test_forward_headers_preserve_allow_list_order() {
        let config = test_config();
        let mut inbound = HeaderMap::new();
        inbound.insert("referer", HeaderValue::from_static("https://shop.example.com/"));
        inbound.insert("user-agent", HeaderValue::from_static("test"));
        inbound.insert("x-braze-sdk-version", HeaderValue::from_static("5.0.0"));

        let headers = forward_headers(&config.forwarded_headers, &inbound, None);
        let names: Vec<&str> = headers.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["x-braze-sdk-version", "user-agent", "referer"]);
    }

    #[test]
    fn test_forwarded_for_overwrites() {
        let allow_list = vec![X_FORWARDED_FOR];
        let mut inbound = HeaderMap::new();
        inbound.insert(X_FORWARDED_FOR, HeaderValue::from_static("6.6.6.6"));

        let headers = forward_headers(&allow_list, &inbound, Some("203.0.113.9".parse().unwrap()));
        assert_eq!(headers.get_all(X_FORWARDED_FOR).iter().count(), 1);
        assert_eq!(headers.get(X_FORWARDED_FOR).unwrap(), "203.0.113.9");

        // Without a client IP the allow-listed value stays
        let headers = forward_headers(&allow_list, &inbound, None);
        assert_eq!(headers.get(X_FORWARDED_FOR).unwrap(), "6.6.6.6");
    }

    #[test]
    fn test_build_api_request() {
        let config = test_config();
        let mut req = inbound_request(
            Method::POST,
            "/api/v3/data/",
            &[
                ("origin", "https://shop.example.com"),
                ("x-braze-api-key", "key-1"),
                ("x-internal-secret", "s3cr3t"),
            ],
        );
        req.query = Some("v=2".to_string());
        req.body = RequestBody::Json(serde_json::json!({"a": 1}));
        req.client_ip = Some("198.51.100.4".parse().unwrap());

        let outbound = build_api_request(&config, &req).unwrap();
        assert_eq!(outbound.method, Method::POST);
        assert_eq!(outbound.url, "https://api.example.com/api/v3/data/?v=2");
        assert_eq!(outbound.body.as_ref(), br#"{"a":1}"#);
        assert_eq!(outbound.headers.get("origin").unwrap(), "https://shop.example.com");
        assert_eq!(outbound.headers.get("x-braze-api-key").unwrap(), "key-1");
        assert_eq!(outbound.headers.get("x-forwarded-for").unwrap(), "198.51.100.4");
        assert!(outbound.headers.get("x-internal-secret").is_none());
    }

    #[test]
    fn test_build_sdk_request() {
        let config = test_config();
        let mut req = inbound_request(
            Method::GET,
            "/web-sdk/5.0/braze.min.js",
            &[("referer", "https://shop.example.com/"), ("user-agent", "test")],
        );
        req.query = Some("cachebust=1".to_string());

        let outbound = build_sdk_request(&config, &req);
        assert_eq!(outbound.method, Method::GET);
        assert_eq!(outbound.url, "https://cdn.example.com/web-sdk/5.0/braze.min.js");
        assert!(outbound.headers.is_empty());
        assert!(outbound.body.is_empty());
    }

    #[tokio::test]
    async fn test_forward_timeout() {
        let transport = FakeTransport::hanging();
        let request = OutboundRequest {
            method: Method::GET,
            url: "https://api.example.com/api/v3/data".to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };

        let started = Instant::now();
        let result = forward(&transport, request, Duration::from_millis(50)).await;

        assert!(matches!(
            result.unwrap_err(),
            GatewayError::UpstreamTimeout(host) if host == "api.example.com"
        ));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(transport.calls(), 1);
    }
}
