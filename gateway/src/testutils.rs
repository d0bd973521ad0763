use crate::config::{Config, GatewayConfig, Listener, Timeouts, Upstreams};
use crate::errors::GatewayError;
use crate::transport::{HttpTransport, OutboundRequest, UpstreamResponse};
use crate::types::{InboundRequest, RequestBody};
use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use hyper::body::Bytes;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

pub fn test_config_source() -> Config {
    let defaults: Config = serde_yaml::from_str(
        r#"
listener: {host: "127.0.0.1", port: 3000}
upstreams: {api_url: "https://api.example.com"}
"#,
    )
    .unwrap();

    Config {
        listener: Listener {
            host: "127.0.0.1".to_string(),
            port: 3000,
        },
        upstreams: Upstreams {
            api_url: Url::parse("https://api.example.com").unwrap(),
            cdn_url: Some(Url::parse("https://cdn.example.com").unwrap()),
        },
        allowed_origins: vec![
            "https://shop.example.com".to_string(),
            "https://www.example.com".to_string(),
        ],
        allowed_api_keys: vec!["key-1".to_string()],
        timeouts: Timeouts {
            sdk_ms: 200,
            api_ms: 300,
        },
        ..defaults
    }
}

pub fn test_config() -> GatewayConfig {
    GatewayConfig::try_from(&test_config_source()).unwrap()
}

pub fn inbound_request(method: Method, path: &str, headers: &[(&str, &str)]) -> InboundRequest {
    let mut header_map = HeaderMap::new();
    for (name, value) in headers {
        header_map.append(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }

    InboundRequest {
        method,
        path: path.to_string(),
        query: None,
        headers: header_map,
        body: RequestBody::Empty,
        client_ip: None,
    }
}

pub fn upstream_response(status: u16, headers: &[(&str, &str)], body: &str) -> UpstreamResponse {
    let mut header_map = HeaderMap::new();
    for (name, value) in headers {
        header_map.append(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }

    UpstreamResponse {
        status: StatusCode::from_u16(status).unwrap(),
        headers: header_map,
        body: Bytes::from(body.to_string()),
    }
}

enum Behaviour {
    Respond(UpstreamResponse),
    Fail,
    Hang,
}

/// Transport double that records every request it is asked to send
pub struct FakeTransport {
    behaviour: Behaviour,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl FakeTransport {
    fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn responding(status: u16, headers: &[(&str, &str)], body: &str) -> Self {
        Self::new(Behaviour::Respond(upstream_response(status, headers, body)))
    }

    /// Fails like a refused connection
    pub fn failing() -> Self {
        Self::new(Behaviour::Fail)
    }

    /// Never answers
    pub fn hanging() -> Self {
        Self::new(Behaviour::Hang)
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<OutboundRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, GatewayError> {
        self.requests.lock().unwrap().push(request);

        match &self.behaviour {
            Behaviour::Respond(response) => Ok(response.clone()),
            Behaviour::Fail => Err(GatewayError::UpstreamRequestFailed(
                "fake".to_string(),
                "connection refused".to_string(),
            )),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(GatewayError::UpstreamTimeout("fake".to_string()))
            }
        }
    }
}
