use crate::errors::GatewayError;
use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use hyper::body::Bytes;
use std::sync::Arc;

/// Request sent to an upstream, built once per claimed request
#[derive(Clone, Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Fully collected upstream response
#[derive(Clone, Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Issues one outbound HTTP call.
///
/// Implementations must not retry. The caller bounds the call with the route
/// timeout, so a slow implementation is simply dropped mid-flight.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, GatewayError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, GatewayError> {
        (**self).send(request).await
    }
}

/// Production transport backed by a pooled reqwest client
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| GatewayError::HttpClientError(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, GatewayError> {
        let upstream = upstream_identifier(&request.url);

        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::UpstreamRequestFailed(upstream, e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::ResponseBodyError(e.to_string()))?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

/// Host of the target URL, used to label upstream errors
pub(crate) fn upstream_identifier(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}
