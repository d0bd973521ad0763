use crate::errors::GatewayError;
use crate::forwarder::X_FORWARDED_FOR;
use crate::pipeline::Gateway;
use crate::transport::HttpTransport;
use crate::types::{InboundRequest, OutboundResponse, RequestBody};
use http::request::Parts;
use http::{HeaderMap, StatusCode};
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use hyper::body::{Body, Bytes};
use hyper::service::Service;
use hyper::{Request, Response};
use shared::http::{full_body, make_error_response};
use std::fmt::Display;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;

/// Per-connection hyper service in front of a [`Gateway`].
///
/// Requests the gateway does not claim get a plain 404.
pub struct GatewayService<T> {
    gateway: Arc<Gateway<T>>,
    peer_addr: SocketAddr,
}

impl<T> GatewayService<T> {
    pub fn new(gateway: Arc<Gateway<T>>, peer_addr: SocketAddr) -> Self {
        Self { gateway, peer_addr }
    }
}

impl<T, B> Service<Request<B>> for GatewayService<T>
where
    T: HttpTransport + 'static,
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Display,
{
    type Response = Response<BoxBody<Bytes, GatewayError>>;
    type Error = GatewayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let gateway = self.gateway.clone();
        let peer_ip = self.peer_addr.ip();

        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let body = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    tracing::warn!(error = %e, path = %parts.uri.path(), "Failed to read request body");
                    return Ok(make_error_response(StatusCode::BAD_REQUEST));
                }
            };

            let client_ip = resolve_client_ip(
                &parts.headers,
                peer_ip,
                gateway.config().trust_forwarded_for,
            );
            let inbound = inbound_request(parts, body, client_ip);

            let response = match gateway.handle(&inbound).await {
                Some(response) => into_http_response(response),
                None => make_error_response(StatusCode::NOT_FOUND),
            };
            Ok(response)
        })
    }
}

fn inbound_request(parts: Parts, body: Bytes, client_ip: IpAddr) -> InboundRequest {
    InboundRequest {
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        method: parts.method,
        headers: parts.headers,
        body: RequestBody::from_bytes(body),
        client_ip: Some(client_ip),
    }
}

/// The peer address, or the first `x-forwarded-for` hop when the proxy in
/// front of us is trusted to set it.
fn resolve_client_ip(headers: &HeaderMap, peer_ip: IpAddr, trust_forwarded_for: bool) -> IpAddr {
    if !trust_forwarded_for {
        return peer_ip;
    }

    headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse().ok())
        .unwrap_or(peer_ip)
}

fn into_http_response(response: OutboundResponse) -> Response<BoxBody<Bytes, GatewayError>> {
    let mut http_response = Response::new(full_body(response.body));
    *http_response.status_mut() = response.status;
    *http_response.headers_mut() = response.headers;
    http_response
}
