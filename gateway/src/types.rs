//! Request and response shapes shared by the gateway stages.
//!
//! These are independent of the host runtime: the hyper adapter in
//! [`crate::service`] converts to and from them, tests build them directly.

use http::header::AsHeaderName;
use http::{HeaderMap, Method, StatusCode};
use hyper::body::Bytes;
use std::net::IpAddr;

/// Body of an inbound request as handed over by the host
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Body the host already parsed into a JSON document
    Json(serde_json::Value),
    /// Body passed through untouched
    Raw(Bytes),
}

impl RequestBody {
    pub fn from_bytes(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            RequestBody::Empty
        } else {
            RequestBody::Raw(bytes)
        }
    }
}

/// A browser request, read-only once constructed
#[derive(Clone, Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub client_ip: Option<IpAddr>,
}

impl InboundRequest {
    /// Case-insensitive header lookup. Values that are not visible ASCII read as absent.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// The single response produced for a claimed request
#[derive(Clone, Debug)]
pub struct OutboundResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OutboundResponse {
    pub fn empty(status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            status,
            headers,
            body: Bytes::new(),
        }
    }
}
