use http::HeaderName;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// CDN serving the Web SDK bundle, used when `upstreams.cdn_url` is not set.
pub const DEFAULT_CDN_URL: &str = "https://js.appboycdn.com";

pub const DEFAULT_SDK_FILENAME: &str = "braze.min.js";

const DEFAULT_SDK_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_API_TIMEOUT_MS: u64 = 10_000;

/// Request headers relayed to the API upstream, in forwarding order.
const DEFAULT_FORWARDED_HEADERS: &[&str] = &[
    "x-braze-sdk-version",
    "x-braze-request-id",
    "x-braze-sdk-flavor",
    "x-braze-api-key",
    "x-braze-datacenters",
    "x-braze-device-id",
    "x-braze-datarequest",
    "braze-sync-retry-count",
    "x-braze-last-req-ms-ago",
    "x-braze-req-attempt",
    "x-braze-triggersrequest",
    "x-requested-with",
    "x-ratelimit-limit",
    "x-braze-contentcardsrequest",
    "x-braze-req-tokens-remaining",
    "content-type",
    "user-agent",
    "origin",
    "referer",
];

/// Upstream response headers never copied to the client. The CORS entries keep
/// the gateway's own CORS headers from being overwritten.
const DEFAULT_BLOCKED_RESPONSE_HEADERS: &[&str] = &[
    "content-length",
    "transfer-encoding",
    "connection",
    "content-encoding",
    "access-control-allow-origin",
    "access-control-allow-credentials",
];

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Timeout for the {0} route cannot be 0")]
    ZeroTimeout(&'static str),

    #[error("Invalid upstream URL for {0}: {1}")]
    InvalidUpstreamUrl(&'static str, String),

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(String),

    #[error("SDK filename cannot be empty")]
    EmptySdkFilename,

    #[error("Empty entry in {0}")]
    EmptyAllowListEntry(&'static str),
}

/// Gateway configuration as read from the config file
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for incoming browser traffic
    pub listener: Listener,
    /// Take the client IP from the first `x-forwarded-for` entry instead of the
    /// peer address. Only enable behind a load balancer that sets the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
    pub upstreams: Upstreams,
    /// File name the SDK route must contain (e.g. `braze.min.js`)
    #[serde(default = "default_sdk_filename")]
    pub sdk_filename: String,
    /// Origins allowed to call the gateway, compared by exact string match
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// API keys accepted in `x-braze-api-key`
    #[serde(default)]
    pub allowed_api_keys: Vec<String>,
    #[serde(default = "default_forwarded_headers")]
    pub forwarded_headers: Vec<String>,
    #[serde(default = "default_blocked_response_headers")]
    pub blocked_response_headers: Vec<String>,
    #[serde(default)]
    pub timeouts: Timeouts,
}

fn default_sdk_filename() -> String {
    DEFAULT_SDK_FILENAME.to_string()
}

fn default_forwarded_headers() -> Vec<String> {
    DEFAULT_FORWARDED_HEADERS
        .iter()
        .map(|h| h.to_string())
        .collect()
}

fn default_blocked_response_headers() -> Vec<String> {
    DEFAULT_BLOCKED_RESPONSE_HEADERS
        .iter()
        .map(|h| h.to_string())
        .collect()
}

impl Config {
    /// Validates the gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.upstreams.validate()?;
        self.timeouts.validate()?;

        if self.sdk_filename.is_empty() {
            return Err(ValidationError::EmptySdkFilename);
        }

        if self.allowed_origins.iter().any(|o| o.is_empty()) {
            return Err(ValidationError::EmptyAllowListEntry("allowed_origins"));
        }
        if self.allowed_api_keys.iter().any(|k| k.is_empty()) {
            return Err(ValidationError::EmptyAllowListEntry("allowed_api_keys"));
        }

        parse_header_names(&self.forwarded_headers)?;
        parse_header_names(&self.blocked_response_headers)?;

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Upstream origins. Request paths are appended to these base URLs verbatim.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Upstreams {
    /// REST API backend, e.g. `https://sdk.iad-01.braze.com`
    pub api_url: Url,
    /// CDN serving the SDK bundle; defaults to [`DEFAULT_CDN_URL`]
    pub cdn_url: Option<Url>,
}

impl Upstreams {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_base_url("api_url", &self.api_url)?;
        if let Some(cdn_url) = &self.cdn_url {
            validate_base_url("cdn_url", cdn_url)?;
        }
        Ok(())
    }
}

fn validate_base_url(field: &'static str, url: &Url) -> Result<(), ValidationError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::InvalidUpstreamUrl(
            field,
            format!("unsupported scheme {}", url.scheme()),
        ));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ValidationError::InvalidUpstreamUrl(
            field,
            "base URL cannot carry a query or fragment".to_string(),
        ));
    }
    Ok(())
}

/// Per-route upstream timeouts in milliseconds
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Timeouts {
    #[serde(default = "default_sdk_timeout_ms")]
    pub sdk_ms: u64,
    #[serde(default = "default_api_timeout_ms")]
    pub api_ms: u64,
}

fn default_sdk_timeout_ms() -> u64 {
    DEFAULT_SDK_TIMEOUT_MS
}

fn default_api_timeout_ms() -> u64 {
    DEFAULT_API_TIMEOUT_MS
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            sdk_ms: DEFAULT_SDK_TIMEOUT_MS,
            api_ms: DEFAULT_API_TIMEOUT_MS,
        }
    }
}

impl Timeouts {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sdk_ms == 0 {
            return Err(ValidationError::ZeroTimeout("sdk"));
        }
        if self.api_ms == 0 {
            return Err(ValidationError::ZeroTimeout("api"));
        }
        Ok(())
    }
}

fn parse_header_names(names: &[String]) -> Result<Vec<HeaderName>, ValidationError> {
    names
        .iter()
        .map(|name| {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ValidationError::InvalidHeaderName(name.clone()))
        })
        .collect()
}

/// Request-time view of [`Config`]: allow-lists as hash sets, header names
/// parsed (and therefore lowercased), timeouts as durations.
///
/// Built once at startup and shared read-only between all requests.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// API base URL without trailing slash
    pub api_base: String,
    /// CDN base URL without trailing slash
    pub cdn_base: String,
    pub sdk_filename: String,
    pub trust_forwarded_for: bool,
    pub allowed_origins: HashSet<String>,
    /// Every allowed origin followed by `/`, the only accepted SDK referers
    pub allowed_referers: HashSet<String>,
    pub allowed_api_keys: HashSet<String>,
    pub forwarded_headers: Vec<HeaderName>,
    pub blocked_response_headers: HashSet<HeaderName>,
    pub sdk_timeout: Duration,
    pub api_timeout: Duration,
}

impl TryFrom<&Config> for GatewayConfig {
    type Error = ValidationError;

    fn try_from(config: &Config) -> Result<Self, Self::Error> {
        config.validate()?;

        let cdn_base = match &config.upstreams.cdn_url {
            Some(url) => base_url(url),
            None => DEFAULT_CDN_URL.to_string(),
        };

        Ok(Self {
            api_base: base_url(&config.upstreams.api_url),
            cdn_base,
            sdk_filename: config.sdk_filename.clone(),
            trust_forwarded_for: config.trust_forwarded_for,
            allowed_origins: config.allowed_origins.iter().cloned().collect(),
            allowed_referers: config
                .allowed_origins
                .iter()
                .map(|origin| format!("{origin}/"))
                .collect(),
            allowed_api_keys: config.allowed_api_keys.iter().cloned().collect(),
            forwarded_headers: parse_header_names(&config.forwarded_headers)?,
            blocked_response_headers: parse_header_names(&config.blocked_response_headers)?
                .into_iter()
                .collect(),
            sdk_timeout: Duration::from_millis(config.timeouts.sdk_ms),
            api_timeout: Duration::from_millis(config.timeouts.api_ms),
        })
    }
}

// `Url` always renders at least a `/` path; paths are appended as-is
fn base_url(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}
