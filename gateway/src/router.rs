use crate::types::InboundRequest;

const SDK_PREFIX: &str = "/web-sdk";
const API_PREFIX: &str = "/api/v3/";

/// The two route families the gateway owns
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Web SDK bundle served from the CDN
    Sdk,
    /// REST API relayed to the API backend
    Api,
}

impl Route {
    pub fn name(&self) -> &'static str {
        match self {
            Route::Sdk => "sdk",
            Route::Api => "api",
        }
    }
}

/// Proof that the router took ownership of a request.
///
/// Only [`Router::claim`] can create one, so nothing downstream can respond to
/// a request that was not claimed.
#[derive(Debug)]
pub struct Claim {
    route: Route,
}

impl Claim {
    pub fn route(&self) -> Route {
        self.route
    }
}

/// Matches request paths against the SDK and API route families
#[derive(Clone, Debug)]
pub struct Router {
    sdk_filename: String,
}

impl Router {
    pub fn new(sdk_filename: impl Into<String>) -> Self {
        Self {
            sdk_filename: sdk_filename.into(),
        }
    }

    /// Claims the request if its path belongs to a known route.
    ///
    /// Returns `None` for every other path; the request is left untouched.
    /// Paths with `.` or `..` segments are never claimed: the upstream URL
    /// parser would resolve them and step outside the route prefix.
    pub fn claim(&self, request: &InboundRequest) -> Option<Claim> {
        if has_dot_segment(&request.path) {
            return None;
        }
        let route = self.match_path(&request.path)?;
        Some(Claim { route })
    }

    fn match_path(&self, path: &str) -> Option<Route> {
        if path.starts_with(SDK_PREFIX) && path.contains(self.sdk_filename.as_str()) {
            Some(Route::Sdk)
        } else if path.starts_with(API_PREFIX) {
            Some(Route::Api)
        } else {
            None
        }
    }
}

// `\` separates segments too in http(s) URLs; `%2e` decodes to `.`
fn has_dot_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::inbound_request;
    use http::Method;

    fn route_of(path: &str) -> Option<Route> {
        let router = Router::new("braze.min.js");
        router
            .claim(&inbound_request(Method::GET, path, &[]))
            .map(|claim| claim.route())
    }

    #[test]
    fn test_sdk_route() {
        assert_eq!(route_of("/web-sdk/5.0/braze.min.js"), Some(Route::Sdk));
        assert_eq!(route_of("/web-sdk-v4/braze.min.js"), Some(Route::Sdk));
        assert_eq!(route_of("/web-sdk/5.0/braze.min.js.map"), Some(Route::Sdk));
        // Prefix without the bundle name is not ours
        assert_eq!(route_of("/web-sdk/5.0/other.js"), None);
        assert_eq!(route_of("/static/braze.min.js"), None);
    }

    #[test]
    fn test_api_route() {
        assert_eq!(route_of("/api/v3/data/"), Some(Route::Api));
        assert_eq!(route_of("/api/v3/content_cards/sync"), Some(Route::Api));
        assert_eq!(route_of("/api/v3"), None);
        assert_eq!(route_of("/api/v2/data"), None);
        assert_eq!(route_of("/prefix/api/v3/data"), None);
    }

    #[test]
    fn test_unmatched_paths() {
        assert_eq!(route_of(""), None);
        assert_eq!(route_of("/"), None);
        assert_eq!(route_of("/g/collect"), None);
    }

    #[test]
    fn test_dot_segments_are_not_claimed() {
        for path in [
            "/api/v3/../../internal/admin",
            "/api/v3/%2e%2e/%2E%2E/internal/admin",
            "/api/v3/.%2e/internal",
            "/api/v3/..\\..\\internal",
            "/api/v3/./data",
            "/api/v3/data/..",
            "/web-sdk/../../private/braze.min.js",
            "/web-sdk/%2e%2e/braze.min.js",
        ] {
            assert_eq!(route_of(path), None, "{path} should not be claimed");
        }

        // Dots inside a segment are fine
        assert_eq!(route_of("/api/v3/data.json"), Some(Route::Api));
        assert_eq!(route_of("/api/v3/.well-known"), Some(Route::Api));
        assert_eq!(route_of("/web-sdk/5.0/braze.min.js"), Some(Route::Sdk));
    }

    #[test]
    fn test_custom_sdk_filename() {
        let router = Router::new("sdk.js");
        let req = inbound_request(Method::GET, "/web-sdk/sdk.js", &[]);
        assert_eq!(router.claim(&req).unwrap().route(), Route::Sdk);

        let req = inbound_request(Method::GET, "/web-sdk/braze.min.js", &[]);
        assert!(router.claim(&req).is_none());
    }
}
