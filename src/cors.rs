use axum::response::{IntoResponse, Response};
use http::header::{HeaderMap, HeaderValue, ORIGIN, VARY};
use http::StatusCode;

use crate::config::CorsConfig;

const ALLOW_ORIGIN: http::HeaderName = http::header::ACCESS_CONTROL_ALLOW_ORIGIN;
const ALLOW_METHODS: http::HeaderName = http::header::ACCESS_CONTROL_ALLOW_METHODS;
const ALLOW_HEADERS: http::HeaderName = http::header::ACCESS_CONTROL_ALLOW_HEADERS;
const MAX_AGE: http::HeaderName = http::header::ACCESS_CONTROL_MAX_AGE;

/// CORS policy applied to every response the proxy produces.
///
/// `Wildcard` allows any origin. `Whitelist` echoes the requesting origin
/// with `Vary: Origin` on a match and stays silent (no allow-origin header)
/// on a miss, which makes the browser block the response.
pub enum CorsPolicy {
    Wildcard,
    Whitelist(Vec<String>),
}

impl CorsPolicy {
    /// Build a policy from the configured origin list. An empty list or a
    /// single `"*"` entry selects the wildcard policy.
    #[must_use]
    pub fn from_config(cors: &CorsConfig) -> Self {
        let origins = &cors.allowed_origins;
        if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
            return CorsPolicy::Wildcard;
        }
        CorsPolicy::Whitelist(
            origins
                .iter()
                .map(|origin| origin.trim_end_matches('/').to_string())
                .collect(),
        )
    }

    fn allow_value(&self, origin: Option<&HeaderValue>) -> Option<HeaderValue> {
        match self {
            CorsPolicy::Wildcard => Some(HeaderValue::from_static("*")),
            CorsPolicy::Whitelist(allowed) => {
                let origin = origin?;
                let requested = origin.to_str().ok()?.trim_end_matches('/');
                allowed
                    .iter()
                    .any(|entry| entry == requested)
                    .then(|| origin.clone())
            }
        }
    }

    /// Overlay CORS headers onto an outgoing response, based on the request's
    /// `Origin` header. A whitelist miss adds nothing.
    pub fn overlay(&self, response_headers: &mut HeaderMap, request_headers: &HeaderMap) {
        let origin = request_headers.get(ORIGIN);
        let Some(value) = self.allow_value(origin) else {
            return;
        };
        response_headers.insert(ALLOW_ORIGIN, value);
        if matches!(self, CorsPolicy::Whitelist(_)) {
            response_headers.insert(VARY, HeaderValue::from_static("Origin"));
        }
    }

    /// Answer an `OPTIONS` preflight: 204 with the allow headers when the
    /// origin passes the policy, 403 without an allow-origin header otherwise.
    #[must_use]
    pub fn preflight(&self, request_headers: &HeaderMap) -> Response {
        let origin = request_headers.get(ORIGIN);
        let Some(value) = self.allow_value(origin) else {
            let body = serde_json::json!({
                "error": {
                    "message": "Origin not allowed",
                    "type": "invalid_request_error",
                    "code": 403,
                    "param": null,
                }
            });
            return (StatusCode::FORBIDDEN, axum::Json(body)).into_response();
        };

        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        headers.insert(ALLOW_ORIGIN, value);
        headers.insert(
            ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        );
        headers.insert(
            ALLOW_HEADERS,
            HeaderValue::from_static("Authorization, Content-Type"),
        );
        headers.insert(MAX_AGE, HeaderValue::from_static("86400"));
        if matches!(self, CorsPolicy::Whitelist(_)) {
            headers.insert(VARY, HeaderValue::from_static("Origin"));
        }
        response
    }
}
