/// Canonical error type used across all modules. Startup configuration
/// failures use [`crate::config::ConfigError`] and never reach a client.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Auth error: {0}")]
    Auth(String),
    #[error("Upstream error: status={status}, message={message}")]
    Upstream { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Broad error category for status code and envelope `type` selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Authentication,
    NotFound,
    MethodNotAllowed,
    PayloadTooLarge,
    ServerError,
}

impl ProxyError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProxyError::Auth(_) => ErrorCategory::Authentication,
            // Catalog refresh failures surface as 500 regardless of the
            // upstream status; passthrough responses keep theirs verbatim.
            ProxyError::Transport(_) | ProxyError::Upstream { .. } => ErrorCategory::ServerError,
        }
    }
}

fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::Authentication => http::StatusCode::UNAUTHORIZED,
        ErrorCategory::NotFound => http::StatusCode::NOT_FOUND,
        ErrorCategory::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
        ErrorCategory::PayloadTooLarge => http::StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCategory::ServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_type(cat: ErrorCategory) -> &'static str {
    match cat {
        ErrorCategory::InvalidRequest
        | ErrorCategory::NotFound
        | ErrorCategory::MethodNotAllowed
        | ErrorCategory::PayloadTooLarge => "invalid_request_error",
        ErrorCategory::Authentication => "authentication_error",
        ErrorCategory::ServerError => "server_error",
    }
}

/// Build the JSON error envelope: `{error:{message, type, code}}` where
/// `code` mirrors the HTTP status.
#[must_use]
pub fn error_envelope(cat: ErrorCategory, message: &str) -> (http::StatusCode, serde_json::Value) {
    let status = http_status_for_category(cat);
    let body = serde_json::json!({
        "error": {
            "message": message,
            "type": error_type(cat),
            "code": status.as_u16(),
            "param": null,
        }
    });
    (status, body)
}

/// Format an error for the client, returning (`status_code`, JSON body).
#[must_use]
pub fn format_error(err: &ProxyError) -> (http::StatusCode, serde_json::Value) {
    error_envelope(err.category(), &err.to_string())
}

/// Convert a `ProxyError` into an axum response.
#[must_use]
pub fn into_axum_response(err: &ProxyError) -> axum::response::Response {
    use axum::response::IntoResponse;
    let (status, body) = format_error(err);
    (status, axum::Json(body)).into_response()
}

impl axum::response::IntoResponse for ProxyError {
    fn into_response(self) -> axum::response::Response {
        into_axum_response(&self)
    }
}

/// Summarize an upstream error body for logs and error envelopes.
///
/// Attempts to extract just the `error.message` field from JSON responses.
/// Falls back to a truncated UTF-8 representation capped at 500 chars.
#[must_use]
pub(crate) fn summarize_upstream_body(body: &[u8]) -> String {
    const MAX_LEN: usize = 500;

    fn truncate(msg: &str) -> String {
        if msg.len() > MAX_LEN {
            let mut end = MAX_LEN;
            while !msg.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &msg[..end])
        } else {
            msg.to_string()
        }
    }

    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) {
        if let Some(msg) = json
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return truncate(msg);
        }
    }

    truncate(&String::from_utf8_lossy(body))
}
