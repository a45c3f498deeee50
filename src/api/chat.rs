use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Deserialize;

use crate::error::{into_axum_response, ProxyError};
use crate::state::AppState;

#[derive(Deserialize)]
struct StreamProbe {
    #[serde(default)]
    stream: bool,
}

/// Forward a chat completion to the upstream and relay its response as an
/// unbuffered byte stream, preserving the upstream status code.
#[must_use]
pub async fn handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Response {
    match forward(&state, &headers, body).await {
        Ok(response) => response,
        Err(err) => into_axum_response(&err),
    }
}

async fn forward(
    state: &AppState,
    headers: &HeaderMap,
    body: bytes::Bytes,
) -> Result<Response, ProxyError> {
    state.authenticate(headers)?;

    let wants_stream = serde_json::from_slice::<StreamProbe>(&body)
        .map(|probe| probe.stream)
        .unwrap_or(false);

    let upstream = state
        .transport
        .send_request(
            state.chat_url(),
            http::Method::POST,
            state.browser_headers(wants_stream),
            body,
        )
        .await?;

    Ok(relay_response(upstream))
}

/// Relay the upstream response to the caller. Status code and headers are
/// preserved verbatim, including non-2xx responses; `content-encoding` and
/// `content-length` are dropped so the server recomputes framing for the
/// re-streamed body, along with the hop-by-hop `transfer-encoding` and
/// `connection` headers.
fn relay_response(response: reqwest::Response) -> Response {
    let status = response.status();
    let mut headers = response.headers().clone();
    headers.remove(http::header::CONTENT_ENCODING);
    headers.remove(http::header::CONTENT_LENGTH);
    headers.remove(http::header::TRANSFER_ENCODING);
    headers.remove(http::header::CONNECTION);

    let is_event_stream = headers
        .get(http::header::CONTENT_TYPE)
        .is_some_and(|value| value.as_bytes().starts_with(b"text/event-stream"));
    if !headers.contains_key(http::header::CONTENT_TYPE) {
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
    }
    if is_event_stream {
        headers.insert(
            http::header::CACHE_CONTROL,
            http::HeaderValue::from_static("no-cache"),
        );
        headers.insert(
            http::header::CONNECTION,
            http::HeaderValue::from_static("keep-alive"),
        );
    }

    let mut relayed = Response::new(axum::body::Body::from_stream(response.bytes_stream()));
    *relayed.status_mut() = status;
    *relayed.headers_mut() = headers;
    relayed
}
