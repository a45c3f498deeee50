use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{self, Body};
use axum::extract::State;
use axum::http::{Method, Request};
use axum::response::{IntoResponse, Response};

use crate::api::{chat, health, models};
use crate::error::{error_envelope, ErrorCategory};
use crate::state::AppState;

const DEFAULT_BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone, Copy, PartialEq, Eq)]
enum RouteMatch {
    Health,
    Models,
    ChatCompletions,
    Preflight,
    MethodNotAllowed,
    NotFound,
}

/// Dispatch a raw HTTP request to the matching handler, then overlay the
/// CORS policy onto the response.
///
/// # Errors
///
/// This function currently never returns `Err` and uses `Infallible`.
pub async fn dispatch_request(
    state: Arc<AppState>,
    request: Request<Body>,
) -> Result<Response, Infallible> {
    let (parts, body) = request.into_parts();
    let route = match_route(&parts.method, parts.uri.path());

    let mut response = match route {
        RouteMatch::Health => health::health_handler(State(Arc::clone(&state))).into_response(),
        RouteMatch::Models => models::handler(State(Arc::clone(&state))).await,
        RouteMatch::ChatCompletions => match read_request_body(body).await {
            Ok(bytes) => {
                chat::handler(State(Arc::clone(&state)), parts.headers.clone(), bytes).await
            }
            Err(response) => response,
        },
        RouteMatch::Preflight => state.cors.preflight(&parts.headers),
        RouteMatch::MethodNotAllowed => {
            let (status, payload) =
                error_envelope(ErrorCategory::MethodNotAllowed, "Method not allowed");
            (status, axum::Json(payload)).into_response()
        }
        RouteMatch::NotFound => {
            let (status, payload) = error_envelope(ErrorCategory::NotFound, "Not found");
            (status, axum::Json(payload)).into_response()
        }
    };

    if route != RouteMatch::Preflight {
        state.cors.overlay(response.headers_mut(), &parts.headers);
    }
    Ok(response)
}

async fn read_request_body(body: Body) -> Result<bytes::Bytes, Response> {
    body::to_bytes(body, DEFAULT_BODY_LIMIT_BYTES)
        .await
        .map_err(|_| {
            let (status, payload) = error_envelope(
                ErrorCategory::PayloadTooLarge,
                "Request body too large (max 2 MiB)",
            );
            (status, axum::Json(payload)).into_response()
        })
}

fn match_route(method: &Method, path: &str) -> RouteMatch {
    // Preflight is answered on every path.
    if method == Method::OPTIONS {
        return RouteMatch::Preflight;
    }

    match path {
        "/" | "/health" | "/v1/health" => {
            if method == Method::GET {
                RouteMatch::Health
            } else {
                RouteMatch::MethodNotAllowed
            }
        }
        "/models" | "/v1/models" => {
            if method == Method::GET {
                RouteMatch::Models
            } else {
                RouteMatch::MethodNotAllowed
            }
        }
        "/chat/completions" | "/v1/chat/completions" => {
            if method == Method::POST {
                RouteMatch::ChatCompletions
            } else {
                RouteMatch::MethodNotAllowed
            }
        }
        _ => RouteMatch::NotFound,
    }
}
