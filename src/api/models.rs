use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{http::StatusCode, Json};
use serde_json::json;

use crate::error::into_axum_response;
use crate::state::AppState;

/// List upstream models in `OpenAI` format, served from the TTL cache.
#[must_use]
pub async fn handler(State(state): State<Arc<AppState>>) -> Response {
    match state.models().await {
        Ok(records) => {
            let payload = json!({
                "object": "list",
                "data": records.as_ref(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "model catalog unavailable");
            into_axum_response(&err)
        }
    }
}
