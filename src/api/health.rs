use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::cors::CorsPolicy;
use crate::state::AppState;

/// Health check handler.
/// Returns JSON with status and config summary.
pub fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "ok",
        "config": {
            "upstream_base_url": config.upstream.base_url,
            "models_cache_ttl_secs": config.server.models_cache_ttl_secs,
            "model_blacklist_count": config.features.model_blacklist.len(),
            "cors": match state.cors {
                CorsPolicy::Wildcard => "wildcard",
                CorsPolicy::Whitelist(_) => "whitelist",
            },
            "log_level": config.features.log_level,
        }
    }))
}
