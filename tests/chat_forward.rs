use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use mimic_rs::config::{
    AppConfig, ClientAuthConfig, CorsConfig, FeaturesConfig, ServerConfig, UpstreamConfig,
};
use mimic_rs::routing::dispatch::dispatch_request;
use mimic_rs::state::AppState;
use mimic_rs::transport::HttpTransport;
use serde_json::json;

fn build_state(base_url: String) -> Arc<AppState> {
    let config = AppConfig {
        server: ServerConfig::default(),
        upstream: UpstreamConfig {
            base_url,
            origin: "https://mimic.test".to_string(),
            referer: "https://mimic.test/".to_string(),
            user_agent: "Mozilla/5.0 (test)".to_string(),
        },
        client_authentication: ClientAuthConfig {
            api_key: "client-key".to_string(),
        },
        cors: CorsConfig::default(),
        features: FeaturesConfig {
            model_blacklist: vec![],
            log_level: "DISABLED".to_string(),
        },
    };
    let transport = HttpTransport::new(&config.server);
    Arc::new(AppState::new(config, transport))
}

async fn spawn_upstream(app: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/v1"), server)
}

fn chat_request(auth: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).expect("serialize")))
        .expect("build request")
}

async fn body_json(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&body).expect("json payload")
}

#[tokio::test]
async fn test_chat_passthrough_preserves_body() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            Json(json!({
                "id": "chatcmpl_mock",
                "object": "chat.completion",
                "created": 1_727_000_000_u64,
                "model": "gpt-4o-mini",
                "choices": [
                    {
                        "index": 0,
                        "message": { "role": "assistant", "content": "pong" },
                        "finish_reason": "stop"
                    }
                ]
            }))
        }),
    );
    let (base_url, server) = spawn_upstream(app).await;
    let state = build_state(base_url);

    let request = chat_request(
        Some("Bearer client-key"),
        json!({
            "model": "gpt-4o-mini",
            "messages": [ { "role": "user", "content": "ping" } ],
            "stream": false
        }),
    );
    let response = dispatch_request(state, request).await.expect("dispatch");
    assert_eq!(response.status(), StatusCode::OK);

    let payload = body_json(response).await;
    assert_eq!(payload["choices"][0]["message"]["content"], "pong");
    server.abort();
}

#[tokio::test]
async fn test_chat_outbound_headers_mimic_browser() {
    // The mock upstream echoes the request headers it saw so the test can
    // assert on the outbound identity.
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|headers: HeaderMap| async move {
            let seen = |name: &str| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string()
            };
            Json(json!({
                "user_agent": seen("user-agent"),
                "origin": seen("origin"),
                "referer": seen("referer"),
                "accept": seen("accept"),
                "authorization": seen("authorization"),
            }))
        }),
    );
    let (base_url, server) = spawn_upstream(app).await;
    let state = build_state(base_url);

    let request = chat_request(
        Some("Bearer client-key"),
        json!({
            "model": "gpt-4o-mini",
            "messages": [ { "role": "user", "content": "ping" } ]
        }),
    );
    let response = dispatch_request(state, request).await.expect("dispatch");
    assert_eq!(response.status(), StatusCode::OK);

    let payload = body_json(response).await;
    assert_eq!(payload["user_agent"], "Mozilla/5.0 (test)");
    assert_eq!(payload["origin"], "https://mimic.test");
    assert_eq!(payload["referer"], "https://mimic.test/");
    assert_eq!(payload["accept"], "application/json");
    // The client bearer must never reach the upstream.
    assert_eq!(payload["authorization"], "");
    server.abort();
}

#[tokio::test]
async fn test_chat_without_authorization_is_401() {
    let state = build_state("http://127.0.0.1:9/v1".to_string());

    let request = chat_request(
        None,
        json!({ "model": "gpt-4o-mini", "messages": [] }),
    );
    let response = dispatch_request(state, request).await.expect("dispatch");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let payload = body_json(response).await;
    assert_eq!(payload["error"]["type"], "authentication_error");
    assert_eq!(payload["error"]["code"], 401);
}

#[tokio::test]
async fn test_chat_with_wrong_key_is_401() {
    let state = build_state("http://127.0.0.1:9/v1".to_string());

    let request = chat_request(
        Some("Bearer wrong-key"),
        json!({ "model": "gpt-4o-mini", "messages": [] }),
    );
    let response = dispatch_request(state, request).await.expect("dispatch");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let payload = body_json(response).await;
    assert_eq!(payload["error"]["type"], "authentication_error");
}

#[tokio::test]
async fn test_chat_stream_passthrough_relays_sse() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|headers: HeaderMap| async move {
            assert_eq!(
                headers.get("accept").and_then(|v| v.to_str().ok()),
                Some("text/event-stream")
            );
            let sse = concat!(
                "data: {\"id\":\"chatcmpl_mock\",\"object\":\"chat.completion.chunk\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"str\"},\"finish_reason\":null}]}\n\n",
                "data: {\"id\":\"chatcmpl_mock\",\"object\":\"chat.completion.chunk\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"eam\"},\"finish_reason\":\"stop\"}]}\n\n",
                "data: [DONE]\n\n"
            );
            Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "text/event-stream")
                .body(Body::from(sse))
                .expect("stream response")
        }),
    );
    let (base_url, server) = spawn_upstream(app).await;
    let state = build_state(base_url);

    let request = chat_request(
        Some("Bearer client-key"),
        json!({
            "model": "gpt-4o-mini",
            "messages": [ { "role": "user", "content": "ping" } ],
            "stream": true
        }),
    );
    let response = dispatch_request(state, request).await.expect("dispatch");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );
    assert_eq!(
        response
            .headers()
            .get("cache-control")
            .and_then(|v| v.to_str().ok()),
        Some("no-cache")
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    let body_text = String::from_utf8(body.to_vec()).expect("utf8 body");
    assert!(body_text.contains("\"content\":\"str\""));
    assert!(body_text.contains("\"content\":\"eam\""));
    assert!(body_text.contains("[DONE]"));
    server.abort();
}

#[tokio::test]
async fn test_chat_upstream_response_headers_relayed() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            (
                [
                    ("x-request-id", "req-abc123"),
                    ("x-ratelimit-remaining-requests", "41"),
                    ("content-encoding", "identity"),
                ],
                Json(json!({ "id": "chatcmpl_mock", "object": "chat.completion" })),
            )
        }),
    );
    let (base_url, server) = spawn_upstream(app).await;
    let state = build_state(base_url);

    let request = chat_request(
        Some("Bearer client-key"),
        json!({ "model": "gpt-4o-mini", "messages": [] }),
    );
    let response = dispatch_request(state, request).await.expect("dispatch");
    assert_eq!(response.status(), StatusCode::OK);

    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    assert_eq!(header("x-request-id").as_deref(), Some("req-abc123"));
    assert_eq!(
        header("x-ratelimit-remaining-requests").as_deref(),
        Some("41")
    );
    // Framing headers are recomputed for the re-streamed body.
    assert_eq!(header("content-encoding"), None);
    assert_eq!(header("content-length"), None);
    server.abort();
}

#[tokio::test]
async fn test_chat_upstream_error_status_relayed_verbatim() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": { "message": "rate limited", "type": "rate_limit_error" } })),
            )
        }),
    );
    let (base_url, server) = spawn_upstream(app).await;
    let state = build_state(base_url);

    let request = chat_request(
        Some("Bearer client-key"),
        json!({ "model": "gpt-4o-mini", "messages": [] }),
    );
    let response = dispatch_request(state, request).await.expect("dispatch");
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let payload = body_json(response).await;
    assert_eq!(payload["error"]["message"], "rate limited");
    server.abort();
}

#[tokio::test]
async fn test_chat_transport_error_is_500() {
    // Nothing listens on this port; the connect fails immediately.
    let state = build_state("http://127.0.0.1:9/v1".to_string());

    let request = chat_request(
        Some("Bearer client-key"),
        json!({ "model": "gpt-4o-mini", "messages": [] }),
    );
    let response = dispatch_request(state, request).await.expect("dispatch");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let payload = body_json(response).await;
    assert_eq!(payload["error"]["type"], "server_error");
    assert_eq!(payload["error"]["code"], 500);
}
