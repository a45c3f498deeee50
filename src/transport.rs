use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::config::{ServerConfig, UpstreamConfig};
use crate::error::ProxyError;

fn build_reqwest_client(
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    timeout: Duration,
) -> Result<reqwest::Client, ProxyError> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(pool_max_idle_per_host)
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(Duration::from_secs(5))
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .timeout(timeout)
        .build()
        .map_err(|err| ProxyError::Transport(format!("Failed to build HTTP client: {err}")))
}

/// HTTP transport client for sending requests to the upstream provider.
pub struct HttpTransport {
    client: OnceLock<Arc<reqwest::Client>>,
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a new transport with connection pooling and timeouts from the given server config.
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        let pool_idle_timeout = if config.http_pool_idle_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(config.http_pool_idle_timeout_secs))
        };
        Self {
            client: OnceLock::new(),
            pool_max_idle_per_host: config.http_pool_max_idle_per_host.max(1),
            pool_idle_timeout,
            timeout: Duration::from_secs(config.timeout),
        }
    }

    fn client(&self) -> Arc<reqwest::Client> {
        if let Some(existing) = self.client.get() {
            return existing.clone();
        }

        let built = match build_reqwest_client(
            self.pool_max_idle_per_host,
            self.pool_idle_timeout,
            self.timeout,
        ) {
            Ok(client) => Arc::new(client),
            Err(err) => {
                tracing::error!(error = %err, "failed to build configured reqwest client, falling back to default client");
                Arc::new(reqwest::Client::new())
            }
        };
        let _ = self.client.set(built.clone());
        self.client.get().cloned().unwrap_or(built)
    }

    /// Send a request to the upstream provider. No retries are performed; a
    /// transport failure is reported to the caller as-is.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Transport`] when URL parsing or request
    /// execution fails.
    pub async fn send_request(
        &self,
        url: &str,
        method: http::Method,
        headers: &http::HeaderMap,
        body: bytes::Bytes,
    ) -> Result<reqwest::Response, ProxyError> {
        let url = url::Url::parse(url)
            .map_err(|e| ProxyError::Transport(format!("Invalid upstream URL: {e}")))?;
        let mut request = reqwest::Request::new(method, url);
        *request.headers_mut() = headers.clone();
        if !body.is_empty() {
            *request.body_mut() = Some(reqwest::Body::from(body));
        }

        self.client()
            .execute(request)
            .await
            .map_err(|err| ProxyError::Transport(err.to_string()))
    }
}

/// Startup-precomputed browser-mimicking header sets for upstream requests.
///
/// The upstream sees a fixed browser identity instead of the proxy's own;
/// the client's bearer token is never forwarded.
pub struct BrowserProfile {
    json_headers: http::HeaderMap,
    stream_headers: http::HeaderMap,
}

impl BrowserProfile {
    #[must_use]
    pub fn new(upstream: &UpstreamConfig) -> Self {
        let base = Self::build_base_headers(upstream);

        let mut json_headers = base.clone();
        json_headers.insert(
            http::header::ACCEPT,
            http::HeaderValue::from_static("application/json"),
        );

        let mut stream_headers = base;
        stream_headers.insert(
            http::header::ACCEPT,
            http::HeaderValue::from_static("text/event-stream"),
        );

        Self {
            json_headers,
            stream_headers,
        }
    }

    /// Outbound headers negotiated by whether the caller requested streaming.
    #[must_use]
    pub fn headers(&self, stream: bool) -> &http::HeaderMap {
        if stream {
            &self.stream_headers
        } else {
            &self.json_headers
        }
    }

    fn build_base_headers(upstream: &UpstreamConfig) -> http::HeaderMap {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        if let Ok(val) = http::HeaderValue::from_str(&upstream.user_agent) {
            headers.insert(http::header::USER_AGENT, val);
        }
        if let Ok(val) = http::HeaderValue::from_str(&upstream.origin) {
            headers.insert(http::header::ORIGIN, val);
        }
        if let Ok(val) = http::HeaderValue::from_str(&upstream.referer) {
            headers.insert(http::header::REFERER, val);
        }
        headers.insert(
            http::header::ACCEPT_LANGUAGE,
            http::HeaderValue::from_static("en-US,en;q=0.9"),
        );
        headers
    }
}

/// Build the upstream model catalog URL from the configured base URL.
#[must_use]
pub fn models_url(base_url: &str) -> String {
    format!("{}/models", base_url.trim_end_matches('/'))
}

/// Build the upstream chat completions URL from the configured base URL.
#[must_use]
pub fn chat_completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}
