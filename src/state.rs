mod models_cache;

use std::sync::Arc;

use crate::auth::ClientKey;
use crate::config::AppConfig;
use crate::cors::CorsPolicy;
use crate::error::ProxyError;
use crate::transport::{chat_completions_url, models_url, BrowserProfile, HttpTransport};

pub use models_cache::ModelRecord;
use models_cache::ModelCatalog;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub transport: HttpTransport,
    pub cors: CorsPolicy,
    browser: BrowserProfile,
    client_key: ClientKey,
    catalog: ModelCatalog,
    models_url: String,
    chat_url: String,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, transport: HttpTransport) -> Self {
        let cors = CorsPolicy::from_config(&config.cors);
        let browser = BrowserProfile::new(&config.upstream);
        let client_key = ClientKey::from_config(&config);
        let catalog = ModelCatalog::new(
            config.server.models_cache_ttl_secs,
            &config.features.model_blacklist,
        );
        let models_url = models_url(&config.upstream.base_url);
        let chat_url = chat_completions_url(&config.upstream.base_url);

        Self {
            config,
            transport,
            cors,
            browser,
            client_key,
            catalog,
            models_url,
            chat_url,
        }
    }

    /// Authenticate an ingress request using the prebuilt client key.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Auth` when the API key is missing or invalid.
    pub fn authenticate(&self, headers: &http::HeaderMap) -> Result<(), ProxyError> {
        self.client_key.authenticate(headers)
    }

    /// Outbound browser-mimicking headers, negotiated by the streaming flag.
    #[must_use]
    pub fn browser_headers(&self, stream: bool) -> &http::HeaderMap {
        self.browser.headers(stream)
    }

    #[must_use]
    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    /// Return the model catalog, refreshing from the upstream when the cached
    /// snapshot is older than the TTL. Falls back to the last good snapshot
    /// when a refresh attempt fails.
    ///
    /// # Errors
    ///
    /// Returns the fetch error only when no snapshot has ever been cached.
    pub async fn models(&self) -> Result<Arc<Vec<ModelRecord>>, ProxyError> {
        self.catalog
            .get_models(&self.transport, &self.browser, &self.models_url)
            .await
    }
}
