use http::header::AUTHORIZATION;

use crate::config::AppConfig;
use crate::error::ProxyError;

/// Prebuilt client key used in hot-path authentication.
///
/// The full `Bearer <key>` header value is precomputed at startup so each
/// request authenticates with a single byte comparison.
pub struct ClientKey {
    bearer: Box<str>,
}

impl ClientKey {
    #[must_use]
    pub fn new(api_key: &str) -> Self {
        Self {
            bearer: format!("Bearer {api_key}").into_boxed_str(),
        }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.client_authentication.api_key)
    }

    /// Authenticate an incoming request against the configured key.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Auth` when the `Authorization` header is missing
    /// or does not match `Bearer <key>`.
    pub fn authenticate(&self, headers: &http::HeaderMap) -> Result<(), ProxyError> {
        match headers.get(AUTHORIZATION) {
            Some(value) if value.as_bytes() == self.bearer.as_bytes() => Ok(()),
            Some(_) => Err(ProxyError::Auth("Invalid API key".to_string())),
            None => Err(ProxyError::Auth("Missing API key".to_string())),
        }
    }
}
