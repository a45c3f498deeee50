use serde::Serialize;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub timeout: u64,
    pub http_pool_max_idle_per_host: usize,
    pub http_pool_idle_timeout_secs: u64,
    pub models_cache_ttl_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_worker_threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_max_blocking_threads: Option<usize>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_timeout() -> u64 {
    180
}
fn default_http_pool_max_idle_per_host() -> usize {
    16
}
fn default_http_pool_idle_timeout_secs() -> u64 {
    15
}
fn default_models_cache_ttl_secs() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            timeout: default_timeout(),
            http_pool_max_idle_per_host: default_http_pool_max_idle_per_host(),
            http_pool_idle_timeout_secs: default_http_pool_idle_timeout_secs(),
            models_cache_ttl_secs: default_models_cache_ttl_secs(),
            runtime_worker_threads: None,
            runtime_max_blocking_threads: Some(8),
        }
    }
}

/// The single upstream provider being proxied, plus the browser identity
/// presented to it.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub origin: String,
    pub referer: String,
    pub user_agent: String,
}

fn default_upstream_base_url() -> String {
    "https://api.deepinfra.com/v1/openai".to_string()
}
fn default_upstream_origin() -> String {
    "https://deepinfra.com".to_string()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        let origin = default_upstream_origin();
        Self {
            base_url: default_upstream_base_url(),
            referer: format!("{origin}/"),
            origin,
            user_agent: default_user_agent(),
        }
    }
}

/// Client authentication configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ClientAuthConfig {
    #[serde(skip_serializing)]
    pub api_key: String,
}

/// CORS configuration. An empty list or a single `"*"` entry means
/// wildcard allow-all; anything else is an origin whitelist.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize)]
pub struct FeaturesConfig {
    pub model_blacklist: Vec<String>,
    pub log_level: String,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            model_blacklist: Vec::new(),
            log_level: default_log_level(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub client_authentication: ClientAuthConfig,
    pub cors: CorsConfig,
    pub features: FeaturesConfig,
}

/// Load configuration from environment variables and validate it.
///
/// Recognized variables: `HOST`, `PORT`, `API_KEY`, `ALLOWED_ORIGINS`,
/// `UPSTREAM_BASE_URL`, `UPSTREAM_ORIGIN`, `UPSTREAM_USER_AGENT`,
/// `MODEL_BLACKLIST`, `MODELS_CACHE_TTL_SECS`, `UPSTREAM_TIMEOUT_SECS`,
/// `HTTP_POOL_MAX_IDLE_PER_HOST`, `HTTP_POOL_IDLE_TIMEOUT_SECS`,
/// `RUNTIME_WORKER_THREADS`, `RUNTIME_MAX_BLOCKING_THREADS`, `LOG_LEVEL`.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when a variable fails to parse, or
/// [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let origin = env_string("UPSTREAM_ORIGIN").unwrap_or_else(default_upstream_origin);
    let config = AppConfig {
        server: ServerConfig {
            port: env_parsed("PORT", default_port())?,
            host: env_string("HOST").unwrap_or_else(default_host),
            timeout: env_parsed("UPSTREAM_TIMEOUT_SECS", default_timeout())?,
            http_pool_max_idle_per_host: env_parsed(
                "HTTP_POOL_MAX_IDLE_PER_HOST",
                default_http_pool_max_idle_per_host(),
            )?,
            http_pool_idle_timeout_secs: env_parsed(
                "HTTP_POOL_IDLE_TIMEOUT_SECS",
                default_http_pool_idle_timeout_secs(),
            )?,
            models_cache_ttl_secs: env_parsed(
                "MODELS_CACHE_TTL_SECS",
                default_models_cache_ttl_secs(),
            )?,
            runtime_worker_threads: env_parsed_opt("RUNTIME_WORKER_THREADS")?,
            runtime_max_blocking_threads: env_parsed_opt("RUNTIME_MAX_BLOCKING_THREADS")?
                .or(Some(8)),
        },
        upstream: UpstreamConfig {
            base_url: env_string("UPSTREAM_BASE_URL").unwrap_or_else(default_upstream_base_url),
            referer: format!("{}/", origin.trim_end_matches('/')),
            origin,
            user_agent: env_string("UPSTREAM_USER_AGENT").unwrap_or_else(default_user_agent),
        },
        client_authentication: ClientAuthConfig {
            api_key: env_string("API_KEY").unwrap_or_default(),
        },
        cors: CorsConfig {
            allowed_origins: env_string("ALLOWED_ORIGINS")
                .map(|raw| parse_list(&raw))
                .unwrap_or_default(),
        },
        features: FeaturesConfig {
            model_blacklist: env_string("MODEL_BLACKLIST")
                .map(|raw| parse_list(&raw))
                .unwrap_or_default(),
            log_level: env_string("LOG_LEVEL").unwrap_or_else(default_log_level),
        },
    };
    validate_config(&config)?;
    Ok(config)
}

fn env_string(var: &'static str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parsed<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env_string(var) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
            var,
            message: format!("{e}"),
        }),
    }
}

fn env_parsed_opt<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    env_string(var)
        .map(|raw| {
            raw.parse().map_err(|e| ConfigError::Invalid {
                var,
                message: format!("{e}"),
            })
        })
        .transpose()
}

/// Split a comma-separated variable into trimmed, non-empty entries.
#[must_use]
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.client_authentication.api_key.trim().is_empty() {
        return Err(validation_err("API_KEY must be set and non-empty"));
    }
    if config.server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "HTTP_POOL_MAX_IDLE_PER_HOST must be greater than 0",
        ));
    }
    if let Some(worker_threads) = config.server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "RUNTIME_WORKER_THREADS must be greater than 0 when set",
            ));
        }
    }
    let parsed = url::Url::parse(&config.upstream.base_url)
        .map_err(|e| validation_err(format!("UPSTREAM_BASE_URL is not a valid URL: {e}")))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(validation_err(
            "UPSTREAM_BASE_URL must use http or https scheme",
        ));
    }
    url::Url::parse(&config.upstream.origin)
        .map_err(|e| validation_err(format!("UPSTREAM_ORIGIN is not a valid URL: {e}")))?;
    Ok(())
}
