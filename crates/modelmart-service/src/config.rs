//! Service configuration.

use std::time::Duration;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/modelmart").
    pub data_dir: String,

    /// Header carrying the caller's API key (default: "x-api-key").
    pub api_key_header: String,

    /// HMAC key used to hash API keys at rest.
    pub api_key_pepper: String,

    /// HS256 secret for dashboard session tokens. Session routes reject
    /// every request when unset.
    pub session_secret: Option<String>,

    /// Admin API key. Admin routes are disabled when unset.
    pub admin_api_key: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Upper bound for a single blocking store call, in milliseconds.
    pub store_timeout_ms: u64,

    /// Upper bound for one inference call, in milliseconds.
    pub inference_timeout_ms: u64,

    /// Remote inference endpoint. The mock backend is used when unset.
    pub inference_url: Option<String>,

    /// Number of models in the analytics top list.
    pub analytics_top_n: usize,

    /// Largest accepted analytics window in days.
    pub analytics_max_days: u32,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            api_key_header: std::env::var("API_KEY_HEADER")
                .map(|h| h.to_ascii_lowercase())
                .unwrap_or(defaults.api_key_header),
            api_key_pepper: std::env::var("API_KEY_PEPPER").unwrap_or_else(|_| {
                tracing::warn!("API_KEY_PEPPER not set - using the development pepper");
                defaults.api_key_pepper
            }),
            session_secret: std::env::var("SESSION_SECRET").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
            store_timeout_ms: env_parse("STORE_TIMEOUT_MS").unwrap_or(defaults.store_timeout_ms),
            inference_timeout_ms: env_parse("INFERENCE_TIMEOUT_MS")
                .unwrap_or(defaults.inference_timeout_ms),
            inference_url: std::env::var("INFERENCE_URL").ok(),
            analytics_top_n: env_parse("ANALYTICS_TOP_N").unwrap_or(defaults.analytics_top_n),
            analytics_max_days: env_parse("ANALYTICS_MAX_DAYS")
                .unwrap_or(defaults.analytics_max_days)
                .max(1),
        }
    }

    /// Store call timeout.
    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Inference call timeout.
    #[must_use]
    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    /// Whole-request timeout enforced by the router.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Budget for long handler work such as analytics scans. Kept below
    /// [`Self::request_timeout`] so the handler reports its own error first.
    #[must_use]
    pub fn handler_budget(&self) -> Duration {
        self.request_timeout() * 9 / 10
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/modelmart".into(),
            api_key_header: "x-api-key".into(),
            api_key_pepper: "modelmart-dev-pepper".into(),
            session_secret: None,
            admin_api_key: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            store_timeout_ms: 2_000,
            inference_timeout_ms: 10_000,
            inference_url: None,
            analytics_top_n: 5,
            analytics_max_days: 365,
        }
    }
}
