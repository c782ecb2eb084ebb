//! Environment-driven configuration for the generation pipeline.
//!
//! The credential is accepted under several variable names for compatibility
//! with existing deployments. Retry count, timeouts, and cache sizing are
//! fixed constants rather than environment-tunable.

use std::time::Duration;

/// Google Generative Language REST endpoint. Already includes the `/models`
/// path segment, so model names must not repeat it.
pub const GENAI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1/models";

/// Default model when `GOOGLE_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";

/// Environment variables accepted for the API credential, in precedence order.
pub const CREDENTIAL_VARS: [&str; 3] = ["GOOGLE_API_KEY", "GENERATIVE_API_KEY", "GEMINI_API_KEY"];

/// Additional attempts after the first failed call.
pub const MAX_RETRIES: u32 = 2;

/// Hard per-attempt timeout on the generation request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Maximum number of plans held in the cache.
pub const CACHE_CAPACITY: usize = 50;

/// Default time-to-live for a cached plan.
pub const CACHE_TTL: Duration = Duration::from_millis(3_600_000);

/// How often the background sweeper removes expired cache entries.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Resolved configuration for the generation client.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// API credential, if any is configured. Absence is not an error here;
    /// the client degrades to the mock plan when no credential exists.
    pub api_key: Option<String>,

    /// Model name, possibly carrying a `models/` prefix.
    pub model: String,

    pub max_retries: u32,
    pub request_timeout: Duration,
}

impl GenerationConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        let api_key = CREDENTIAL_VARS
            .iter()
            .find_map(|name| std::env::var(name).ok())
            .filter(|value| !value.trim().is_empty());

        let model = std::env::var("GOOGLE_MODEL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Self {
            api_key,
            model,
            max_retries: MAX_RETRIES,
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    /// Model identifier with any leading `models/` prefix stripped, so URL
    /// assembly never produces `models/models/...`.
    pub fn model_id(&self) -> &str {
        self.model.strip_prefix("models/").unwrap_or(&self.model)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_retries: MAX_RETRIES,
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}
