use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub seismic: SeismicConfig,
    pub sentiment: SentimentConfig,
    pub pipeline: PipelineConfig,
}

/// Shared HTTP client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Seismic catalog configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeismicConfig {
    #[serde(default = "default_seismic_url")]
    pub base_url: String,
}

/// Sentiment generation service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SentimentConfig {
    #[serde(default = "default_sentiment_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Absence is surfaced as a typed failure before any call is attempted,
    /// never as a mid-call error.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_days")]
    pub days: u32,

    #[serde(default = "default_min_magnitude")]
    pub min_magnitude: f64,

    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    200
}
fn default_jitter_ms() -> u64 {
    150
}
fn default_user_agent() -> String {
    "quake-sentiment-engine/0.1 (research dashboard pipeline)".to_string()
}
fn default_seismic_url() -> String {
    "https://earthquake.usgs.gov/fdsnws/event/1/query".to_string()
}
fn default_sentiment_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_days() -> u32 {
    30
}
fn default_min_magnitude() -> f64 {
    3.0
}
fn default_rolling_window() -> usize {
    7
}
fn default_cache_ttl_secs() -> u64 {
    4 * 60 * 60
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("QUAKE").separator("__"))
            .build()?;

        let mut app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());

        // The credential the original deployment used lives in GEMINI_API_KEY.
        if app_cfg.sentiment.api_key.is_none() {
            app_cfg.sentiment.api_key = std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty());
        }

        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig {
                timeout_secs: default_timeout_secs(),
                request_delay_ms: default_request_delay_ms(),
                jitter_ms: default_jitter_ms(),
                user_agent: default_user_agent(),
            },
            seismic: SeismicConfig {
                base_url: default_seismic_url(),
            },
            sentiment: SentimentConfig {
                base_url: default_sentiment_url(),
                model: default_model(),
                api_key: None,
            },
            pipeline: PipelineConfig {
                days: default_days(),
                min_magnitude: default_min_magnitude(),
                rolling_window: default_rolling_window(),
                cache_ttl_secs: default_cache_ttl_secs(),
            },
        }
    }
}
