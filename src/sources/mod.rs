pub mod gemini;
pub mod http_client;
pub mod normalize;
pub mod usgs;

use crate::models::{DailyEventAggregate, DailySentiment};
use async_trait::async_trait;
use thiserror::Error;

// ── Failure taxonomy ──────────────────────────────────────────────────────────

/// Everything a source fetch can fail with. All variants are recoverable at
/// the pipeline boundary: a failed fetch degrades to "no data to display".
#[derive(Debug, Error)]
pub enum FetchError {
    /// Seismic catalog transport error or non-2xx status.
    #[error("seismic catalog unavailable: {0}")]
    SourceUnavailable(String),

    /// Sentiment provider transport error or non-2xx status (auth, quota,
    /// rate limit).
    #[error("sentiment service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Sentiment response was not the expected JSON array of dated values.
    /// The provider is instructed to answer with pure JSON but is not
    /// guaranteed to comply.
    #[error("sentiment response malformed: {0}")]
    MalformedResponse(String),

    /// No credential was available. Checked before the call is attempted.
    #[error("sentiment client not configured: set GEMINI_API_KEY or sentiment.api_key")]
    ClientNotConfigured,
}

// ── Source traits ─────────────────────────────────────────────────────────────

/// Swappable seismic catalog abstraction.
#[async_trait]
pub trait QuakeSource: Send + Sync {
    /// Daily aggregates of events at or above `min_magnitude` over the last
    /// `days` days. Empty when the catalog has no qualifying events.
    async fn fetch_daily(
        &self,
        days: u32,
        min_magnitude: f64,
    ) -> Result<Vec<DailyEventAggregate>, FetchError>;
}

/// Swappable sentiment series provider abstraction.
#[async_trait]
pub trait SentimentProvider: Send + Sync {
    /// One generated sentiment value per calendar date over the last `days`
    /// days, as far as the provider honors the request.
    async fn fetch_daily(&self, days: u32) -> Result<Vec<DailySentiment>, FetchError>;
}
