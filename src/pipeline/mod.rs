//! Pipeline orchestrator: ties the two sources → analysis together.
//!
//! One `run()` per operator-triggered refresh. The two upstream fetches are
//! independent and run concurrently; both results must be in hand before
//! alignment (join-point synchronization, no ordering between the fetches).
//! A source failure is logged and degrades that series to empty; it never
//! propagates past this boundary. An empty series on either side means the
//! run refuses to align and reports why instead of producing partial,
//! misleading output. Re-running the same parameters within the cache TTL
//! serves memoized results.

use crate::analysis;
use crate::cache::TtlCache;
use crate::config::AppConfig;
use crate::models::{
    DailyEventAggregate, DailySentiment, MergedDailyRecord, VolatilityBand, WeeklyHeatmapGrid,
};
use crate::sources::gemini::GeminiSentiment;
use crate::sources::usgs::UsgsCatalog;
use crate::sources::{FetchError, QuakeSource, SentimentProvider};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// ── Outcome types ─────────────────────────────────────────────────────────────

/// Everything the presentation layer consumes for one refresh.
#[derive(Debug)]
pub struct DashboardData {
    pub merged: Vec<MergedDailyRecord>,
    pub correlation: f64,
    pub heatmap: WeeklyHeatmapGrid,
    pub bands: Vec<VolatilityBand>,
    /// Event days the inner join dropped for lack of a sentiment value.
    pub quake_only_days: usize,
    /// Sentiment days the inner join dropped for lack of events.
    pub sentiment_only_days: usize,
    pub total_events: u64,
}

/// A run either produces a full report or a reasoned refusal. Fetch failures
/// are never fatal to the process.
#[derive(Debug)]
pub enum RunOutcome {
    Report(DashboardData),
    NoData { reasons: Vec<String> },
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

pub struct Pipeline {
    quakes: Arc<dyn QuakeSource>,
    sentiment: Arc<dyn SentimentProvider>,
    quake_cache: TtlCache<(u32, u32), Vec<DailyEventAggregate>>,
    sentiment_cache: TtlCache<u32, Vec<DailySentiment>>,
    window: usize,
}

impl Pipeline {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let quakes = Arc::new(
            UsgsCatalog::new(&config.http, &config.seismic)
                .context("Failed to build seismic source")?,
        );
        let sentiment = Arc::new(
            GeminiSentiment::new(&config.http, &config.sentiment)
                .context("Failed to build sentiment source")?,
        );

        Ok(Self::with_sources(
            quakes,
            sentiment,
            config.pipeline.rolling_window,
            Duration::from_secs(config.pipeline.cache_ttl_secs),
        ))
    }

    /// Assemble a pipeline from explicit sources. This is also the seam the
    /// tests use to substitute stub sources.
    pub fn with_sources(
        quakes: Arc<dyn QuakeSource>,
        sentiment: Arc<dyn SentimentProvider>,
        window: usize,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            quakes,
            sentiment,
            quake_cache: TtlCache::new(cache_ttl),
            sentiment_cache: TtlCache::new(cache_ttl),
            window,
        }
    }

    pub async fn run(&self, days: u32, min_magnitude: f64) -> RunOutcome {
        let (quakes_res, sentiment_res) = tokio::join!(
            self.quakes_daily(days, min_magnitude),
            self.sentiment_daily(days),
        );

        let mut reasons = Vec::new();

        let quakes = match quakes_res {
            Ok(rows) if rows.is_empty() => {
                reasons.push("seismic catalog returned no qualifying events".to_string());
                rows
            }
            Ok(rows) => rows,
            Err(e) => {
                warn!("Seismic fetch failed: {e}");
                reasons.push(e.to_string());
                Vec::new()
            }
        };

        let sentiment = match sentiment_res {
            Ok(rows) if rows.is_empty() => {
                reasons.push("sentiment service returned no rows".to_string());
                rows
            }
            Ok(rows) => rows,
            Err(e) => {
                warn!("Sentiment fetch failed: {e}");
                reasons.push(e.to_string());
                Vec::new()
            }
        };

        if !reasons.is_empty() {
            return RunOutcome::NoData { reasons };
        }

        let merged = analysis::align(&quakes, &sentiment, self.window);
        if merged.is_empty() {
            return RunOutcome::NoData {
                reasons: vec![format!(
                    "no overlapping dates between {} event days and {} sentiment days",
                    quakes.len(),
                    sentiment.len()
                )],
            };
        }

        let data = DashboardData {
            correlation: analysis::correlation(&merged),
            heatmap: analysis::pivot_weekly(&merged),
            bands: analysis::volatility_band(&merged),
            quake_only_days: quakes.len() - merged.len(),
            sentiment_only_days: sentiment.len() - merged.len(),
            total_events: quakes.iter().map(|q| u64::from(q.event_count)).sum(),
            merged,
        };

        info!(
            "=== Done: {} merged days | corr {:.4} | {} event-only days | {} sentiment-only days ===",
            data.merged.len(),
            data.correlation,
            data.quake_only_days,
            data.sentiment_only_days,
        );

        RunOutcome::Report(data)
    }

    /// Seismic aggregates through the cache. Also the `quakes` subcommand path.
    pub async fn quakes_daily(
        &self,
        days: u32,
        min_magnitude: f64,
    ) -> Result<Vec<DailyEventAggregate>, FetchError> {
        let key = (days, magnitude_tenths(min_magnitude));
        if let Some(hit) = self.quake_cache.get(&key) {
            debug!("Seismic cache hit for {:?}", key);
            return Ok(hit);
        }

        let rows = self.quakes.fetch_daily(days, min_magnitude).await?;
        self.quake_cache.insert(key, rows.clone());
        Ok(rows)
    }

    /// Sentiment series through the cache. Also the `sentiment` subcommand path.
    pub async fn sentiment_daily(&self, days: u32) -> Result<Vec<DailySentiment>, FetchError> {
        if let Some(hit) = self.sentiment_cache.get(&days) {
            debug!("Sentiment cache hit for {} days", days);
            return Ok(hit);
        }

        let rows = self.sentiment.fetch_daily(days).await?;
        self.sentiment_cache.insert(days, rows.clone());
        Ok(rows)
    }
}

/// Cache key for a magnitude threshold. The operator surface steps the
/// threshold in tenths, so this loses nothing.
fn magnitude_tenths(min_magnitude: f64) -> u32 {
    (min_magnitude * 10.0).round() as u32
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    struct StubQuakes {
        rows: Vec<DailyEventAggregate>,
        calls: AtomicUsize,
    }

    impl StubQuakes {
        fn new(rows: Vec<DailyEventAggregate>) -> Self {
            Self {
                rows,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl QuakeSource for StubQuakes {
        async fn fetch_daily(
            &self,
            _days: u32,
            _min_magnitude: f64,
        ) -> Result<Vec<DailyEventAggregate>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows.clone())
        }
    }

    struct StubSentiment(Vec<DailySentiment>);

    #[async_trait]
    impl SentimentProvider for StubSentiment {
        async fn fetch_daily(&self, _days: u32) -> Result<Vec<DailySentiment>, FetchError> {
            Ok(self.0.clone())
        }
    }

    struct MalformedSentiment;

    #[async_trait]
    impl SentimentProvider for MalformedSentiment {
        async fn fetch_daily(&self, _days: u32) -> Result<Vec<DailySentiment>, FetchError> {
            Err(FetchError::MalformedResponse(
                "candidate text is not a sentiment array".to_string(),
            ))
        }
    }

    fn quake_rows() -> Vec<DailyEventAggregate> {
        vec![
            DailyEventAggregate {
                date: date(1),
                event_count: 3,
                max_magnitude: 4.0,
            },
            DailyEventAggregate {
                date: date(2),
                event_count: 5,
                max_magnitude: 4.4,
            },
        ]
    }

    fn sentiment_rows() -> Vec<DailySentiment> {
        vec![
            DailySentiment {
                date: date(1),
                avg_sentiment: 0.1,
            },
            DailySentiment {
                date: date(2),
                avg_sentiment: -0.2,
            },
            DailySentiment {
                date: date(3),
                avg_sentiment: 0.0,
            },
        ]
    }

    fn pipeline(
        quakes: Vec<DailyEventAggregate>,
        sentiment: Vec<DailySentiment>,
    ) -> Pipeline {
        Pipeline::with_sources(
            Arc::new(StubQuakes::new(quakes)),
            Arc::new(StubSentiment(sentiment)),
            7,
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_run_produces_full_report() {
        let p = pipeline(quake_rows(), sentiment_rows());
        let outcome = tokio_test::block_on(p.run(30, 3.0));

        let RunOutcome::Report(data) = outcome else {
            panic!("expected a report");
        };
        assert_eq!(data.merged.len(), 2);
        assert_eq!(data.quake_only_days, 0);
        assert_eq!(data.sentiment_only_days, 1);
        assert_eq!(data.total_events, 8);
        assert_eq!(data.bands.len(), 2);
        assert_eq!(data.heatmap.total(), 8);
    }

    #[test]
    fn test_empty_seismic_refuses_to_align() {
        let p = pipeline(Vec::new(), sentiment_rows());
        let outcome = tokio_test::block_on(p.run(30, 3.0));

        let RunOutcome::NoData { reasons } = outcome else {
            panic!("expected a refusal");
        };
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("no qualifying events"));
    }

    #[test]
    fn test_malformed_sentiment_halts_before_alignment() {
        let p = Pipeline::with_sources(
            Arc::new(StubQuakes::new(quake_rows())),
            Arc::new(MalformedSentiment),
            7,
            Duration::from_secs(60),
        );
        let outcome = tokio_test::block_on(p.run(30, 3.0));

        let RunOutcome::NoData { reasons } = outcome else {
            panic!("expected a refusal");
        };
        assert!(reasons[0].contains("malformed"));
    }

    #[test]
    fn test_repeat_run_hits_cache() {
        let quakes = Arc::new(StubQuakes::new(quake_rows()));
        let p = Pipeline::with_sources(
            Arc::clone(&quakes) as Arc<dyn QuakeSource>,
            Arc::new(StubSentiment(sentiment_rows())),
            7,
            Duration::from_secs(60),
        );

        tokio_test::block_on(p.run(30, 3.0));
        tokio_test::block_on(p.run(30, 3.0));
        assert_eq!(quakes.calls.load(Ordering::SeqCst), 1);

        // A different parameter set must not be served from the same entry.
        tokio_test::block_on(p.run(30, 3.5));
        assert_eq!(quakes.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_magnitude_tenths_key() {
        assert_eq!(magnitude_tenths(3.0), 30);
        assert_eq!(magnitude_tenths(2.5), 25);
        assert_ne!(magnitude_tenths(3.0), magnitude_tenths(3.5));
    }
}
