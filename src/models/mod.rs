use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

// ── Daily aggregates ──────────────────────────────────────────────────────────

/// One row per calendar date with at least one qualifying event.
/// Dates with no events produce no row (no zero-fill at this stage).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyEventAggregate {
    pub date: NaiveDate,
    pub event_count: u32,
    pub max_magnitude: f64,
}

/// One generated sentiment value per calendar date, nominally in [-1.0, 1.0].
/// The generator is not guaranteed to respect the bound; values pass through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailySentiment {
    pub date: NaiveDate,
    pub avg_sentiment: f64,
}

// ── Merged view ───────────────────────────────────────────────────────────────

/// Inner join of the two daily series, widened with the trailing mean of
/// `event_count`. Only dates present in both sources survive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergedDailyRecord {
    pub date: NaiveDate,
    pub event_count: u32,
    pub max_magnitude: f64,
    pub avg_sentiment: f64,
    pub rolling_avg_count: f64,
}

// ── Derived views ─────────────────────────────────────────────────────────────

/// Fixed-offset candlestick band around a day's sentiment value.
/// `open - close == 0.04` and `high - low == 0.10` hold exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolatilityBand {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Row order of the heatmap grid, top to bottom. Sunday-first descending,
/// the calendar convention of the report this feeds.
pub const WEEKDAY_LABELS: [&str; 7] = [
    "Sunday",
    "Saturday",
    "Friday",
    "Thursday",
    "Wednesday",
    "Tuesday",
    "Monday",
];

/// Row index of a weekday under `WEEKDAY_LABELS` order.
pub fn weekday_row(day: Weekday) -> usize {
    match day {
        Weekday::Sun => 0,
        Weekday::Sat => 1,
        Weekday::Fri => 2,
        Weekday::Thu => 3,
        Weekday::Wed => 4,
        Weekday::Tue => 5,
        Weekday::Mon => 6,
    }
}

/// Dense (day-of-week × ISO week) pivot of daily event counts.
///
/// Rows always cover the full 7-weekday domain in `WEEKDAY_LABELS` order.
/// Columns are the distinct ISO week numbers present in the input, in first
/// appearance order over the date-sorted records, so a window spanning a year
/// boundary stays chronological (..52, 53, 1..). Cells with no underlying
/// record hold 0.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeeklyHeatmapGrid {
    pub weeks: Vec<u32>,
    /// `cells[row][col]`: row per `WEEKDAY_LABELS`, col per `weeks`.
    pub cells: Vec<Vec<u32>>,
}

impl WeeklyHeatmapGrid {
    pub fn total(&self) -> u64 {
        self.cells
            .iter()
            .flat_map(|row| row.iter())
            .map(|&c| u64::from(c))
            .sum()
    }
}

// ── Seismic catalog wire format (GeoJSON subset) ──────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct UsgsResponse {
    #[serde(default)]
    pub features: Vec<UsgsFeature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsgsFeature {
    pub properties: UsgsProperties,
}

/// Only the fields the pipeline consumes. `mag` is nullable upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct UsgsProperties {
    pub time: i64,
    pub mag: Option<f64>,
}

// ── Generation service wire format ────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<GenerateCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateCandidate {
    pub content: CandidateContent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ContentPart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentPart {
    pub text: String,
}

/// One row of the generated series, with the upstream field spellings.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSentimentRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Avg_Sentiment")]
    pub avg_sentiment: f64,
}
