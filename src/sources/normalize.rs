use crate::models::{DailyEventAggregate, DailySentiment, RawSentimentRow, UsgsFeature};
use chrono::{DateTime, NaiveDate};
use std::collections::BTreeMap;
use tracing::warn;

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Event epoch timestamp (milliseconds) → UTC calendar date.
pub fn epoch_ms_to_date(ms: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

/// Parse the `YYYY-MM-DD` date spelling the generator is instructed to use.
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

// ── Raw events → DailyEventAggregate ──────────────────────────────────────────

/// Group raw catalog events by UTC calendar date.
///
/// Events with no magnitude or an unrepresentable timestamp are dropped with
/// a warning. For the rows that survive, the per-date count and maximum
/// magnitude are exact over that date's subset.
pub fn group_events_daily(features: &[UsgsFeature]) -> Vec<DailyEventAggregate> {
    let mut by_date: BTreeMap<NaiveDate, (u32, f64)> = BTreeMap::new();

    for feature in features {
        let props = &feature.properties;

        let Some(mag) = props.mag else {
            warn!("Event at t={} has no magnitude, skipping", props.time);
            continue;
        };
        let Some(date) = epoch_ms_to_date(props.time) else {
            warn!("Event timestamp {} out of range, skipping", props.time);
            continue;
        };

        let entry = by_date.entry(date).or_insert((0, mag));
        entry.0 += 1;
        if mag > entry.1 {
            entry.1 = mag;
        }
    }

    by_date
        .into_iter()
        .map(|(date, (event_count, max_magnitude))| DailyEventAggregate {
            date,
            event_count,
            max_magnitude,
        })
        .collect()
}

// ── Raw sentiment rows → DailySentiment ───────────────────────────────────────

/// Validate generated rows into at-most-one-value-per-date form.
///
/// The generator is asked for a continuous daily series in [-1, 1] but is not
/// contractually bound to it: rows with unparseable dates are dropped with a
/// warning, duplicate dates keep the first occurrence, out-of-range values
/// are logged but passed through, and gaps are left as gaps.
pub fn daily_sentiment_rows(rows: Vec<RawSentimentRow>) -> Vec<DailySentiment> {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for row in rows {
        let Some(date) = parse_iso_date(&row.date) else {
            warn!("Unparseable sentiment date {:?}, skipping row", row.date);
            continue;
        };

        if by_date.contains_key(&date) {
            warn!("Duplicate sentiment date {}, keeping first value", date);
            continue;
        }

        if !(-1.0..=1.0).contains(&row.avg_sentiment) {
            warn!(
                "Sentiment {} on {} outside [-1, 1], passing through",
                row.avg_sentiment, date
            );
        }

        by_date.insert(date, row.avg_sentiment);
    }

    by_date
        .into_iter()
        .map(|(date, avg_sentiment)| DailySentiment {
            date,
            avg_sentiment,
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
