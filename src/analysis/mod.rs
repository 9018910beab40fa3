//! Series alignment and derived analytics.
//!
//! Everything here is a pure transformation of already-fetched daily rows:
//! inner join on date, trailing mean, Pearson correlation, the weekly
//! heatmap pivot and the candlestick-style volatility band.

use crate::models::{
    DailyEventAggregate, DailySentiment, MergedDailyRecord, VolatilityBand, WeeklyHeatmapGrid,
    weekday_row,
};
use chrono::Datelike;
use std::collections::HashMap;

// ── Alignment ─────────────────────────────────────────────────────────────────

/// Inner-join the two daily series on date and widen each surviving row with
/// the trailing mean of `event_count` over up to `window` rows.
///
/// Dates present in only one input are dropped. Output is sorted ascending
/// by date; the first `window - 1` rows average over however many rows
/// precede them (min-periods-1 semantics), so every row has a defined value.
/// Either input empty yields an empty result, not an error.
pub fn align(
    quakes: &[DailyEventAggregate],
    sentiment: &[DailySentiment],
    window: usize,
) -> Vec<MergedDailyRecord> {
    let window = window.max(1);

    let sentiment_by_date: HashMap<_, _> = sentiment
        .iter()
        .map(|s| (s.date, s.avg_sentiment))
        .collect();

    let mut joined: Vec<(&DailyEventAggregate, f64)> = quakes
        .iter()
        .filter_map(|q| sentiment_by_date.get(&q.date).map(|&s| (q, s)))
        .collect();
    joined.sort_by_key(|(q, _)| q.date);

    let mut merged = Vec::with_capacity(joined.len());
    let mut trailing_sum = 0.0;

    for (i, &(quake, avg_sentiment)) in joined.iter().enumerate() {
        trailing_sum += f64::from(quake.event_count);
        if i >= window {
            trailing_sum -= f64::from(joined[i - window].0.event_count);
        }
        let span = (i + 1).min(window);

        merged.push(MergedDailyRecord {
            date: quake.date,
            event_count: quake.event_count,
            max_magnitude: quake.max_magnitude,
            avg_sentiment,
            rolling_avg_count: trailing_sum / span as f64,
        });
    }

    merged
}

// ── Correlation ───────────────────────────────────────────────────────────────

/// Pearson correlation between the event-count and sentiment series of the
/// merged records. Returns 0.0 for fewer than two records or when either
/// series has zero variance, the sentinel for "no linear relationship is
/// computable".
pub fn correlation(records: &[MergedDailyRecord]) -> f64 {
    let xs: Vec<f64> = records.iter().map(|r| f64::from(r.event_count)).collect();
    let ys: Vec<f64> = records.iter().map(|r| r.avg_sentiment).collect();
    pearson(&xs, &ys)
}

fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 {
        return 0.0;
    }

    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }

    cov / (var_x.sqrt() * var_y.sqrt())
}

// ── Weekly heatmap pivot ──────────────────────────────────────────────────────

/// Pivot event counts into a dense (day-of-week × ISO week) grid.
///
/// Expects records sorted ascending by date (as `align` produces); week
/// columns follow first appearance, which keeps a year-boundary window in
/// chronological order.
pub fn pivot_weekly(records: &[MergedDailyRecord]) -> WeeklyHeatmapGrid {
    let mut weeks: Vec<u32> = Vec::new();
    let mut col_of: HashMap<u32, usize> = HashMap::new();

    for record in records {
        let week = record.date.iso_week().week();
        col_of.entry(week).or_insert_with(|| {
            weeks.push(week);
            weeks.len() - 1
        });
    }

    let mut cells = vec![vec![0u32; weeks.len()]; 7];
    for record in records {
        let row = weekday_row(record.date.weekday());
        let col = col_of[&record.date.iso_week().week()];
        cells[row][col] += record.event_count;
    }

    WeeklyHeatmapGrid { weeks, cells }
}

// ── Volatility band ───────────────────────────────────────────────────────────

/// Fixed ±0.02 / ±0.05 offsets around each day's sentiment. Purely for
/// candlestick rendering; never fed back into any computation.
pub fn volatility_band(records: &[MergedDailyRecord]) -> Vec<VolatilityBand> {
    records
        .iter()
        .map(|r| VolatilityBand {
            date: r.date,
            open: r.avg_sentiment + 0.02,
            high: r.avg_sentiment + 0.05,
            low: r.avg_sentiment - 0.05,
            close: r.avg_sentiment - 0.02,
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WEEKDAY_LABELS;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn quake(y: i32, m: u32, d: u32, count: u32, max_mag: f64) -> DailyEventAggregate {
        DailyEventAggregate {
            date: date(y, m, d),
            event_count: count,
            max_magnitude: max_mag,
        }
    }

    fn sentiment(y: i32, m: u32, d: u32, value: f64) -> DailySentiment {
        DailySentiment {
            date: date(y, m, d),
            avg_sentiment: value,
        }
    }

    #[test]
    fn test_align_is_date_intersection() {
        let quakes = vec![
            quake(2024, 1, 1, 3, 4.0),
            quake(2024, 1, 2, 5, 4.5),
            quake(2024, 1, 5, 1, 3.2),
        ];
        let sentiments = vec![
            sentiment(2024, 1, 2, -0.2),
            sentiment(2024, 1, 3, 0.0),
            sentiment(2024, 1, 5, 0.4),
        ];

        let merged = align(&quakes, &sentiments, 7);
        let dates: Vec<_> = merged.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date(2024, 1, 2), date(2024, 1, 5)]);
        assert!(merged.len() <= quakes.len().min(sentiments.len()));
    }

    #[test]
    fn test_align_sorts_unordered_input() {
        let quakes = vec![quake(2024, 1, 3, 2, 3.0), quake(2024, 1, 1, 4, 3.5)];
        let sentiments = vec![sentiment(2024, 1, 1, 0.1), sentiment(2024, 1, 3, 0.2)];

        let merged = align(&quakes, &sentiments, 7);
        assert_eq!(merged[0].date, date(2024, 1, 1));
        assert_eq!(merged[0].rolling_avg_count, 4.0);
        assert_eq!(merged[1].rolling_avg_count, 3.0);
    }

    #[test]
    fn test_rolling_mean_window_math() {
        let quakes: Vec<_> = (1..=5)
            .map(|d| quake(2024, 1, d, d as u32, 3.0))
            .collect();
        let sentiments: Vec<_> = (1..=5).map(|d| sentiment(2024, 1, d, 0.1)).collect();

        // counts 1, 2, 3, 4, 5 with window 3
        let merged = align(&quakes, &sentiments, 3);
        let rolling: Vec<f64> = merged.iter().map(|r| r.rolling_avg_count).collect();
        assert_eq!(rolling, vec![1.0, 1.5, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_first_record_rolling_is_own_count() {
        let merged = align(
            &[quake(2024, 1, 1, 9, 5.0)],
            &[sentiment(2024, 1, 1, 0.3)],
            7,
        );
        assert_eq!(merged[0].rolling_avg_count, 9.0);
    }

    #[test]
    fn test_align_empty_inputs() {
        assert!(align(&[], &[sentiment(2024, 1, 1, 0.1)], 7).is_empty());
        assert!(align(&[quake(2024, 1, 1, 1, 3.0)], &[], 7).is_empty());
    }

    #[test]
    fn test_end_to_end_two_day_scenario() {
        let quakes = vec![quake(2024, 1, 1, 3, 4.0), quake(2024, 1, 2, 5, 4.1)];
        let sentiments = vec![
            sentiment(2024, 1, 1, 0.1),
            sentiment(2024, 1, 2, -0.2),
            sentiment(2024, 1, 3, 0.0),
        ];

        let merged = align(&quakes, &sentiments, 7);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].rolling_avg_count, 3.0);
        assert_eq!(merged[1].rolling_avg_count, 4.0);

        // Two points falling on a descending line correlate exactly at -1.
        let corr = correlation(&merged);
        assert!((corr + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_correlation_bounds() {
        let quakes: Vec<_> = (1..=10)
            .map(|d| quake(2024, 1, d, d as u32 * 3 % 7, 3.0))
            .collect();
        let sentiments: Vec<_> = (1..=10)
            .map(|d| sentiment(2024, 1, d, (d as f64 * 0.37).sin()))
            .collect();

        let corr = correlation(&align(&quakes, &sentiments, 7));
        assert!((-1.0..=1.0).contains(&corr));
    }

    #[test]
    fn test_correlation_zero_variance_sentinel() {
        let quakes: Vec<_> = (1..=4).map(|d| quake(2024, 1, d, 5, 3.0)).collect();
        let sentiments: Vec<_> = (1..=4)
            .map(|d| sentiment(2024, 1, d, d as f64 * 0.1))
            .collect();

        assert_eq!(correlation(&align(&quakes, &sentiments, 7)), 0.0);
        assert_eq!(correlation(&[]), 0.0);
    }

    fn merged_record(y: i32, m: u32, d: u32, count: u32, s: f64) -> MergedDailyRecord {
        MergedDailyRecord {
            date: date(y, m, d),
            event_count: count,
            max_magnitude: 4.0,
            avg_sentiment: s,
            rolling_avg_count: f64::from(count),
        }
    }

    #[test]
    fn test_pivot_row_domain_fixed_and_total_conserved() {
        // 2024-01-01 is a Monday in ISO week 1; 2024-01-07 the Sunday closing it.
        let records = vec![
            merged_record(2024, 1, 1, 3, 0.1),
            merged_record(2024, 1, 7, 2, 0.0),
            merged_record(2024, 1, 8, 4, -0.1),
        ];

        let grid = pivot_weekly(&records);
        assert_eq!(grid.cells.len(), WEEKDAY_LABELS.len());
        assert_eq!(grid.weeks, vec![1, 2]);
        assert_eq!(grid.total(), 9);

        // Monday row is last, Sunday row first.
        assert_eq!(grid.cells[6], vec![3, 4]);
        assert_eq!(grid.cells[0], vec![2, 0]);
    }

    #[test]
    fn test_pivot_empty_input_keeps_seven_rows() {
        let grid = pivot_weekly(&[]);
        assert_eq!(grid.cells.len(), 7);
        assert!(grid.weeks.is_empty());
        assert_eq!(grid.total(), 0);
    }

    #[test]
    fn test_pivot_weeks_chronological_across_year_boundary() {
        // 2023-12-31 is a Sunday in ISO week 52; the next day opens week 1.
        let records = vec![
            merged_record(2023, 12, 31, 1, 0.0),
            merged_record(2024, 1, 1, 1, 0.0),
        ];

        let grid = pivot_weekly(&records);
        assert_eq!(grid.weeks, vec![52, 1]);
    }

    #[test]
    fn test_volatility_band_offsets_exact() {
        let records = vec![
            merged_record(2024, 1, 1, 3, 0.1),
            merged_record(2024, 1, 2, 5, -0.73),
        ];

        for band in volatility_band(&records) {
            assert!((band.open - band.close - 0.04).abs() < 1e-12);
            assert!((band.high - band.low - 0.10).abs() < 1e-12);
        }
    }
}
