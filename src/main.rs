mod analysis;
mod cache;
mod config;
mod models;
mod pipeline;
mod sources;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::models::{DailyEventAggregate, DailySentiment, WEEKDAY_LABELS};
use crate::pipeline::{DashboardData, Pipeline, RunOutcome};

#[derive(Parser)]
#[command(
    name = "quake-sentiment",
    about = "Earthquake frequency vs. generated news sentiment — data pipeline",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch both sources, align them and print the full report
    Report {
        /// Data range in days
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(7..=90))]
        days: Option<u32>,

        /// Minimum event magnitude (2.5–5.0)
        #[arg(short, long, value_parser = parse_magnitude)]
        min_magnitude: Option<f64>,
    },

    /// Fetch only the seismic catalog and print the daily aggregates
    Quakes {
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(7..=90))]
        days: Option<u32>,

        #[arg(short, long, value_parser = parse_magnitude)]
        min_magnitude: Option<f64>,
    },

    /// Fetch only the generated sentiment series
    Sentiment {
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(7..=90))]
        days: Option<u32>,
    },

    /// Show configuration and credential status
    Check,
}

fn parse_magnitude(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|_| format!("`{s}` is not a number"))?;
    if (2.5..=5.0).contains(&v) {
        Ok(v)
    } else {
        Err(format!("magnitude must be between 2.5 and 5.0, got {v}"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "quake_sentiment_engine=info,warn",
        1 => "quake_sentiment_engine=debug,info",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Report {
            days,
            min_magnitude,
        } => {
            let _t = utils::Timer::start("Dashboard refresh");
            let days = days.unwrap_or(config.pipeline.days);
            let min_magnitude = min_magnitude.unwrap_or(config.pipeline.min_magnitude);

            let pipeline = Pipeline::new(&config)?;
            match pipeline.run(days, min_magnitude).await {
                RunOutcome::Report(data) => print_report(&data, min_magnitude),
                RunOutcome::NoData { reasons } => print_no_data(&reasons),
            }
        }

        Command::Quakes {
            days,
            min_magnitude,
        } => {
            let days = days.unwrap_or(config.pipeline.days);
            let min_magnitude = min_magnitude.unwrap_or(config.pipeline.min_magnitude);

            let pipeline = Pipeline::new(&config)?;
            match pipeline.quakes_daily(days, min_magnitude).await {
                Ok(daily) => print_quakes(&daily, min_magnitude),
                Err(e) => println!("Seismic fetch failed: {e}"),
            }
        }

        Command::Sentiment { days } => {
            let days = days.unwrap_or(config.pipeline.days);

            let pipeline = Pipeline::new(&config)?;
            match pipeline.sentiment_daily(days).await {
                Ok(daily) => print_sentiment(&daily),
                Err(e) => println!("Sentiment fetch failed: {e}"),
            }
        }

        Command::Check => print_check(&config),
    }

    Ok(())
}

// ── Report rendering ──────────────────────────────────────────────────────────

fn print_no_data(reasons: &[String]) {
    println!("One or both data sources returned no usable data:");
    for reason in reasons {
        println!("  - {reason}");
    }
    println!("Check configuration/API keys and try again.");
}

fn print_report(data: &DashboardData, min_magnitude: f64) {
    let first = data.merged.first().map(|r| r.date);
    let last = data.merged.last().map(|r| r.date);

    println!("─────────────────────────────────────────────────");
    println!("  Earthquakes vs. Generated News Sentiment");
    println!("─────────────────────────────────────────────────");
    if let (Some(first), Some(last)) = (first, last) {
        println!(
            "  Mapped      : {} to {} ({} days)",
            utils::month_day(first),
            utils::month_day(last),
            data.merged.len()
        );
    }
    println!(
        "  Events      : {} (M >= {})",
        utils::fmt_number(data.total_events as i64),
        min_magnitude
    );
    println!(
        "  Dropped     : {} event-only days, {} sentiment-only days",
        data.quake_only_days, data.sentiment_only_days
    );
    println!(
        "  Correlation : {:.4} (Pearson, quakes vs. sentiment; ~0 means no linear relationship)",
        data.correlation
    );
    println!("─────────────────────────────────────────────────");

    let tail = &data.merged[data.merged.len().saturating_sub(10)..];
    println!();
    println!("Raw data (last {} days):", tail.len());
    println!(
        "  {:<12} {:>7} {:>9} {:>8} {:>10}",
        "Date", "Events", "Rolling", "Max mag", "Sentiment"
    );
    for r in tail {
        println!(
            "  {:<12} {:>7} {:>9.2} {:>8.1} {:>10.2}",
            r.date, r.event_count, r.rolling_avg_count, r.max_magnitude, r.avg_sentiment
        );
    }

    println!();
    println!(
        "Weekly activity (events per weekday × ISO week, {} total):",
        data.heatmap.total()
    );
    print!("  {:<10}", "");
    for week in &data.heatmap.weeks {
        print!(" {:>5}", format!("W{week}"));
    }
    println!();
    for (label, row) in WEEKDAY_LABELS.iter().zip(&data.heatmap.cells) {
        print!("  {label:<10}");
        for cell in row {
            print!(" {cell:>5}");
        }
        println!();
    }

    let band_tail = &data.bands[data.bands.len().saturating_sub(10)..];
    println!();
    println!("Sentiment volatility band (last {} days):", band_tail.len());
    println!(
        "  {:<12} {:>7} {:>7} {:>7} {:>7}",
        "Date", "Open", "High", "Low", "Close"
    );
    for band in band_tail {
        println!(
            "  {:<12} {:>7.2} {:>7.2} {:>7.2} {:>7.2}",
            band.date, band.open, band.high, band.low, band.close
        );
    }
}

fn print_quakes(daily: &[DailyEventAggregate], min_magnitude: f64) {
    if daily.is_empty() {
        println!("No qualifying events (M >= {min_magnitude}) in the window.");
        return;
    }

    let total: u64 = daily.iter().map(|d| u64::from(d.event_count)).sum();
    println!(
        "{} events (M >= {}) across {} days:",
        utils::fmt_number(total as i64),
        min_magnitude,
        daily.len()
    );
    println!("  {:<12} {:>7} {:>8}", "Date", "Events", "Max mag");
    for d in daily {
        println!(
            "  {:<12} {:>7} {:>8.1}",
            d.date, d.event_count, d.max_magnitude
        );
    }
}

fn print_sentiment(daily: &[DailySentiment]) {
    if daily.is_empty() {
        println!("The generator returned no sentiment rows.");
        return;
    }

    println!("{} generated sentiment days:", daily.len());
    println!("  {:<12} {:>10}", "Date", "Sentiment");
    for d in daily {
        println!("  {:<12} {:>10.2}", d.date, d.avg_sentiment);
    }
}

fn print_check(config: &AppConfig) {
    println!("─────────────────────────────────────────────────");
    println!("  quake-sentiment — configuration");
    println!("─────────────────────────────────────────────────");
    println!("  Seismic endpoint   : {}", config.seismic.base_url);
    println!("  Sentiment endpoint : {}", config.sentiment.base_url);
    println!("  Sentiment model    : {}", config.sentiment.model);
    println!(
        "  Credential         : {}",
        if config.sentiment.api_key.is_some() {
            "configured"
        } else {
            "MISSING — set GEMINI_API_KEY or sentiment.api_key"
        }
    );
    println!(
        "  Defaults           : {} days, M >= {}, rolling window {}",
        config.pipeline.days, config.pipeline.min_magnitude, config.pipeline.rolling_window
    );
    println!("  Cache TTL          : {}s", config.pipeline.cache_ttl_secs);
    println!("  HTTP timeout       : {}s", config.http.timeout_secs);
    println!("─────────────────────────────────────────────────");
}
