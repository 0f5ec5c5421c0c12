use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::*;
use std::fs;
use std::path::PathBuf;
use tabled::{Table, Tabled};

use vitalrs::analytics::AnalyticsEngine;
use vitalrs::config::AppConfig;
use vitalrs::cusum::{self, WindowProfile};
use vitalrs::events::analyze_event_impact;
use vitalrs::logging::{self, LogConfig, LogFormat, LogLevel};
use vitalrs::models::{DateRange, LifeEvent, MetricKind};
use vitalrs::normalize::{self, RawSnapshot};

/// VitalRS - Biometric Trend Analysis CLI
///
/// Analyzes personal biometric series (sleep, HRV, steps, resting heart
/// rate) for trends, seasonal patterns, correlations, sustained shifts, and
/// life-event impact.
#[derive(Parser)]
#[command(name = "vitalrs")]
#[command(version = "0.1.0")]
#[command(about = "Biometric Trend Analysis CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format (pretty, json, compact)
    #[arg(long, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analytics suite over a metric snapshot
    Analyze {
        /// JSON snapshot with raw sleep/hrv/steps/rhr rows
        #[arg(short, long)]
        input: PathBuf,

        /// Date range start (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Date range end (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Only consider main overnight sleep sessions
        #[arg(long)]
        main_sleep_only: bool,

        /// Emit findings as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Scan one metric for sustained shifts (CUSUM)
    Shifts {
        /// JSON snapshot with raw rows
        #[arg(short, long)]
        input: PathBuf,

        /// Metric to scan (sleep, hrv, steps, rhr)
        #[arg(short, long, default_value = "rhr")]
        metric: String,
    },

    /// Evaluate life-event impact on all metrics
    Events {
        /// JSON snapshot with raw rows
        #[arg(short, long)]
        input: PathBuf,

        /// JSON array of life events
        #[arg(short, long)]
        events: PathBuf,

        /// Post-event window in days (3, 7, 15, 30)
        #[arg(short, long)]
        window: Option<u32>,

        /// Include the event day itself in the window
        #[arg(long)]
        same_day: bool,
    },

    /// Show or reset the persisted configuration
    Config {
        /// Reset the configuration to defaults
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Tabled)]
struct FindingRow {
    #[tabled(rename = "Section")]
    section: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Notes")]
    notes: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig {
        level: LogLevel::from_verbosity(cli.verbose),
        format: cli.log_format,
        file_path: None,
    };
    let _log_guard = logging::init_logging(&log_config)?;

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let app_config = AppConfig::load(&config_path)?;

    match cli.command {
        Commands::Analyze {
            input,
            from,
            to,
            main_sleep_only,
            json,
        } => {
            let snapshot = load_snapshot(&input)?;
            let range = DateRange::new(from, to)?;
            let filtered = normalize::filter_snapshot(
                &normalize::normalize_snapshot(&snapshot),
                &range,
                main_sleep_only,
            );
            let engine = AnalyticsEngine::with_settings(app_config.analysis.clone());
            let findings = engine.compute_analytics(&filtered);

            if json {
                println!("{}", serde_json::to_string_pretty(&findings)?);
                return Ok(());
            }
            println!("{}", "Analytics findings".blue().bold());
            if findings.is_empty() {
                println!("{}", "No analysis met its minimum data gate.".yellow());
                return Ok(());
            }
            let rows: Vec<FindingRow> = findings
                .iter()
                .map(|f| FindingRow {
                    section: f.section.clone(),
                    metric: f.metric.clone(),
                    value: f.value.clone(),
                    notes: match &f.tooltip {
                        Some(tip) => format!("{} [{}]", f.notes, tip),
                        None => f.notes.clone(),
                    },
                })
                .collect();
            println!("{}", Table::new(rows));
        }

        Commands::Shifts { input, metric } => {
            let metric = parse_metric(&metric)?;
            let snapshot = load_snapshot(&input)?;
            let normalized = normalize::normalize_snapshot(&snapshot);
            let filtered =
                normalize::filter_snapshot(&normalized, &DateRange::open(), false);
            let series = vitalrs::analytics::metric_series(&filtered, metric);

            match cusum::detect(&series, &WindowProfile::global()) {
                Some(detection) => {
                    println!("{}", format!("Sustained shift in {}", metric).cyan().bold());
                    println!(
                        "  {} from {} (excursion {:.1}, h = {:.1})",
                        detection.event.direction,
                        detection.event.onset_date,
                        detection.event.magnitude,
                        detection.h
                    );
                    println!(
                        "  baseline mean {:.1} {}, sigma {:.2}",
                        detection.params.mean,
                        metric.unit(),
                        detection.params.sigma
                    );
                }
                None => {
                    println!("{}", format!("No sustained shift in {}", metric).green());
                }
            }
        }

        Commands::Events {
            input,
            events,
            window,
            same_day,
        } => {
            let snapshot = load_snapshot(&input)?;
            let normalized = normalize::normalize_snapshot(&snapshot);
            let filtered =
                normalize::filter_snapshot(&normalized, &DateRange::open(), false);
            let life_events = load_events(&events)?;
            let window_days = window.unwrap_or(app_config.events.default_window_days);
            let include_same_day = same_day || app_config.events.include_same_day;

            let summary =
                analyze_event_impact(&life_events, &filtered, window_days, include_same_day);

            println!(
                "{}",
                format!("Event impact over {}-day windows", summary.window_days)
                    .magenta()
                    .bold()
            );
            for group in &summary.groups {
                if group.event_count == 0 {
                    continue;
                }
                println!("  {} ({} events)", group.sentiment, group.event_count);
                for impact in &group.metrics {
                    if impact.evaluated == 0 {
                        continue;
                    }
                    println!(
                        "    {:<12} up {:>5.1}%  down {:>5.1}%  (n = {})",
                        impact.metric.label(),
                        impact.up_pct,
                        impact.down_pct,
                        impact.evaluated
                    );
                }
            }
            if !summary.best_windows.is_empty() {
                println!("{}", "Most responsive windows".magenta());
                for best in &summary.best_windows {
                    println!(
                        "    {:<10} {} over {} days ({:.0}% of {} windows)",
                        best.sentiment.to_string(),
                        best.metric.label(),
                        best.window_days,
                        best.detection_rate,
                        best.evaluated
                    );
                }
            }
        }

        Commands::Config { reset } => {
            if reset {
                let config = AppConfig::default();
                config.save(&config_path)?;
                println!(
                    "{}",
                    format!("Configuration reset at {}", config_path.display()).green()
                );
            } else {
                println!("{}", toml::to_string_pretty(&app_config)?);
            }
        }
    }

    Ok(())
}

fn load_snapshot(path: &PathBuf) -> Result<RawSnapshot> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("parsing snapshot {}", path.display()))
}

fn load_events(path: &PathBuf) -> Result<Vec<LifeEvent>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading events {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing events {}", path.display()))
}

fn parse_metric(name: &str) -> Result<MetricKind> {
    match name.to_lowercase().as_str() {
        "sleep" => Ok(MetricKind::Sleep),
        "hrv" => Ok(MetricKind::Hrv),
        "steps" => Ok(MetricKind::Steps),
        "rhr" => Ok(MetricKind::Rhr),
        other => anyhow::bail!("unknown metric '{}', expected sleep|hrv|steps|rhr", other),
    }
}
