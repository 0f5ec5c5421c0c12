//! Normalization of raw tabular rows into typed daily records
//!
//! Raw rows arrive from the excluded ingestion collaborators as strings:
//! dates as `YYYY-MM-DD`, numerics as possibly-empty text. This layer is the
//! boundary where missingness becomes explicit — a value that is absent,
//! unparseable, or sentinel-flagged becomes `None`, never zero, so bucket
//! averages downstream stay honest.
//!
//! Row-level failures skip the row (with a debug log) and never abort the
//! batch. A date that does not parse drops the row; a numeric that does not
//! parse drops just that field.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::models::{
    DateRange, HrvRecord, MetricSnapshot, RhrRecord, SleepRecord, StepsRecord,
};

/// Sedentary-minutes value meaning "device not worn all day"
const NON_WEAR_SEDENTARY_MINUTES: f64 = 1440.0;

/// Sub-score weights for the composite sleep score
const DURATION_WEIGHT: f64 = 0.4;
const EFFICIENCY_WEIGHT: f64 = 0.3;
const STAGE_MIX_WEIGHT: f64 = 0.2;
const CONTINUITY_WEIGHT: f64 = 0.1;

/// Raw sleep row as delivered by the ingestion layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSleepRow {
    pub date: String,
    #[serde(default, alias = "minutesAsleep")]
    pub minutes_asleep: Option<String>,
    #[serde(default)]
    pub efficiency: Option<String>,
    #[serde(default, alias = "minutesDeep")]
    pub minutes_deep: Option<String>,
    #[serde(default, alias = "minutesREM")]
    pub minutes_rem: Option<String>,
    #[serde(default, alias = "minutesLight")]
    pub minutes_light: Option<String>,
    #[serde(default, alias = "minutesAwake")]
    pub minutes_awake: Option<String>,
    #[serde(default, alias = "minutesToFallAsleep")]
    pub minutes_to_fall_asleep: Option<String>,
    #[serde(default, alias = "isMainSleep")]
    pub is_main_sleep: Option<String>,
    #[serde(default, alias = "startTime")]
    pub start_time: Option<String>,
    #[serde(default, alias = "endTime")]
    pub end_time: Option<String>,
}

/// Raw HRV row
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHrvRow {
    pub date: String,
    #[serde(default, alias = "dailyRmssd")]
    pub daily_rmssd: Option<String>,
}

/// Raw steps row
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawStepsRow {
    pub date: String,
    #[serde(default)]
    pub steps: Option<String>,
    #[serde(default, alias = "sedentaryMinutes")]
    pub sedentary_minutes: Option<String>,
}

/// Raw resting-heart-rate row
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRhrRow {
    pub date: String,
    #[serde(default, alias = "resting_heart_rate")]
    pub resting_heart_rate: Option<String>,
}

/// Raw snapshot of all four streams, as produced by the ingestion layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub sleep: Vec<RawSleepRow>,
    #[serde(default)]
    pub hrv: Vec<RawHrvRow>,
    #[serde(default)]
    pub steps: Vec<RawStepsRow>,
    #[serde(default)]
    pub rhr: Vec<RawRhrRow>,
}

/// Normalize all four streams at once.
pub fn normalize_snapshot(raw: &RawSnapshot) -> MetricSnapshot {
    MetricSnapshot {
        sleep: normalize_sleep(&raw.sleep),
        hrv: normalize_hrv(&raw.hrv),
        steps: normalize_steps(&raw.steps),
        rhr: normalize_rhr(&raw.rhr),
    }
}

/// Normalize sleep rows, deriving the composite score and stage percentages.
pub fn normalize_sleep(rows: &[RawSleepRow]) -> Vec<SleepRecord> {
    rows.iter()
        .filter_map(|row| {
            let date = parse_date(&row.date, "sleep")?;
            let minutes_asleep = parse_num(&row.minutes_asleep);
            let efficiency = parse_num(&row.efficiency);
            let minutes_deep = parse_num(&row.minutes_deep);
            let minutes_rem = parse_num(&row.minutes_rem);
            let minutes_light = parse_num(&row.minutes_light);
            let minutes_awake = parse_num(&row.minutes_awake);
            let minutes_to_fall_asleep = parse_num(&row.minutes_to_fall_asleep);

            let sleep_score = compute_sleep_score(
                minutes_asleep,
                efficiency,
                minutes_deep,
                minutes_rem,
                minutes_awake,
                minutes_to_fall_asleep,
            );

            Some(SleepRecord {
                date,
                minutes_asleep,
                efficiency,
                minutes_deep,
                minutes_rem,
                minutes_light,
                minutes_awake,
                minutes_to_fall_asleep,
                is_main_sleep: parse_bool(&row.is_main_sleep),
                start_time: parse_timestamp(&row.start_time),
                end_time: parse_timestamp(&row.end_time),
                sleep_score,
                deep_pct: stage_pct(minutes_deep, minutes_asleep),
                rem_pct: stage_pct(minutes_rem, minutes_asleep),
                light_pct: stage_pct(minutes_light, minutes_asleep),
            })
        })
        .collect()
}

/// Normalize HRV rows.
pub fn normalize_hrv(rows: &[RawHrvRow]) -> Vec<HrvRecord> {
    rows.iter()
        .filter_map(|row| {
            let date = parse_date(&row.date, "hrv")?;
            Some(HrvRecord {
                date,
                rmssd: parse_num(&row.daily_rmssd),
            })
        })
        .collect()
}

/// Normalize steps rows, applying the non-wear sentinel.
///
/// A full day of sedentary minutes (1440) means the device was not worn;
/// both fields become missing rather than "valid all-day-sedentary".
pub fn normalize_steps(rows: &[RawStepsRow]) -> Vec<StepsRecord> {
    rows.iter()
        .filter_map(|row| {
            let date = parse_date(&row.date, "steps")?;
            let mut steps = parse_num(&row.steps);
            let mut sedentary_minutes = parse_num(&row.sedentary_minutes);
            if sedentary_minutes == Some(NON_WEAR_SEDENTARY_MINUTES) {
                debug!(%date, "non-wear sentinel on steps row, treating as missing");
                steps = None;
                sedentary_minutes = None;
            }
            Some(StepsRecord {
                date,
                steps,
                sedentary_minutes,
            })
        })
        .collect()
}

/// Normalize resting-heart-rate rows.
pub fn normalize_rhr(rows: &[RawRhrRow]) -> Vec<RhrRecord> {
    rows.iter()
        .filter_map(|row| {
            let date = parse_date(&row.date, "rhr")?;
            Some(RhrRecord {
                date,
                resting_hr: parse_num(&row.resting_heart_rate),
            })
        })
        .collect()
}

/// Composite sleep score: weighted blend of four clamped 0-100 sub-scores.
///
/// - Duration: `((minutes_asleep - 300) / 240) * 100`
/// - Efficiency: the efficiency percentage as-is
/// - Stage mix: `(((deep + rem) / asleep - 0.25) / 0.35) * 100`
/// - Continuity: `100 - 0.5 * latency - 0.5 * awake`
///
/// Weights 0.4 / 0.3 / 0.2 / 0.1, renormalized over whichever sub-scores
/// could be computed; all four missing yields `None`. Rounded to one decimal.
pub fn compute_sleep_score(
    minutes_asleep: Option<f64>,
    efficiency: Option<f64>,
    minutes_deep: Option<f64>,
    minutes_rem: Option<f64>,
    minutes_awake: Option<f64>,
    minutes_to_fall_asleep: Option<f64>,
) -> Option<f64> {
    let duration = minutes_asleep.map(|asleep| clamp_score((asleep - 300.0) / 240.0 * 100.0));
    let efficiency = efficiency.map(clamp_score);
    let stage_mix = match (minutes_asleep, minutes_deep, minutes_rem) {
        (Some(asleep), Some(deep), Some(rem)) if asleep > 0.0 => {
            Some(clamp_score(((deep + rem) / asleep - 0.25) / 0.35 * 100.0))
        }
        _ => None,
    };
    let continuity = match (minutes_to_fall_asleep, minutes_awake) {
        (Some(latency), Some(awake)) => {
            Some(clamp_score(100.0 - 0.5 * latency - 0.5 * awake))
        }
        _ => None,
    };

    let components = [
        (DURATION_WEIGHT, duration),
        (EFFICIENCY_WEIGHT, efficiency),
        (STAGE_MIX_WEIGHT, stage_mix),
        (CONTINUITY_WEIGHT, continuity),
    ];

    let mut weight_sum = 0.0;
    let mut weighted = 0.0;
    for (weight, score) in components {
        if let Some(score) = score {
            weight_sum += weight;
            weighted += weight * score;
        }
    }
    if weight_sum == 0.0 {
        return None;
    }
    Some((weighted / weight_sum * 10.0).round() / 10.0)
}

/// Apply the date-range and main-sleep filters, deduplicating by date
/// (last row wins) and sorting ascending.
///
/// Analyses consume exactly one pre-filtered snapshot, so every sub-analysis
/// sees the same view of the data.
pub fn filter_snapshot(
    snapshot: &MetricSnapshot,
    range: &DateRange,
    main_sleep_only: bool,
) -> MetricSnapshot {
    let sleep: BTreeMap<NaiveDate, SleepRecord> = snapshot
        .sleep
        .iter()
        .filter(|r| range.contains(r.date) && (!main_sleep_only || r.is_main_sleep))
        .map(|r| (r.date, r.clone()))
        .collect();
    let hrv: BTreeMap<NaiveDate, HrvRecord> = snapshot
        .hrv
        .iter()
        .filter(|r| range.contains(r.date))
        .map(|r| (r.date, r.clone()))
        .collect();
    let steps: BTreeMap<NaiveDate, StepsRecord> = snapshot
        .steps
        .iter()
        .filter(|r| range.contains(r.date))
        .map(|r| (r.date, r.clone()))
        .collect();
    let rhr: BTreeMap<NaiveDate, RhrRecord> = snapshot
        .rhr
        .iter()
        .filter(|r| range.contains(r.date))
        .map(|r| (r.date, r.clone()))
        .collect();

    MetricSnapshot {
        sleep: sleep.into_values().collect(),
        hrv: hrv.into_values().collect(),
        steps: steps.into_values().collect(),
        rhr: rhr.into_values().collect(),
    }
}

fn parse_date(raw: &str, stream: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            debug!(stream, raw, "skipping row with unparseable date");
            None
        }
    }
}

fn parse_num(raw: &Option<String>) -> Option<f64> {
    raw.as_deref()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_bool(raw: &Option<String>) -> bool {
    // absent means "main sleep": single-session sources omit the column
    match raw.as_deref().map(|s| s.trim().to_ascii_lowercase()) {
        Some(s) => matches!(s.as_str(), "true" | "1" | "yes"),
        None => true,
    }
}

fn parse_timestamp(raw: &Option<String>) -> Option<DateTime<Utc>> {
    raw.as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn stage_pct(stage: Option<f64>, asleep: Option<f64>) -> Option<f64> {
    match (stage, asleep) {
        (Some(stage), Some(asleep)) if asleep > 0.0 => Some(stage / asleep * 100.0),
        _ => None,
    }
}

fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sleep_row(date: &str, asleep: &str) -> RawSleepRow {
        RawSleepRow {
            date: date.to_string(),
            minutes_asleep: Some(asleep.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_unparseable_date_skips_row_only() {
        let rows = vec![sleep_row("2024-01-01", "400"), sleep_row("not-a-date", "410")];
        let records = normalize_sleep(&rows);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].minutes_asleep, Some(400.0));
    }

    #[test]
    fn test_unparseable_number_drops_field_only() {
        let rows = vec![sleep_row("2024-01-01", "n/a")];
        let records = normalize_sleep(&rows);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].minutes_asleep, None);
    }

    #[test]
    fn test_sleep_score_reference_night() {
        // 420 asleep / 90 eff / 90 deep / 90 rem / 10 awake / 5 latency:
        // D=50, E=90, S=51.02, C=92.5 -> 66.5 after weighting
        let score = compute_sleep_score(
            Some(420.0),
            Some(90.0),
            Some(90.0),
            Some(90.0),
            Some(10.0),
            Some(5.0),
        )
        .unwrap();
        assert!((score - 66.5).abs() < 1e-9, "got {}", score);
    }

    #[test]
    fn test_sleep_score_renormalizes_over_present_subscores() {
        // only efficiency available: score is the efficiency sub-score alone
        let score = compute_sleep_score(None, Some(85.0), None, None, None, None).unwrap();
        assert_eq!(score, 85.0);

        // nothing available: missing, not zero
        assert_eq!(compute_sleep_score(None, None, None, None, None, None), None);
    }

    #[test]
    fn test_sleep_score_bounds() {
        // extreme inputs stay inside [0, 100]
        let low = compute_sleep_score(
            Some(60.0),
            Some(-20.0),
            Some(0.0),
            Some(0.0),
            Some(500.0),
            Some(200.0),
        )
        .unwrap();
        assert!((0.0..=100.0).contains(&low));

        let high = compute_sleep_score(
            Some(700.0),
            Some(150.0),
            Some(300.0),
            Some(300.0),
            Some(0.0),
            Some(0.0),
        )
        .unwrap();
        assert!((0.0..=100.0).contains(&high));
    }

    #[test]
    fn test_non_wear_sentinel() {
        let rows = vec![RawStepsRow {
            date: "2024-02-01".to_string(),
            steps: Some("0".to_string()),
            sedentary_minutes: Some("1440".to_string()),
        }];
        let records = normalize_steps(&rows);
        assert_eq!(records[0].steps, None);
        assert_eq!(records[0].sedentary_minutes, None);
    }

    #[test]
    fn test_filter_snapshot_dedupes_last_wins() {
        let mut snapshot = MetricSnapshot::default();
        snapshot.sleep = normalize_sleep(&[
            sleep_row("2024-01-05", "400"),
            sleep_row("2024-01-05", "420"),
        ]);
        let filtered = filter_snapshot(&snapshot, &DateRange::open(), false);
        assert_eq!(filtered.sleep.len(), 1);
        assert_eq!(filtered.sleep[0].minutes_asleep, Some(420.0));
    }

    #[test]
    fn test_filter_snapshot_main_sleep_only() {
        let mut nap = sleep_row("2024-01-06", "60");
        nap.is_main_sleep = Some("false".to_string());
        let mut snapshot = MetricSnapshot::default();
        snapshot.sleep = normalize_sleep(&[sleep_row("2024-01-05", "400"), nap]);

        let filtered = filter_snapshot(&snapshot, &DateRange::open(), true);
        assert_eq!(filtered.sleep.len(), 1);
        assert_eq!(
            filtered.sleep[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
    }
}
