use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{CalculationError, Result, VitalRsError};

/// Metric streams tracked by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    /// Nightly sleep (duration, stages, derived score)
    Sleep,
    /// Heart rate variability (daily RMSSD, milliseconds)
    Hrv,
    /// Daily step count
    Steps,
    /// Resting heart rate (beats per minute)
    Rhr,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Sleep,
        MetricKind::Hrv,
        MetricKind::Steps,
        MetricKind::Rhr,
    ];

    /// Human-readable metric name for findings and summaries
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Sleep => "Sleep score",
            MetricKind::Hrv => "HRV",
            MetricKind::Steps => "Steps",
            MetricKind::Rhr => "Resting HR",
        }
    }

    /// Unit suffix for formatted values
    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::Sleep => "pts",
            MetricKind::Hrv => "ms",
            MetricKind::Steps => "steps",
            MetricKind::Rhr => "bpm",
        }
    }

    /// Whether a larger value is the desirable direction.
    ///
    /// Resting heart rate is the one stream where lower is better; seasonal
    /// best/worst ranking and impact narratives flip on this.
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, MetricKind::Rhr)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One night of sleep, normalized.
///
/// Every numeric field is `Option<f64>`: a missing or sentinel-flagged value
/// is `None`, never zero, so bucket averages are not dragged down by absent
/// data. `date` is the wake date as reported by the source; date-key
/// adjustment for load alignment happens in the analytics layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepRecord {
    /// Wake date (natural key; at most one record per date after filtering)
    pub date: NaiveDate,

    /// Total minutes asleep
    pub minutes_asleep: Option<f64>,

    /// Sleep efficiency percentage (0-100)
    pub efficiency: Option<f64>,

    /// Minutes of deep sleep
    pub minutes_deep: Option<f64>,

    /// Minutes of REM sleep
    pub minutes_rem: Option<f64>,

    /// Minutes of light sleep
    pub minutes_light: Option<f64>,

    /// Minutes awake during the session
    pub minutes_awake: Option<f64>,

    /// Sleep-onset latency in minutes
    pub minutes_to_fall_asleep: Option<f64>,

    /// True for the main overnight sleep, false for naps
    pub is_main_sleep: bool,

    /// Session start timestamp, when the source provides one
    pub start_time: Option<DateTime<Utc>>,

    /// Session end timestamp
    pub end_time: Option<DateTime<Utc>>,

    /// Derived composite score (0-100), weighted blend of duration,
    /// efficiency, stage mix, and continuity sub-scores
    pub sleep_score: Option<f64>,

    /// Deep-sleep share of time asleep, percent
    pub deep_pct: Option<f64>,

    /// REM share of time asleep, percent
    pub rem_pct: Option<f64>,

    /// Light-sleep share of time asleep, percent
    pub light_pct: Option<f64>,
}

/// One day of heart rate variability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrvRecord {
    pub date: NaiveDate,

    /// Daily RMSSD in milliseconds
    pub rmssd: Option<f64>,
}

/// One day of activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepsRecord {
    pub date: NaiveDate,

    /// Total step count
    pub steps: Option<f64>,

    /// Sedentary minutes. A source value of 1440 means the device was not
    /// worn; normalization nulls both fields in that case.
    pub sedentary_minutes: Option<f64>,
}

/// One day of resting heart rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhrRecord {
    pub date: NaiveDate,

    /// Resting heart rate in beats per minute
    pub resting_hr: Option<f64>,
}

/// Immutable snapshot of all four normalized metric series.
///
/// Analytics functions take this by reference; nothing in the engine mutates
/// it, which keeps repeated detector runs over window slices referentially
/// transparent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub sleep: Vec<SleepRecord>,
    pub hrv: Vec<HrvRecord>,
    pub steps: Vec<StepsRecord>,
    pub rhr: Vec<RhrRecord>,
}

/// Sentiment class of a recorded life event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Negative, Sentiment::Neutral, Sentiment::Positive];
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Negative => write!(f, "Negative"),
            Sentiment::Neutral => write!(f, "Neutral"),
            Sentiment::Positive => write!(f, "Positive"),
        }
    }
}

/// User-recorded life event from the external profile store.
///
/// The engine never mutates these; they arrive as a read-only snapshot per
/// invocation. Creation/edit/delete belong to the owning store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeEvent {
    /// Stable identifier assigned by the store
    pub id: Uuid,

    /// Calendar day the event occurred
    pub date: NaiveDate,

    /// Short non-empty description
    pub name: String,

    /// User-assigned sentiment class
    pub sentiment: Sentiment,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl LifeEvent {
    /// Build a new event with a fresh id, validating the name.
    pub fn new(date: NaiveDate, name: impl Into<String>, sentiment: Sentiment) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(VitalRsError::Validation(
                "life event name must be non-empty".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(LifeEvent {
            id: Uuid::new_v4(),
            date,
            name,
            sentiment,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Inclusive date-range filter with optional open ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self> {
        if let (Some(f), Some(t)) = (from, to) {
            if f > t {
                return Err(CalculationError::InvalidDateRange {
                    reason: format!("from {} is after to {}", f, t),
                }
                .into());
            }
        }
        Ok(DateRange { from, to })
    }

    /// Unbounded range (no filtering)
    pub fn open() -> Self {
        DateRange::default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        if let Some(from) = self.from {
            if date < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if date > to {
                return false;
            }
        }
        true
    }
}

/// Which calendar day a night of sleep is attributed to when joining
/// against daytime load metrics.
///
/// Sources report the wake date. `Bedtime` (the default) shifts the key one
/// day back so "last night's sleep" joins the previous day's steps. This is
/// a documented assumption, not something detected from the data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepDateKey {
    #[default]
    Bedtime,
    Wake,
}

/// Uniform output record for every statistical result.
///
/// Flat and renderer-agnostic: the table, badge, and CSV-export consumers
/// all iterate the same list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsFinding {
    /// Analysis section this finding belongs to (e.g. "Seasonality")
    pub section: String,

    /// Metric or sub-measure the value describes
    pub metric: String,

    /// Formatted result value
    pub value: String,

    /// Supporting context: sample sizes, directions, secondary numbers
    pub notes: String,

    /// Optional hover/expansion text (low-confidence caveats and the like)
    pub tooltip: Option<String>,
}

impl AnalyticsFinding {
    pub fn new(
        section: impl Into<String>,
        metric: impl Into<String>,
        value: impl Into<String>,
        notes: impl Into<String>,
    ) -> Self {
        AnalyticsFinding {
            section: section.into(),
            metric: metric.into(),
            value: value.into(),
            notes: notes.into(),
            tooltip: None,
        }
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_range_contains() {
        let range = DateRange::new(
            Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            Some(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()),
        )
        .unwrap();

        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()));
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()));

        let open = DateRange::open();
        assert!(open.contains(NaiveDate::from_ymd_opt(1999, 1, 1).unwrap()));
    }

    #[test]
    fn test_date_range_rejects_inverted_bounds() {
        let result = DateRange::new(
            Some(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()),
            Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_life_event_requires_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert!(LifeEvent::new(date, "  ", Sentiment::Negative).is_err());

        let event = LifeEvent::new(date, "Job change", Sentiment::Positive).unwrap();
        assert_eq!(event.sentiment, Sentiment::Positive);
        assert_eq!(event.created_at, event.updated_at);
    }

    #[test]
    fn test_metric_orientation() {
        assert!(MetricKind::Hrv.higher_is_better());
        assert!(!MetricKind::Rhr.higher_is_better());
    }
}
