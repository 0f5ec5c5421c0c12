//! Life-event impact analysis
//!
//! For each recorded life event, evaluates the post-event window of every
//! metric for a directional shift, then aggregates per sentiment class into
//! up/down percentages. Detection is two-stage: the CUSUM detector runs when
//! the window meets its minimum lengths, otherwise a simple mean-shift test
//! against the pre-event baseline takes over. A separate static pass
//! searches all four window sizes for the most detection-prone
//! window/metric combination per sentiment.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::DatedValue;
use crate::analytics::metric_series;
use crate::cusum::{self, ShiftDirection, WindowProfile};
use crate::models::{LifeEvent, MetricKind, MetricSnapshot, Sentiment};
use crate::stats;

/// Window sizes searched by the best-window pass, in days
pub const SEARCH_WINDOWS: [u32; 4] = [3, 7, 15, 30];

/// Fraction of baseline spread the mean-shift fallback must clear
const MEAN_SHIFT_SIGMA_FACTOR: f64 = 0.2;

/// Days of pre-event history used as the detection baseline
const BASELINE_DAYS: u64 = 7;

/// Minimum valid pre-event days for the mean-shift fallback
const FALLBACK_MIN_BASELINE: usize = 3;

/// Minimum valid post-event days for the mean-shift fallback
const FALLBACK_MIN_POST: usize = 2;

/// Smallest mean difference that counts as a shift, per metric.
///
/// Keeps the fallback from flagging sub-noise differences when the baseline
/// spread is tiny.
fn shift_floor(metric: MetricKind) -> f64 {
    match metric {
        MetricKind::Sleep => 1.0,
        MetricKind::Hrv => 3.0,
        MetricKind::Steps => 500.0,
        MetricKind::Rhr => 1.0,
    }
}

/// Per-metric outcome for one sentiment group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricImpact {
    pub metric: MetricKind,

    /// Events with enough surrounding data to attempt a verdict
    pub evaluated: usize,

    pub up_count: usize,

    pub down_count: usize,

    /// Share of evaluated windows that shifted up, percent
    pub up_pct: f64,

    /// Share of evaluated windows that shifted down, percent
    pub down_pct: f64,
}

/// All metric outcomes for one sentiment class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentImpact {
    pub sentiment: Sentiment,

    /// Number of recorded events carrying this sentiment
    pub event_count: usize,

    pub metrics: Vec<MetricImpact>,
}

/// The most detection-prone window/metric combination for a sentiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestWindow {
    pub sentiment: Sentiment,
    pub metric: MetricKind,
    pub window_days: u32,
    /// Detections per evaluated window, percent
    pub detection_rate: f64,
    pub evaluated: usize,
}

/// Output of one impact analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactSummary {
    /// The user-selected live window the group percentages describe
    pub window_days: u32,

    pub include_same_day: bool,

    pub groups: Vec<SentimentImpact>,

    /// Best window/metric per sentiment across all of [`SEARCH_WINDOWS`]
    pub best_windows: Vec<BestWindow>,
}

/// Evaluate every life event against the metric snapshot.
///
/// The snapshot is treated as an immutable read-only view; repeated calls
/// with identical inputs produce identical summaries.
pub fn analyze_event_impact(
    events: &[LifeEvent],
    snapshot: &MetricSnapshot,
    window_days: u32,
    include_same_day: bool,
) -> ImpactSummary {
    // one series per MetricKind::ALL position
    let all_series: Vec<Vec<DatedValue>> = MetricKind::ALL
        .iter()
        .map(|&m| metric_series(snapshot, m))
        .collect();

    let mut groups = Vec::new();
    for sentiment in Sentiment::ALL {
        let group_events: Vec<&LifeEvent> =
            events.iter().filter(|e| e.sentiment == sentiment).collect();
        let mut metrics = Vec::new();
        for (i, &metric) in MetricKind::ALL.iter().enumerate() {
            let series = &all_series[i];
            let mut evaluated = 0;
            let mut up = 0;
            let mut down = 0;
            for event in &group_events {
                match evaluate_window(series, metric, event.date, window_days, include_same_day) {
                    Verdict::Shift(ShiftDirection::Up) => {
                        evaluated += 1;
                        up += 1;
                    }
                    Verdict::Shift(ShiftDirection::Down) => {
                        evaluated += 1;
                        down += 1;
                    }
                    Verdict::NoShift => evaluated += 1,
                    Verdict::InsufficientData => {}
                }
            }
            metrics.push(MetricImpact {
                metric,
                evaluated,
                up_count: up,
                down_count: down,
                up_pct: pct(up, evaluated),
                down_pct: pct(down, evaluated),
            });
        }
        groups.push(SentimentImpact {
            sentiment,
            event_count: group_events.len(),
            metrics,
        });
    }

    let best_windows = best_window_search(events, &all_series, include_same_day);

    ImpactSummary {
        window_days,
        include_same_day,
        groups,
        best_windows,
    }
}

/// Outcome of evaluating one post-event window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Shift(ShiftDirection),
    NoShift,
    InsufficientData,
}

/// Detect a directional shift in one metric after one event.
///
/// Stage 1 (CUSUM): pre-event days form the baseline, post-event days the
/// monitored stretch, under the window-size profile. Stage 2 (mean shift):
/// when the window cannot satisfy CUSUM's minimum lengths, compare the
/// post-window mean against the pre-event baseline mean; a difference must
/// clear `max(metric floor, 0.2 * baseline stdev)` to count.
fn evaluate_window(
    series: &[DatedValue],
    metric: MetricKind,
    event_date: NaiveDate,
    window_days: u32,
    include_same_day: bool,
) -> Verdict {
    let window_start = if include_same_day {
        event_date
    } else {
        event_date + Days::new(1)
    };
    let window_end = event_date + Days::new(window_days as u64);
    let baseline_start = event_date - Days::new(BASELINE_DAYS);

    let pre: Vec<DatedValue> = series
        .iter()
        .filter(|dv| {
            dv.date >= baseline_start
                && dv.date < event_date
                && dv.value.is_some_and(|v| v.is_finite())
        })
        .copied()
        .collect();
    let post: Vec<DatedValue> = series
        .iter()
        .filter(|dv| dv.date >= window_start && dv.date <= window_end)
        .copied()
        .collect();
    let post_valid = post
        .iter()
        .filter(|dv| dv.value.is_some_and(|v| v.is_finite()))
        .count();

    let mut profile = WindowProfile::for_window_days(window_days);
    profile.baseline_cap = pre.len().min(profile.baseline_cap);

    if pre.len() >= profile.min_baseline && post_valid >= profile.min_post {
        let combined: Vec<DatedValue> = pre.iter().chain(post.iter()).copied().collect();
        return match cusum::detect(&combined, &profile) {
            Some(detection) => Verdict::Shift(detection.event.direction),
            None => Verdict::NoShift,
        };
    }

    // window too short for CUSUM: simple mean-shift test
    if pre.len() < FALLBACK_MIN_BASELINE || post_valid < FALLBACK_MIN_POST {
        debug!(
            %metric,
            %event_date,
            pre = pre.len(),
            post = post_valid,
            "not enough data around event"
        );
        return Verdict::InsufficientData;
    }
    let pre_values: Vec<f64> = pre.iter().filter_map(|dv| dv.value).collect();
    let post_values: Vec<f64> = post.iter().filter_map(|dv| dv.value).collect();
    let (Some(pre_mean), Some(post_mean)) =
        (stats::mean(&pre_values), stats::mean(&post_values))
    else {
        return Verdict::InsufficientData;
    };
    let spread = stats::stdev(&pre_values).unwrap_or(0.0);
    let threshold = shift_floor(metric).max(MEAN_SHIFT_SIGMA_FACTOR * spread);
    let diff = post_mean - pre_mean;
    if diff.abs() < threshold {
        return Verdict::NoShift;
    }
    if diff > 0.0 {
        Verdict::Shift(ShiftDirection::Up)
    } else {
        Verdict::Shift(ShiftDirection::Down)
    }
}

/// For each sentiment, find the window/metric combination with the highest
/// detection rate across all search windows. Deterministic tie-break:
/// earlier window size, then metric order, wins.
fn best_window_search(
    events: &[LifeEvent],
    all_series: &[Vec<DatedValue>],
    include_same_day: bool,
) -> Vec<BestWindow> {
    let mut best = Vec::new();
    for sentiment in Sentiment::ALL {
        let group_events: Vec<&LifeEvent> =
            events.iter().filter(|e| e.sentiment == sentiment).collect();
        if group_events.is_empty() {
            continue;
        }
        let mut winner: Option<BestWindow> = None;
        for &window_days in &SEARCH_WINDOWS {
            for (i, &metric) in MetricKind::ALL.iter().enumerate() {
                let series = &all_series[i];
                let mut evaluated = 0;
                let mut detected = 0;
                for event in &group_events {
                    match evaluate_window(series, metric, event.date, window_days, include_same_day)
                    {
                        Verdict::Shift(_) => {
                            evaluated += 1;
                            detected += 1;
                        }
                        Verdict::NoShift => evaluated += 1,
                        Verdict::InsufficientData => {}
                    }
                }
                if evaluated == 0 {
                    continue;
                }
                let rate = pct(detected, evaluated);
                let better = winner
                    .as_ref()
                    .map_or(true, |w| rate > w.detection_rate);
                if better {
                    winner = Some(BestWindow {
                        sentiment,
                        metric,
                        window_days,
                        detection_rate: rate,
                        evaluated,
                    });
                }
            }
        }
        if let Some(w) = winner {
            best.push(w);
        }
    }
    best
}

fn pct(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RhrRecord, SleepRecord};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sleep(date: NaiveDate, score: f64) -> SleepRecord {
        SleepRecord {
            date,
            minutes_asleep: Some(420.0),
            efficiency: None,
            minutes_deep: None,
            minutes_rem: None,
            minutes_light: None,
            minutes_awake: None,
            minutes_to_fall_asleep: None,
            is_main_sleep: true,
            start_time: None,
            end_time: None,
            sleep_score: Some(score),
            deep_pct: None,
            rem_pct: None,
            light_pct: None,
        }
    }

    fn event(date: NaiveDate, sentiment: Sentiment) -> LifeEvent {
        LifeEvent::new(date, "test event", sentiment).unwrap()
    }

    /// Three negative events, each followed by a clear 7-day sleep-score
    /// drop against a stable pre-event baseline: down rate must be 100%.
    #[test]
    fn test_negative_events_drop_sleep_score() {
        let mut snapshot = MetricSnapshot::default();
        let start = date(2024, 1, 1);
        let event_offsets = [20u64, 60, 100];
        for day in 0..130u64 {
            let current = start + Days::new(day);
            let in_aftermath = event_offsets
                .iter()
                .any(|&off| day > off && day <= off + 7);
            let score = if in_aftermath { 60.0 } else { 75.0 };
            snapshot.sleep.push(sleep(current, score));
        }
        let events: Vec<LifeEvent> = event_offsets
            .iter()
            .map(|&off| event(start + Days::new(off), Sentiment::Negative))
            .collect();

        let summary = analyze_event_impact(&events, &snapshot, 7, false);
        let negative = summary
            .groups
            .iter()
            .find(|g| g.sentiment == Sentiment::Negative)
            .unwrap();
        assert_eq!(negative.event_count, 3);
        let sleep_impact = negative
            .metrics
            .iter()
            .find(|m| m.metric == MetricKind::Sleep)
            .unwrap();
        assert_eq!(sleep_impact.evaluated, 3);
        assert_eq!(sleep_impact.down_pct, 100.0);
        assert_eq!(sleep_impact.up_pct, 0.0);
    }

    #[test]
    fn test_event_without_surrounding_data_not_evaluated() {
        let snapshot = MetricSnapshot::default();
        let events = vec![event(date(2024, 5, 1), Sentiment::Positive)];
        let summary = analyze_event_impact(&events, &snapshot, 7, false);
        let positive = summary
            .groups
            .iter()
            .find(|g| g.sentiment == Sentiment::Positive)
            .unwrap();
        assert_eq!(positive.event_count, 1);
        for metric in &positive.metrics {
            assert_eq!(metric.evaluated, 0);
            assert_eq!(metric.up_pct, 0.0);
        }
        assert!(summary.best_windows.is_empty());
    }

    #[test]
    fn test_mean_shift_fallback_on_short_window() {
        // 3-day window with sparse post data: CUSUM floor not met, fallback
        // sees a clean RHR jump
        let mut snapshot = MetricSnapshot::default();
        let start = date(2024, 3, 1);
        for day in 0..7u64 {
            snapshot.rhr.push(RhrRecord {
                date: start + Days::new(day),
                resting_hr: Some(58.0),
            });
        }
        let event_date = start + Days::new(7);
        for day in 8..10u64 {
            snapshot.rhr.push(RhrRecord {
                date: start + Days::new(day),
                resting_hr: Some(70.0),
            });
        }
        let events = vec![event(event_date, Sentiment::Negative)];
        let summary = analyze_event_impact(&events, &snapshot, 3, false);
        let negative = summary
            .groups
            .iter()
            .find(|g| g.sentiment == Sentiment::Negative)
            .unwrap();
        let rhr = negative
            .metrics
            .iter()
            .find(|m| m.metric == MetricKind::Rhr)
            .unwrap();
        assert_eq!(rhr.evaluated, 1);
        assert_eq!(rhr.up_count, 1);
    }

    #[test]
    fn test_stable_series_no_shift() {
        let mut snapshot = MetricSnapshot::default();
        let start = date(2024, 3, 1);
        for day in 0..40u64 {
            snapshot.rhr.push(RhrRecord {
                date: start + Days::new(day),
                resting_hr: Some(60.0),
            });
        }
        let events = vec![event(start + Days::new(15), Sentiment::Neutral)];
        let summary = analyze_event_impact(&events, &snapshot, 7, false);
        let neutral = summary
            .groups
            .iter()
            .find(|g| g.sentiment == Sentiment::Neutral)
            .unwrap();
        let rhr = neutral
            .metrics
            .iter()
            .find(|m| m.metric == MetricKind::Rhr)
            .unwrap();
        assert_eq!(rhr.evaluated, 1);
        assert_eq!(rhr.up_count + rhr.down_count, 0);
    }

    #[test]
    fn test_best_window_search_finds_responsive_combination() {
        let mut snapshot = MetricSnapshot::default();
        let start = date(2024, 1, 1);
        let event_offset = 20u64;
        for day in 0..60u64 {
            let score = if day > event_offset { 55.0 } else { 78.0 };
            snapshot.sleep.push(sleep(start + Days::new(day), score));
        }
        let events = vec![event(start + Days::new(event_offset), Sentiment::Negative)];
        let summary = analyze_event_impact(&events, &snapshot, 7, false);

        let best = summary
            .best_windows
            .iter()
            .find(|b| b.sentiment == Sentiment::Negative)
            .expect("best window for negative events");
        assert_eq!(best.metric, MetricKind::Sleep);
        assert_eq!(best.detection_rate, 100.0);
    }

    #[test]
    fn test_impact_summary_deterministic() {
        let mut snapshot = MetricSnapshot::default();
        let start = date(2024, 1, 1);
        for day in 0..50u64 {
            let score = if day > 20 { 60.0 } else { 75.0 };
            snapshot.sleep.push(sleep(start + Days::new(day), score));
        }
        let events = vec![event(start + Days::new(20), Sentiment::Negative)];
        let a = analyze_event_impact(&events, &snapshot, 7, true);
        let b = analyze_event_impact(&events, &snapshot, 7, true);
        assert_eq!(a, b);
    }
}
