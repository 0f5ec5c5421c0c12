//! Analytics orchestrator
//!
//! Combines aggregation, the statistics library, and the CUSUM detector into
//! composite findings. Every sub-analysis is gated by a minimum sample size:
//! a gate that fails omits the finding (with a debug log) instead of
//! reporting noise as signal. The output is a flat `Vec<AnalyticsFinding>`
//! the rendering and export collaborators consume as-is.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::aggregate::{
    self, AggregateBucket, CalendarMonthBucket, DatedValue, WeekdayBucket,
};
use crate::cusum::{self, WindowProfile};
use crate::models::{AnalyticsFinding, MetricKind, MetricSnapshot, SleepDateKey};
use crate::stats;

/// Tunable thresholds and gates for the orchestrator.
///
/// Defaults mirror the reference behavior; the persisted app config can
/// override any of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSettings {
    /// Which day a night of sleep is attributed to for load alignment
    pub sleep_key: SleepDateKey,

    /// Minimum aligned pairs before a correlation is reported
    pub min_correlation_pairs: usize,

    /// Winsorization proportion for the steps/HRV correlation
    pub winsorize_pct: f64,

    /// Contributing-day count under which a seasonal best month is flagged
    /// low-confidence
    pub seasonality_confidence_days: usize,

    /// Minimum samples per weekday for the day-of-week analysis
    pub min_weekday_samples: usize,

    /// Minimum raw days for the sedentary daily-trend variant
    pub min_sedentary_trend_days: usize,

    /// Sleep-duration recipe: condition threshold in minutes asleep
    pub recipe_duration_minutes: f64,

    /// Sleep-duration recipe: outcome threshold in score points
    pub recipe_score_threshold: f64,

    /// Sleep-duration recipe: minimum qualifying nights
    pub recipe_duration_min_nights: usize,

    /// Stage-mix recipe: condition threshold on (deep+REM)/asleep
    pub recipe_stage_share: f64,

    /// Stage-mix recipe: minimum qualifying nights
    pub recipe_stage_min_nights: usize,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        AnalyticsSettings {
            sleep_key: SleepDateKey::default(),
            min_correlation_pairs: 20,
            winsorize_pct: 0.01,
            seasonality_confidence_days: 15,
            min_weekday_samples: 2,
            min_sedentary_trend_days: 30,
            recipe_duration_minutes: 420.0,
            recipe_score_threshold: 75.0,
            recipe_duration_min_nights: 50,
            recipe_stage_share: 0.35,
            recipe_stage_min_nights: 10,
        }
    }
}

/// Runs every sub-analysis over one immutable, pre-filtered snapshot.
pub struct AnalyticsEngine {
    settings: AnalyticsSettings,
}

impl Default for AnalyticsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyticsEngine {
    pub fn new() -> Self {
        AnalyticsEngine {
            settings: AnalyticsSettings::default(),
        }
    }

    pub fn with_settings(settings: AnalyticsSettings) -> Self {
        AnalyticsEngine { settings }
    }

    /// Compute all findings for a snapshot. The snapshot is expected to be
    /// pre-filtered (date range, main-sleep flag) by the caller.
    pub fn compute_analytics(&self, snapshot: &MetricSnapshot) -> Vec<AnalyticsFinding> {
        let mut findings = Vec::new();
        self.multi_year_trends(snapshot, &mut findings);
        self.sedentary_trend(snapshot, &mut findings);
        self.seasonality(snapshot, &mut findings);
        self.day_of_week(snapshot, &mut findings);
        self.load_recovery(snapshot, &mut findings);
        self.consistency(snapshot, &mut findings);
        self.recipes(snapshot, &mut findings);
        self.hrv_rebound(snapshot, &mut findings);
        self.sustained_shifts(snapshot, &mut findings);
        findings
    }

    /// Linear trend across yearly buckets, per metric.
    fn multi_year_trends(&self, snapshot: &MetricSnapshot, findings: &mut Vec<AnalyticsFinding>) {
        for metric in MetricKind::ALL {
            let series = metric_series(snapshot, metric);
            let buckets: Vec<AggregateBucket> = aggregate::group_by_year(&series)
                .into_iter()
                .filter(|b| b.average.is_some())
                .collect();
            if buckets.len() < 2 {
                debug!(%metric, years = buckets.len(), "multi-year trend gate not met");
                continue;
            }

            let points: Vec<(f64, f64)> = buckets
                .iter()
                .enumerate()
                .filter_map(|(i, b)| b.average.map(|a| (i as f64, a)))
                .collect();
            let Some(fit) = stats::linear_regression(&points) else {
                continue;
            };
            let first = buckets.first().and_then(|b| b.average).unwrap_or(0.0);
            let last = buckets.last().and_then(|b| b.average).unwrap_or(0.0);
            if first == 0.0 {
                continue;
            }
            let pct_change = (last - first) / first * 100.0;

            findings.push(AnalyticsFinding::new(
                "Multi-year trend",
                metric.label(),
                format!("{:+.1}% ({} to {})", pct_change, buckets[0].key, buckets[buckets.len() - 1].key),
                format!(
                    "slope {:+.2} {}/yr over {} years",
                    fit.slope,
                    metric.unit(),
                    buckets.len()
                ),
            ));
        }
    }

    /// Daily-trend variant for sedentary minutes, gated on raw day count.
    fn sedentary_trend(&self, snapshot: &MetricSnapshot, findings: &mut Vec<AnalyticsFinding>) {
        let points: Vec<(f64, f64)> = snapshot
            .steps
            .iter()
            .filter_map(|r| r.sedentary_minutes)
            .enumerate()
            .map(|(i, v)| (i as f64, v))
            .collect();
        if points.len() < self.settings.min_sedentary_trend_days {
            debug!(days = points.len(), "sedentary trend gate not met");
            return;
        }
        let Some(fit) = stats::linear_regression(&points) else {
            return;
        };
        findings.push(AnalyticsFinding::new(
            "Multi-year trend",
            "Sedentary minutes",
            format!("{:+.2} min/day", fit.slope),
            format!("daily regression over {} worn days", points.len()),
        ));
    }

    /// Best, runner-up, and worst calendar month per metric.
    fn seasonality(&self, snapshot: &MetricSnapshot, findings: &mut Vec<AnalyticsFinding>) {
        for metric in MetricKind::ALL {
            let series = metric_series(snapshot, metric);
            let buckets = aggregate::group_by_calendar_month(&series);
            if buckets.len() < 2 {
                debug!(%metric, months = buckets.len(), "seasonality gate not met");
                continue;
            }

            let mut ranked: Vec<&CalendarMonthBucket> = buckets.iter().collect();
            ranked.sort_by(|a, b| {
                let av = a.average.unwrap_or(f64::NEG_INFINITY);
                let bv = b.average.unwrap_or(f64::NEG_INFINITY);
                if metric.higher_is_better() {
                    bv.partial_cmp(&av).expect("finite averages")
                } else {
                    av.partial_cmp(&bv).expect("finite averages")
                }
            });
            let best = ranked[0];
            let runner_up = ranked.get(1).copied();
            let worst = ranked[ranked.len() - 1];

            let mut finding = AnalyticsFinding::new(
                "Seasonality",
                metric.label(),
                format!(
                    "Best: {} ({:.1} {})",
                    best.month_name(),
                    best.average.unwrap_or(0.0),
                    metric.unit()
                ),
                format!(
                    "Worst: {} ({:.1} {})",
                    worst.month_name(),
                    worst.average.unwrap_or(0.0),
                    metric.unit()
                ),
            );
            if best.count < self.settings.seasonality_confidence_days {
                if let Some(second) = runner_up {
                    finding = finding.with_tooltip(format!(
                        "Low confidence: only {} contributing days in {}; runner-up is {} ({:.1} {})",
                        best.count,
                        best.month_name(),
                        second.month_name(),
                        second.average.unwrap_or(0.0),
                        metric.unit()
                    ));
                }
            }
            findings.push(finding);
        }
    }

    /// Per-weekday averages: spread between the strongest and weakest day.
    fn day_of_week(&self, snapshot: &MetricSnapshot, findings: &mut Vec<AnalyticsFinding>) {
        for metric in MetricKind::ALL {
            let series = metric_series(snapshot, metric);
            let buckets: Vec<WeekdayBucket> = aggregate::group_by_weekday(&series)
                .into_iter()
                .filter(|b| b.count >= self.settings.min_weekday_samples)
                .collect();
            if buckets.len() < 2 {
                debug!(%metric, weekdays = buckets.len(), "day-of-week gate not met");
                continue;
            }

            let max = buckets
                .iter()
                .max_by(|a, b| {
                    a.average
                        .unwrap_or(f64::NEG_INFINITY)
                        .partial_cmp(&b.average.unwrap_or(f64::NEG_INFINITY))
                        .expect("finite averages")
                })
                .expect("non-empty buckets");
            let min = buckets
                .iter()
                .min_by(|a, b| {
                    a.average
                        .unwrap_or(f64::INFINITY)
                        .partial_cmp(&b.average.unwrap_or(f64::INFINITY))
                        .expect("finite averages")
                })
                .expect("non-empty buckets");
            let spread = max.average.unwrap_or(0.0) - min.average.unwrap_or(0.0);

            findings.push(AnalyticsFinding::new(
                "Day of week",
                metric.label(),
                format!("{:.1} {} spread", spread, metric.unit()),
                format!(
                    "highest {} ({:.1}), lowest {} ({:.1})",
                    max.weekday,
                    max.average.unwrap_or(0.0),
                    min.weekday,
                    min.average.unwrap_or(0.0)
                ),
            ));
        }
    }

    /// Load-recovery correlations: same-day steps vs sleep score, and
    /// previous-day steps vs next-day HRV (winsorized).
    fn load_recovery(&self, snapshot: &MetricSnapshot, findings: &mut Vec<AnalyticsFinding>) {
        let steps_by_date: BTreeMap<NaiveDate, f64> = snapshot
            .steps
            .iter()
            .filter_map(|r| r.steps.map(|v| (r.date, v)))
            .collect();
        let score_by_day = self.sleep_score_by_day(snapshot);

        // same-day steps vs that night's sleep score
        let (x, y): (Vec<f64>, Vec<f64>) = steps_by_date
            .iter()
            .filter_map(|(date, steps)| score_by_day.get(date).map(|score| (*steps, *score)))
            .unzip();
        if x.len() >= self.settings.min_correlation_pairs {
            let r = stats::pearson(&x, &y).unwrap_or(0.0);
            let rho = stats::spearman(&x, &y).unwrap_or(0.0);
            findings.push(AnalyticsFinding::new(
                "Load vs recovery",
                "Steps vs sleep score",
                format!("r = {:+.2}", r),
                format!("Spearman {:+.2}, n = {} days", rho, x.len()),
            ));
        } else {
            debug!(pairs = x.len(), "steps/sleep correlation gate not met");
        }

        // previous-day steps vs next-day HRV, winsorized against outliers
        let hrv_by_date: BTreeMap<NaiveDate, f64> = snapshot
            .hrv
            .iter()
            .filter_map(|r| r.rmssd.map(|v| (r.date, v)))
            .collect();
        let (sx, hy): (Vec<f64>, Vec<f64>) = steps_by_date
            .iter()
            .filter_map(|(date, steps)| {
                let next = *date + Days::new(1);
                hrv_by_date.get(&next).map(|hrv| (*steps, *hrv))
            })
            .unzip();
        if sx.len() >= self.settings.min_correlation_pairs {
            let sx = stats::winsorize(&sx, self.settings.winsorize_pct);
            let hy = stats::winsorize(&hy, self.settings.winsorize_pct);
            let r = stats::pearson(&sx, &hy).unwrap_or(0.0);
            findings.push(AnalyticsFinding::new(
                "Load vs recovery",
                "Steps vs next-day HRV",
                format!("r = {:+.2}", r),
                format!("winsorized at {:.0}%, n = {} days", self.settings.winsorize_pct * 100.0, sx.len()),
            ));
        } else {
            debug!(pairs = sx.len(), "steps/HRV correlation gate not met");
        }
    }

    /// Monthly sleep regularity: CV of nightly minutes against that month's
    /// mean score.
    fn consistency(&self, snapshot: &MetricSnapshot, findings: &mut Vec<AnalyticsFinding>) {
        let mut minutes_by_month: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut scores_by_month: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for record in &snapshot.sleep {
            let key = format!("{}", record.date.format("%Y-%m"));
            if let Some(minutes) = record.minutes_asleep {
                minutes_by_month.entry(key.clone()).or_default().push(minutes);
            }
            if let Some(score) = record.sleep_score {
                scores_by_month.entry(key).or_default().push(score);
            }
        }

        let mut cvs = Vec::new();
        let mut mean_scores = Vec::new();
        for (month, minutes) in &minutes_by_month {
            let (Some(cv), Some(scores)) = (stats::cv(minutes), scores_by_month.get(month)) else {
                continue;
            };
            let Some(score) = stats::mean(scores) else {
                continue;
            };
            cvs.push(cv);
            mean_scores.push(score);
        }
        if cvs.len() < 2 {
            debug!(months = cvs.len(), "consistency gate not met");
            return;
        }
        let r = stats::pearson(&cvs, &mean_scores).unwrap_or(0.0);
        findings.push(AnalyticsFinding::new(
            "Consistency",
            "Sleep regularity vs score",
            format!("r = {:+.2}", r),
            format!(
                "monthly CV of minutes asleep vs mean score, n = {} months",
                cvs.len()
            ),
        ));
    }

    /// Conditional-probability recipes over nightly sleep.
    fn recipes(&self, snapshot: &MetricSnapshot, findings: &mut Vec<AnalyticsFinding>) {
        // P(score >= threshold | minutes asleep >= threshold)
        let qualifying: Vec<&crate::models::SleepRecord> = snapshot
            .sleep
            .iter()
            .filter(|r| {
                r.minutes_asleep
                    .is_some_and(|m| m >= self.settings.recipe_duration_minutes)
                    && r.sleep_score.is_some()
            })
            .collect();
        if qualifying.len() >= self.settings.recipe_duration_min_nights {
            let hits = qualifying
                .iter()
                .filter(|r| {
                    r.sleep_score
                        .is_some_and(|s| s >= self.settings.recipe_score_threshold)
                })
                .count();
            let p = hits as f64 / qualifying.len() as f64 * 100.0;
            findings.push(AnalyticsFinding::new(
                "Recipes",
                "Duration to score",
                format!("{:.0}%", p),
                format!(
                    "P(score >= {:.0} | asleep >= {:.0} min), n = {} nights",
                    self.settings.recipe_score_threshold,
                    self.settings.recipe_duration_minutes,
                    qualifying.len()
                ),
            ));
        } else {
            debug!(nights = qualifying.len(), "duration recipe gate not met");
        }

        // P(next-day HRV above its median | deep+REM share >= threshold)
        let hrv_by_date: BTreeMap<NaiveDate, f64> = snapshot
            .hrv
            .iter()
            .filter_map(|r| r.rmssd.map(|v| (r.date, v)))
            .collect();
        let hrv_values: Vec<f64> = hrv_by_date.values().copied().collect();
        let Some(median_hrv) = stats::quantile(&hrv_values, 0.5) else {
            return;
        };

        let stage_nights: Vec<(NaiveDate, f64)> = snapshot
            .sleep
            .iter()
            .filter_map(|r| {
                let asleep = r.minutes_asleep.filter(|a| *a > 0.0)?;
                let deep = r.minutes_deep?;
                let rem = r.minutes_rem?;
                let share = (deep + rem) / asleep;
                (share >= self.settings.recipe_stage_share).then_some(())?;
                let next_hrv = hrv_by_date.get(&(r.date + Days::new(1)))?;
                Some((r.date, *next_hrv))
            })
            .collect();
        if stage_nights.len() >= self.settings.recipe_stage_min_nights {
            let hits = stage_nights.iter().filter(|(_, v)| *v > median_hrv).count();
            let p = hits as f64 / stage_nights.len() as f64 * 100.0;
            findings.push(AnalyticsFinding::new(
                "Recipes",
                "Deep+REM to HRV",
                format!("{:.0}%", p),
                format!(
                    "P(next-day HRV > {:.1} ms median | deep+REM share >= {:.0}%), n = {} nights",
                    median_hrv,
                    self.settings.recipe_stage_share * 100.0,
                    stage_nights.len()
                ),
            ));
        } else {
            debug!(nights = stage_nights.len(), "stage recipe gate not met");
        }
    }

    /// Median days for HRV to rebound to its median after a bottom-quintile
    /// day. Reports "n/a" in preference to zero when nothing rebounds.
    fn hrv_rebound(&self, snapshot: &MetricSnapshot, findings: &mut Vec<AnalyticsFinding>) {
        let valid: Vec<(NaiveDate, f64)> = snapshot
            .hrv
            .iter()
            .filter_map(|r| r.rmssd.map(|v| (r.date, v)))
            .collect();
        let values: Vec<f64> = valid.iter().map(|(_, v)| *v).collect();
        let (Some(q20), Some(median)) =
            (stats::quantile(&values, 0.2), stats::quantile(&values, 0.5))
        else {
            return;
        };

        let low_days: Vec<usize> = valid
            .iter()
            .enumerate()
            .filter(|(_, (_, v))| *v <= q20)
            .map(|(i, _)| i)
            .collect();
        if low_days.is_empty() {
            debug!("no bottom-quintile HRV days, rebound analysis skipped");
            return;
        }

        let mut durations = Vec::new();
        for &i in &low_days {
            let low_date = valid[i].0;
            if let Some((date, _)) = valid[i + 1..].iter().find(|(_, v)| *v >= median) {
                durations.push((*date - low_date).num_days() as f64);
            }
        }
        if durations.is_empty() {
            findings.push(AnalyticsFinding::new(
                "Recovery",
                "HRV rebound",
                "n/a",
                format!(
                    "{} low-HRV days (<= {:.1} ms), none rebounded to the {:.1} ms median",
                    low_days.len(),
                    q20,
                    median
                ),
            ));
            return;
        }
        let median_days = stats::quantile(&durations, 0.5).unwrap_or(0.0);
        findings.push(AnalyticsFinding::new(
            "Recovery",
            "HRV rebound",
            format!("{:.0} days", median_days),
            format!(
                "median rebound to {:.1} ms over {} of {} low-HRV days",
                median,
                durations.len(),
                low_days.len()
            ),
        ));
    }

    /// Global CUSUM scan on RHR and HRV; only the single largest-magnitude
    /// excursion per metric is reported.
    fn sustained_shifts(&self, snapshot: &MetricSnapshot, findings: &mut Vec<AnalyticsFinding>) {
        let profile = WindowProfile::global();
        for metric in [MetricKind::Rhr, MetricKind::Hrv] {
            let series = metric_series(snapshot, metric);
            let Some(detection) = cusum::detect(&series, &profile) else {
                debug!(%metric, "no sustained shift detected");
                continue;
            };
            findings.push(AnalyticsFinding::new(
                "Sustained shifts",
                metric.label(),
                format!("{} from {}", detection.event.direction, detection.event.onset_date),
                format!(
                    "excursion {:.1} against h = {:.1}, baseline {:.1} {}",
                    detection.event.magnitude,
                    detection.h,
                    detection.params.mean,
                    metric.unit()
                ),
            ));
        }
    }

    /// Sleep score keyed by the configured attribution day.
    fn sleep_score_by_day(&self, snapshot: &MetricSnapshot) -> BTreeMap<NaiveDate, f64> {
        snapshot
            .sleep
            .iter()
            .filter_map(|r| {
                let score = r.sleep_score?;
                let day = match self.settings.sleep_key {
                    SleepDateKey::Wake => r.date,
                    SleepDateKey::Bedtime => r.date.pred_opt()?,
                };
                Some((day, score))
            })
            .collect()
    }
}

/// Extract one metric's primary daily column as dated values, sorted by date.
pub fn metric_series(snapshot: &MetricSnapshot, metric: MetricKind) -> Vec<DatedValue> {
    let mut series: Vec<DatedValue> = match metric {
        MetricKind::Sleep => snapshot
            .sleep
            .iter()
            .map(|r| DatedValue::new(r.date, r.sleep_score))
            .collect(),
        MetricKind::Hrv => snapshot
            .hrv
            .iter()
            .map(|r| DatedValue::new(r.date, r.rmssd))
            .collect(),
        MetricKind::Steps => snapshot
            .steps
            .iter()
            .map(|r| DatedValue::new(r.date, r.steps))
            .collect(),
        MetricKind::Rhr => snapshot
            .rhr
            .iter()
            .map(|r| DatedValue::new(r.date, r.resting_hr))
            .collect(),
    };
    series.sort_by_key(|dv| dv.date);
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HrvRecord, RhrRecord, SleepRecord, StepsRecord};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sleep(date: NaiveDate, minutes: f64, score: f64) -> SleepRecord {
        SleepRecord {
            date,
            minutes_asleep: Some(minutes),
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

    fn snapshot_with_years() -> MetricSnapshot {
        let mut snapshot = MetricSnapshot::default();
        for (year, rhr) in [(2022, 58.0), (2023, 60.0), (2024, 63.0)] {
            for day in 1..=20 {
                snapshot.rhr.push(RhrRecord {
                    date: date(year, 3, day),
                    resting_hr: Some(rhr),
                });
            }
        }
        snapshot
    }

    #[test]
    fn test_multi_year_trend_reports_pct_change() {
        let engine = AnalyticsEngine::new();
        let findings = engine.compute_analytics(&snapshot_with_years());
        let trend = findings
            .iter()
            .find(|f| f.section == "Multi-year trend" && f.metric == "Resting HR")
            .expect("trend finding");
        // 58 -> 63 is +8.6%
        assert!(trend.value.starts_with("+8.6%"), "got {}", trend.value);
    }

    #[test]
    fn test_multi_year_trend_gated_under_two_years() {
        let mut snapshot = MetricSnapshot::default();
        for day in 1..=20 {
            snapshot.rhr.push(RhrRecord {
                date: date(2024, 3, day),
                resting_hr: Some(60.0),
            });
        }
        let findings = AnalyticsEngine::new().compute_analytics(&snapshot);
        assert!(!findings.iter().any(|f| f.section == "Multi-year trend"));
    }

    #[test]
    fn test_seasonality_low_confidence_tooltip() {
        let mut snapshot = MetricSnapshot::default();
        // June: 20 strong days; July: 3 even stronger days (low confidence)
        for day in 1..=20 {
            snapshot.hrv.push(HrvRecord {
                date: date(2024, 6, day),
                rmssd: Some(55.0),
            });
        }
        for day in 1..=3 {
            snapshot.hrv.push(HrvRecord {
                date: date(2024, 7, day),
                rmssd: Some(70.0),
            });
        }
        let findings = AnalyticsEngine::new().compute_analytics(&snapshot);
        let seasonal = findings
            .iter()
            .find(|f| f.section == "Seasonality" && f.metric == "HRV")
            .expect("seasonality finding");
        assert!(seasonal.value.contains("July"));
        let tooltip = seasonal.tooltip.as_ref().expect("low-confidence tooltip");
        assert!(tooltip.contains("June"));
    }

    #[test]
    fn test_seasonality_rhr_best_is_lowest() {
        let mut snapshot = MetricSnapshot::default();
        for day in 1..=16 {
            snapshot.rhr.push(RhrRecord {
                date: date(2024, 2, day),
                resting_hr: Some(55.0),
            });
            snapshot.rhr.push(RhrRecord {
                date: date(2024, 8, day),
                resting_hr: Some(64.0),
            });
        }
        let findings = AnalyticsEngine::new().compute_analytics(&snapshot);
        let seasonal = findings
            .iter()
            .find(|f| f.section == "Seasonality" && f.metric == "Resting HR")
            .expect("seasonality finding");
        assert!(seasonal.value.contains("February"), "got {}", seasonal.value);
    }

    #[test]
    fn test_load_recovery_correlation() {
        let mut snapshot = MetricSnapshot::default();
        let start = date(2024, 1, 1);
        // more steps on day d, better score the following wake date
        for i in 0..30 {
            let day = start + Days::new(i);
            let steps = 4000.0 + 300.0 * i as f64;
            snapshot.steps.push(StepsRecord {
                date: day,
                steps: Some(steps),
                sedentary_minutes: Some(600.0),
            });
            snapshot
                .sleep
                .push(sleep(day + Days::new(1), 420.0, 50.0 + i as f64));
        }
        let findings = AnalyticsEngine::new().compute_analytics(&snapshot);
        let corr = findings
            .iter()
            .find(|f| f.metric == "Steps vs sleep score")
            .expect("correlation finding");
        assert!(corr.value.contains("+1.00"), "got {}", corr.value);
        assert!(corr.notes.contains("n = 30"));
    }

    #[test]
    fn test_recipe_duration_to_score() {
        let mut snapshot = MetricSnapshot::default();
        let start = date(2024, 1, 1);
        for i in 0..60 {
            // all nights long; 45 of 60 clear the score bar
            let score = if i % 4 == 0 { 70.0 } else { 80.0 };
            snapshot.sleep.push(sleep(start + Days::new(i), 450.0, score));
        }
        let findings = AnalyticsEngine::new().compute_analytics(&snapshot);
        let recipe = findings
            .iter()
            .find(|f| f.metric == "Duration to score")
            .expect("recipe finding");
        assert_eq!(recipe.value, "75%");
    }

    #[test]
    fn test_hrv_rebound_n_a_when_no_recovery() {
        let mut snapshot = MetricSnapshot::default();
        let start = date(2024, 1, 1);
        // monotonically declining HRV: low days never rebound to the median
        for i in 0..20 {
            snapshot.hrv.push(HrvRecord {
                date: start + Days::new(i),
                rmssd: Some(80.0 - i as f64 * 2.0),
            });
        }
        let findings = AnalyticsEngine::new().compute_analytics(&snapshot);
        let rebound = findings
            .iter()
            .find(|f| f.metric == "HRV rebound")
            .expect("rebound finding");
        assert_eq!(rebound.value, "n/a");
    }

    #[test]
    fn test_sustained_shift_reported_for_rhr() {
        let mut snapshot = MetricSnapshot::default();
        let start = date(2024, 1, 1);
        for i in 0..40 {
            snapshot.rhr.push(RhrRecord {
                date: start + Days::new(i),
                resting_hr: Some(60.0),
            });
        }
        for i in 40..50 {
            snapshot.rhr.push(RhrRecord {
                date: start + Days::new(i),
                resting_hr: Some(75.0),
            });
        }
        let findings = AnalyticsEngine::new().compute_analytics(&snapshot);
        let shift = findings
            .iter()
            .find(|f| f.section == "Sustained shifts" && f.metric == "Resting HR")
            .expect("shift finding");
        assert!(shift.value.contains("up from 2024-02-10"), "got {}", shift.value);
    }

    #[test]
    fn test_compute_analytics_deterministic() {
        let snapshot = snapshot_with_years();
        let engine = AnalyticsEngine::new();
        assert_eq!(
            engine.compute_analytics(&snapshot),
            engine.compute_analytics(&snapshot)
        );
    }
}
