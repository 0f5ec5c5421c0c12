//! Two-sided CUSUM change-point detection
//!
//! Control-chart procedure for finding sustained shifts in a daily metric
//! away from a baseline. One parameterized [`detect`] entry point serves
//! every call site — the global 30-day-baseline scan and the short
//! post-event windows — with window-size-dependent thresholds carried in a
//! [`WindowProfile`] instead of duplicated per caller.
//!
//! The baseline is always the first (up to `baseline_cap`) valid
//! observations of the series. That conflates "start of monitoring" with
//! "representative normal state": if the opening stretch itself contains an
//! anomaly, detection quality degrades. This is a known, accepted limitation
//! of the procedure; no baseline-stability validation is attempted.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use crate::aggregate::DatedValue;
use crate::stats;

/// Baseline parameters for one detection run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineParams {
    /// Baseline center
    pub mean: f64,

    /// Baseline spread. Coerced to 1.0 when zero or non-finite so the
    /// detection bands never collapse to zero width.
    pub sigma: f64,

    /// Reference (slack) value, 0.5 * sigma
    pub k: f64,

    /// Decision interval, 5 * sigma
    pub h: f64,
}

/// Derive CUSUM parameters from a baseline window.
///
/// `None` when the window holds no finite value.
pub fn derive_baseline_params(baseline: &[f64]) -> Option<BaselineParams> {
    let mean = stats::mean(baseline)?;
    let mut sigma = stats::stdev(baseline).unwrap_or(0.0);
    if sigma == 0.0 || !sigma.is_finite() {
        sigma = 1.0;
    }
    Some(BaselineParams {
        mean,
        sigma,
        k: 0.5 * sigma,
        h: 5.0 * sigma,
    })
}

/// One step of a CUSUM trace
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CusumPoint {
    pub index: usize,
    pub date: NaiveDate,
    pub value: f64,
    /// Accumulated upward deviation, non-negative by construction
    pub upper_sum: f64,
    /// Accumulated downward deviation, non-negative by construction
    pub lower_sum: f64,
}

/// Direction of a detected shift
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftDirection {
    Up,
    Down,
}

impl fmt::Display for ShiftDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShiftDirection::Up => write!(f, "up"),
            ShiftDirection::Down => write!(f, "down"),
        }
    }
}

/// A sustained shift surfaced from a trace
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShiftEvent {
    /// First day of the unbroken excursion run that crossed the decision
    /// interval (index after the last zero of the relevant sum)
    pub onset_date: NaiveDate,

    pub direction: ShiftDirection,

    /// Peak accumulated sum of the excursion, in sigma-scaled units
    pub magnitude: f64,
}

/// Compute the two-sided CUSUM trace over a series.
///
/// `upper[i] = max(0, upper[i-1] + (v - mean) - k)` and
/// `lower[i] = max(0, lower[i-1] - (v - mean) - k)`; a sum resets to zero
/// whenever the deviation is insufficiently sustained. Points with missing
/// values are skipped, keeping the accumulated sums across the gap.
pub fn compute_trace(series: &[DatedValue], mean: f64, k: f64) -> Vec<CusumPoint> {
    let mut trace = Vec::new();
    let mut upper = 0.0_f64;
    let mut lower = 0.0_f64;
    for (index, dv) in series.iter().enumerate() {
        let value = match dv.value.filter(|v| v.is_finite()) {
            Some(v) => v,
            None => continue,
        };
        upper = (upper + (value - mean) - k).max(0.0);
        lower = (lower - (value - mean) - k).max(0.0);
        trace.push(CusumPoint {
            index,
            date: dv.date,
            value,
            upper_sum: upper,
            lower_sum: lower,
        });
    }
    trace
}

/// Extract every shift event from a trace.
///
/// An excursion is an unbroken run of a sum above zero; it becomes an event
/// when its peak reaches the decision interval `h`. The onset is the first
/// point of the run. Events are deduplicated by `(onset date, direction)`.
pub fn shift_events(trace: &[CusumPoint], h: f64) -> Vec<ShiftEvent> {
    let mut events = Vec::new();
    let mut seen: HashSet<(NaiveDate, ShiftDirection)> = HashSet::new();
    for direction in [ShiftDirection::Up, ShiftDirection::Down] {
        for event in excursions(trace, direction, h) {
            if seen.insert((event.onset_date, event.direction)) {
                events.push(event);
            }
        }
    }
    events.sort_by_key(|e| e.onset_date);
    events
}

/// Threshold and minimum-length rules for one detection scope.
///
/// Shorter windows cannot accumulate as much signal, so they run with a
/// scaled-down decision interval and smaller floors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowProfile {
    /// Multiplier applied to the decision interval `h`
    pub h_scale: f64,

    /// Maximum number of leading observations used as the baseline
    pub baseline_cap: usize,

    /// Minimum valid baseline observations; below this, no detection
    pub min_baseline: usize,

    /// Minimum valid observations after the baseline; below this, no
    /// detection
    pub min_post: usize,
}

impl WindowProfile {
    /// Profile for the global sustained-shift scan (30-day baseline)
    pub fn global() -> Self {
        WindowProfile {
            h_scale: 1.0,
            baseline_cap: 30,
            min_baseline: 10,
            min_post: 5,
        }
    }

    /// Profile for a post-event window of the given size.
    ///
    /// 3-day windows run at 0.5x the decision interval, widening stepwise to
    /// the full interval at 30 days.
    pub fn for_window_days(window_days: u32) -> Self {
        match window_days {
            0..=3 => WindowProfile {
                h_scale: 0.5,
                baseline_cap: 7,
                min_baseline: 3,
                min_post: 3,
            },
            4..=7 => WindowProfile {
                h_scale: 0.6,
                baseline_cap: 7,
                min_baseline: 4,
                min_post: 5,
            },
            8..=15 => WindowProfile {
                h_scale: 0.8,
                baseline_cap: 7,
                min_baseline: 5,
                min_post: 8,
            },
            _ => WindowProfile {
                h_scale: 1.0,
                baseline_cap: 7,
                min_baseline: 7,
                min_post: 12,
            },
        }
    }
}

/// Full result of a detection run, including the trace for chart overlays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// The single largest-magnitude excursion that met the decision interval
    pub event: ShiftEvent,

    /// Effective decision interval after profile scaling
    pub h: f64,

    pub params: BaselineParams,

    pub trace: Vec<CusumPoint>,

    /// Peak accumulated sum across both sides
    pub max_excursion: f64,
}

/// Run the detector over a series under a window profile.
///
/// The baseline is the first `baseline_cap` valid observations. Returns
/// `None` — never an error — when the series is too short, or when no
/// excursion reaches the scaled decision interval. When both sides cross,
/// the dominant (larger peak) side wins.
pub fn detect(series: &[DatedValue], profile: &WindowProfile) -> Option<Detection> {
    let valid: Vec<DatedValue> = series
        .iter()
        .filter(|dv| dv.value.is_some_and(|v| v.is_finite()))
        .copied()
        .collect();

    let baseline_len = valid.len().min(profile.baseline_cap);
    if baseline_len < profile.min_baseline
        || valid.len() - baseline_len < profile.min_post
    {
        debug!(
            valid = valid.len(),
            baseline = baseline_len,
            "series below window floor, skipping detection"
        );
        return None;
    }

    let baseline_values: Vec<f64> = valid[..baseline_len]
        .iter()
        .filter_map(|dv| dv.value)
        .collect();
    let params = derive_baseline_params(&baseline_values)?;
    let h = params.h * profile.h_scale;

    let trace = compute_trace(&valid, params.mean, params.k);
    let max_upper = trace.iter().map(|p| p.upper_sum).fold(0.0, f64::max);
    let max_lower = trace.iter().map(|p| p.lower_sum).fold(0.0, f64::max);
    let max_excursion = max_upper.max(max_lower);
    if max_excursion < h {
        return None;
    }

    let direction = if max_upper >= max_lower {
        ShiftDirection::Up
    } else {
        ShiftDirection::Down
    };
    let event = excursions(&trace, direction, h)
        .into_iter()
        .max_by(|a, b| a.magnitude.partial_cmp(&b.magnitude).expect("finite magnitudes"))?;

    Some(Detection {
        event,
        h,
        params,
        trace,
        max_excursion,
    })
}

/// Excursion runs of one side whose peak reaches `h`.
fn excursions(trace: &[CusumPoint], direction: ShiftDirection, h: f64) -> Vec<ShiftEvent> {
    let sum_of = |p: &CusumPoint| match direction {
        ShiftDirection::Up => p.upper_sum,
        ShiftDirection::Down => p.lower_sum,
    };

    let mut events = Vec::new();
    let mut run_start: Option<usize> = None;
    let mut run_peak = 0.0_f64;
    for (i, point) in trace.iter().enumerate() {
        let sum = sum_of(point);
        if sum > 0.0 {
            if run_start.is_none() {
                run_start = Some(i);
                run_peak = 0.0;
            }
            run_peak = run_peak.max(sum);
        } else if let Some(start) = run_start.take() {
            if run_peak >= h {
                events.push(ShiftEvent {
                    onset_date: trace[start].date,
                    direction,
                    magnitude: run_peak,
                });
            }
        }
    }
    if let Some(start) = run_start {
        if run_peak >= h {
            events.push(ShiftEvent {
                onset_date: trace[start].date,
                direction,
                magnitude: run_peak,
            });
        }
    }
    events
}
