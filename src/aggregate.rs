//! Bucket aggregation over daily values
//!
//! Groups dated values into month (`YYYY-MM`), year (`YYYY`), calendar-month
//! (January..December across years), and weekday buckets. Averages are
//! computed over non-missing contributions only; a bucket with zero
//! non-missing contributions carries `None` — downstream consumers treat
//! that as "insufficient data", never as zero.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single day's value for one metric column, possibly missing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatedValue {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

impl DatedValue {
    pub fn new(date: NaiveDate, value: Option<f64>) -> Self {
        DatedValue { date, value }
    }
}

/// One month or year bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateBucket {
    /// Bucket key: `YYYY-MM` for months, `YYYY` for years
    pub key: String,

    /// Mean over non-missing contributions, `None` when there are none
    pub average: Option<f64>,

    /// Number of non-missing contributions
    pub count: usize,

    /// Number of days that fell into this bucket (missing included)
    pub days: usize,
}

/// Group by `YYYY-MM`, sorted ascending by key.
pub fn group_by_month(values: &[DatedValue]) -> Vec<AggregateBucket> {
    group_by_key(values, month_key, false)
}

/// Group by `YYYY`, sorted ascending by key.
pub fn group_by_year(values: &[DatedValue]) -> Vec<AggregateBucket> {
    group_by_key(values, year_key, false)
}

/// Strict month grouping: a day only joins its bucket when the value itself
/// is present, so `days == count`. Used when a derived metric (e.g. HRV)
/// needs bucket-level date alignment distinct from the host record's key.
pub fn group_by_month_strict(values: &[DatedValue]) -> Vec<AggregateBucket> {
    group_by_key(values, month_key, true)
}

/// One calendar month (1-12) aggregated across all years
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarMonthBucket {
    /// Month number, 1 = January
    pub month: u32,

    pub average: Option<f64>,

    /// Number of non-missing contributing days
    pub count: usize,
}

impl CalendarMonthBucket {
    pub fn month_name(&self) -> &'static str {
        match self.month {
            1 => "January",
            2 => "February",
            3 => "March",
            4 => "April",
            5 => "May",
            6 => "June",
            7 => "July",
            8 => "August",
            9 => "September",
            10 => "October",
            11 => "November",
            _ => "December",
        }
    }
}

/// Group by calendar month across years; only months with at least one
/// non-missing day are returned, ascending by month number.
pub fn group_by_calendar_month(values: &[DatedValue]) -> Vec<CalendarMonthBucket> {
    let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for dv in values {
        if let Some(v) = dv.value.filter(|v| v.is_finite()) {
            let entry = sums.entry(dv.date.month()).or_insert((0.0, 0));
            entry.0 += v;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(month, (sum, count))| CalendarMonthBucket {
            month,
            average: Some(sum / count as f64),
            count,
        })
        .collect()
}

/// One weekday aggregated across the whole series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayBucket {
    pub weekday: Weekday,

    pub average: Option<f64>,

    /// Number of non-missing contributing days
    pub count: usize,
}

/// Group by weekday, Monday first; only weekdays with at least one
/// non-missing day are returned.
pub fn group_by_weekday(values: &[DatedValue]) -> Vec<WeekdayBucket> {
    let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for dv in values {
        if let Some(v) = dv.value.filter(|v| v.is_finite()) {
            let entry = sums
                .entry(dv.date.weekday().num_days_from_monday())
                .or_insert((0.0, 0));
            entry.0 += v;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(day, (sum, count))| WeekdayBucket {
            weekday: weekday_from_monday_index(day),
            average: Some(sum / count as f64),
            count,
        })
        .collect()
}

fn weekday_from_monday_index(index: u32) -> Weekday {
    match index {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

fn year_key(date: NaiveDate) -> String {
    format!("{:04}", date.year())
}

fn group_by_key(
    values: &[DatedValue],
    key_fn: fn(NaiveDate) -> String,
    strict: bool,
) -> Vec<AggregateBucket> {
    let mut buckets: BTreeMap<String, (f64, usize, usize)> = BTreeMap::new();
    for dv in values {
        let present = dv.value.filter(|v| v.is_finite());
        if strict && present.is_none() {
            continue;
        }
        let entry = buckets.entry(key_fn(dv.date)).or_insert((0.0, 0, 0));
        entry.2 += 1;
        if let Some(v) = present {
            entry.0 += v;
            entry.1 += 1;
        }
    }
    buckets
        .into_iter()
        .map(|(key, (sum, count, days))| AggregateBucket {
            key,
            average: if count > 0 {
                Some(sum / count as f64)
            } else {
                None
            },
            count,
            days,
        })
        .collect()
}
