use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use vitalrs::aggregate::{self, DatedValue};
use vitalrs::cusum::{self, WindowProfile};
use vitalrs::normalize::compute_sleep_score;
use vitalrs::stats;

fn dated(values: &[Option<f64>]) -> Vec<DatedValue> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| DatedValue::new(start + Days::new(i as u64), v))
        .collect()
}

fn finite_value() -> impl Strategy<Value = f64> {
    -1.0e6..1.0e6
}

fn maybe_value() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![3 => finite_value().prop_map(Some), 1 => Just(None)]
}

proptest! {
    #[test]
    fn prop_sleep_score_stays_in_bounds(
        asleep in 0.0..1200.0f64,
        efficiency in -50.0..200.0f64,
        deep in 0.0..400.0f64,
        rem in 0.0..400.0f64,
        awake in 0.0..600.0f64,
        latency in 0.0..300.0f64,
    ) {
        let score = compute_sleep_score(
            Some(asleep),
            Some(efficiency),
            Some(deep),
            Some(rem),
            Some(awake),
            Some(latency),
        );
        if let Some(score) = score {
            prop_assert!((0.0..=100.0).contains(&score), "score {} out of bounds", score);
        }
    }

    #[test]
    fn prop_sleep_score_all_missing_is_none(_seed in 0..10u8) {
        prop_assert_eq!(compute_sleep_score(None, None, None, None, None, None), None);
    }

    #[test]
    fn prop_cusum_sums_non_negative(
        values in prop::collection::vec(maybe_value(), 0..200),
        mean in finite_value(),
        k in 0.0..100.0f64,
    ) {
        let series = dated(&values);
        for point in cusum::compute_trace(&series, mean, k) {
            prop_assert!(point.upper_sum >= 0.0);
            prop_assert!(point.lower_sum >= 0.0);
        }
    }

    #[test]
    fn prop_detect_never_panics_and_is_deterministic(
        values in prop::collection::vec(maybe_value(), 0..150),
    ) {
        let series = dated(&values);
        let a = cusum::detect(&series, &WindowProfile::global());
        let b = cusum::detect(&series, &WindowProfile::global());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_pearson_symmetric_and_bounded(
        pairs in prop::collection::vec((finite_value(), finite_value()), 0..100),
    ) {
        let x: Vec<f64> = pairs.iter().map(|p| p.0).collect();
        let y: Vec<f64> = pairs.iter().map(|p| p.1).collect();
        let xy = stats::pearson(&x, &y).unwrap();
        let yx = stats::pearson(&y, &x).unwrap();
        prop_assert!((xy - yx).abs() < 1e-9);
        prop_assert!((-1.0 - 1e-9..=1.0 + 1e-9).contains(&xy), "r = {}", xy);
    }

    #[test]
    fn prop_spearman_bounded(
        pairs in prop::collection::vec((finite_value(), finite_value()), 0..80),
    ) {
        let x: Vec<f64> = pairs.iter().map(|p| p.0).collect();
        let y: Vec<f64> = pairs.iter().map(|p| p.1).collect();
        let rho = stats::spearman(&x, &y).unwrap();
        prop_assert!((-1.0 - 1e-9..=1.0 + 1e-9).contains(&rho), "rho = {}", rho);
    }

    #[test]
    fn prop_winsorize_idempotent(
        values in prop::collection::vec(finite_value(), 0..120),
        p in 0.0..0.49f64,
    ) {
        let once = stats::winsorize(&values, p);
        let twice = stats::winsorize(&once, p);
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once.len(), values.len());
    }

    #[test]
    fn prop_quantile_within_range_and_monotone(
        values in prop::collection::vec(finite_value(), 1..100),
        p1 in 0.0..=1.0f64,
        p2 in 0.0..=1.0f64,
    ) {
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let (lo, hi) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
        let ql = stats::quantile(&values, lo).unwrap();
        let qh = stats::quantile(&values, hi).unwrap();
        prop_assert!(ql >= min && qh <= max);
        prop_assert!(ql <= qh);
    }

    #[test]
    fn prop_average_ranks_sum(values in prop::collection::vec(finite_value(), 0..60)) {
        let ranks = stats::average_ranks(&values);
        let n = values.len() as f64;
        let sum: f64 = ranks.iter().sum();
        prop_assert!((sum - n * (n + 1.0) / 2.0).abs() < 1e-6);
    }

    #[test]
    fn prop_bucket_average_bounded_by_contributions(
        values in prop::collection::vec(maybe_value(), 0..200),
    ) {
        let series = dated(&values);
        let present: Vec<f64> = values.iter().filter_map(|v| *v).collect();
        for bucket in aggregate::group_by_month(&series) {
            match bucket.average {
                Some(avg) => {
                    let min = present.iter().cloned().fold(f64::INFINITY, f64::min);
                    let max = present.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                    prop_assert!(avg >= min - 1e-9 && avg <= max + 1e-9);
                    prop_assert!(bucket.count > 0);
                }
                None => prop_assert_eq!(bucket.count, 0),
            }
            prop_assert!(bucket.count <= bucket.days);
        }
    }

    #[test]
    fn prop_single_bucket_average_is_mean(
        values in prop::collection::vec(-1000.0..1000.0f64, 1..28),
    ) {
        // all dates inside one month: bucket average equals the plain mean
        let series = dated(&values.iter().map(|&v| Some(v)).collect::<Vec<_>>());
        let buckets = aggregate::group_by_month(&series);
        prop_assert_eq!(buckets.len(), 1);
        let expected = stats::mean(&values).unwrap();
        prop_assert!((buckets[0].average.unwrap() - expected).abs() < 1e-9);
    }
}
