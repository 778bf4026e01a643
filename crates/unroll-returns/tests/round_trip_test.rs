//! Round-trip tests over generated MTD return matrices.

use approx::assert_abs_diff_eq;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use unroll_returns::{
    ConversionConfig, MonthKey, ReturnMatrix, ReturnsError, convert_and_validate,
    daily_log_returns, partition_by_month,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut day = start;
    while day <= end {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(day);
        }
        day = day + Days::new(1);
    }
    days
}

/// Simulated daily simple returns and the MTD matrix they compound into.
struct Generated {
    daily_simple: Vec<Vec<f64>>,
    mtd: ReturnMatrix,
}

fn generate(seed: u64, securities: &[&str], start: NaiveDate, end: NaiveDate) -> Generated {
    let mut rng = StdRng::seed_from_u64(seed);
    let dates = business_days(start, end);

    let mut daily_simple = Vec::with_capacity(dates.len());
    let mut rows = Vec::with_capacity(dates.len());
    let mut growth = vec![1.0_f64; securities.len()];
    let mut current_month = None;

    for date in &dates {
        let month = MonthKey::from_date(*date);
        if current_month != Some(month) {
            growth.iter_mut().for_each(|g| *g = 1.0);
            current_month = Some(month);
        }

        let returns: Vec<f64> = securities
            .iter()
            .map(|_| rng.gen_range(-0.03..0.03))
            .collect();
        for (g, r) in growth.iter_mut().zip(&returns) {
            *g *= 1.0 + r;
        }

        rows.push((*date, growth.iter().map(|g| Some(g - 1.0)).collect()));
        daily_simple.push(returns);
    }

    Generated {
        daily_simple,
        mtd: ReturnMatrix::from_rows(
            securities.iter().map(ToString::to_string).collect(),
            rows,
        )
        .unwrap(),
    }
}

#[test]
fn test_round_trip_law_on_generated_data() {
    let securities = ["SPX", "NDX", "AGG", "EEM"];
    let generated = generate(7, &securities, date(2023, 10, 2), date(2024, 5, 31));

    let daily = daily_log_returns(&generated.mtd, &ConversionConfig::default()).unwrap();

    for group in partition_by_month(&daily) {
        let mtd_group = partition_by_month(&generated.mtd)
            .into_iter()
            .find(|g| g.key == group.key)
            .unwrap();
        let last_row = mtd_group.matrix.n_dates() - 1;

        for (j, _) in securities.iter().enumerate() {
            let total: f64 = group
                .matrix
                .values()
                .column(j)
                .iter()
                .map(|v| v.unwrap())
                .sum();
            assert_abs_diff_eq!(
                total.exp() - 1.0,
                mtd_group.matrix.values()[[last_row, j]].unwrap(),
                epsilon = 1e-12
            );
        }
    }
}

#[test]
fn test_recovers_simulated_daily_returns() {
    let securities = ["A", "B"];
    let generated = generate(11, &securities, date(2024, 1, 1), date(2024, 3, 31));
    let daily = daily_log_returns(&generated.mtd, &ConversionConfig::default()).unwrap();

    for (i, simple) in generated.daily_simple.iter().enumerate() {
        for (j, r) in simple.iter().enumerate() {
            assert_abs_diff_eq!(
                daily.values()[[i, j]].unwrap(),
                (1.0 + r).ln(),
                epsilon = 1e-12
            );
        }
    }
}

#[test]
fn test_ordering_invariant_for_shuffled_input() {
    let generated = generate(3, &["A", "B", "C"], date(2024, 1, 1), date(2024, 4, 30));
    let sorted_daily = daily_log_returns(&generated.mtd, &ConversionConfig::default()).unwrap();

    let mut order: Vec<usize> = (0..generated.mtd.n_dates()).collect();
    order.shuffle(&mut StdRng::seed_from_u64(99));
    let shuffled = generated.mtd.select_rows(&order);
    assert!(!shuffled.is_sorted());

    let daily = daily_log_returns(&shuffled, &ConversionConfig::default()).unwrap();
    assert!(daily.is_sorted());
    assert_eq!(daily.dates(), generated.mtd.dates());
    assert_eq!(daily, sorted_daily);
}

#[test]
fn test_partition_completeness() {
    let generated = generate(5, &["A"], date(2023, 12, 1), date(2024, 6, 28));
    let groups = partition_by_month(&generated.mtd);

    assert_eq!(groups.len(), 7);
    let rows: usize = groups.iter().map(|g| g.matrix.n_dates()).sum();
    assert_eq!(rows, generated.mtd.n_dates());

    let mut dates: Vec<NaiveDate> = groups
        .iter()
        .flat_map(|g| g.matrix.dates().to_vec())
        .collect();
    let before = dates.len();
    dates.dedup();
    assert_eq!(dates.len(), before);
}

#[test]
fn test_security_missing_on_final_business_day() {
    // March 2024 ends on Friday the 29th
    let mtd = ReturnMatrix::from_rows(
        vec!["A".to_string(), "B".to_string()],
        vec![
            (date(2024, 3, 27), vec![Some(0.010), Some(0.004)]),
            (date(2024, 3, 28), vec![Some(0.015), Some(0.006)]),
            (date(2024, 3, 29), vec![Some(0.012), None]),
        ],
    )
    .unwrap();

    let conversion = convert_and_validate(&mtd, &ConversionConfig::default()).unwrap();
    assert_eq!(conversion.daily.get(date(2024, 3, 29), "B"), None);
    assert_abs_diff_eq!(
        conversion.validation.reconstructed.values()[[0, 1]].unwrap(),
        0.006,
        epsilon = 1e-12
    );
}

#[test]
fn test_security_absent_for_whole_month() {
    let mtd = ReturnMatrix::from_rows(
        vec!["A".to_string(), "B".to_string()],
        vec![
            (date(2024, 1, 31), vec![Some(0.010), Some(0.020)]),
            (date(2024, 2, 1), vec![Some(0.003), None]),
            (date(2024, 2, 29), vec![Some(0.007), None]),
            (date(2024, 3, 1), vec![Some(0.001), Some(0.002)]),
        ],
    )
    .unwrap();

    let conversion = convert_and_validate(&mtd, &ConversionConfig::default()).unwrap();
    // February for B compares as zero on both sides
    assert_eq!(conversion.validation.original.values()[[1, 1]], None);
    assert_eq!(conversion.validation.reconstructed.values()[[1, 1]], None);
}

#[test]
fn test_gap_month_between_observations() {
    let mtd = ReturnMatrix::from_rows(
        vec!["A".to_string()],
        vec![
            (date(2024, 1, 31), vec![Some(0.010)]),
            (date(2024, 3, 1), vec![Some(0.002)]),
        ],
    )
    .unwrap();
    let conversion = convert_and_validate(&mtd, &ConversionConfig::default()).unwrap();
    assert_eq!(conversion.validation.months(), 3);
    assert_eq!(conversion.daily.n_dates(), 2);
}

#[test]
fn test_mid_month_corruption_is_detected() {
    let generated = generate(21, &["A"], date(2024, 2, 1), date(2024, 2, 29));
    let mut rows: Vec<(NaiveDate, Vec<Option<f64>>)> = generated
        .mtd
        .dates()
        .iter()
        .enumerate()
        .map(|(i, d)| (*d, vec![generated.mtd.values()[[i, 0]]]))
        .collect();
    // A cumulative return below -100% has no log
    rows[5].1[0] = Some(-1.25);
    let corrupted = ReturnMatrix::from_rows(vec!["A".to_string()], rows).unwrap();

    let err = daily_log_returns(&corrupted, &ConversionConfig::default()).unwrap_err();
    let ReturnsError::ValidationMismatch(failure) = err else {
        panic!("expected a validation mismatch");
    };
    assert_eq!(failure.mismatches.len(), 1);
    assert_eq!(failure.mismatches[0].month_end, date(2024, 2, 29));
}
