//! Property tests for the rolling statistics
//!
//! Run with: cargo test --test rolling_properties

use approx::assert_relative_eq;
use backtest_analytics::common::{pct_change, sample_std};
use backtest_analytics::{compute_drawdowns, get_rolling_stats, PortfolioValueSeries};
use chrono::NaiveDate;
use proptest::prelude::*;

fn series(values: &[f64]) -> PortfolioValueSeries {
    let start = NaiveDate::from_ymd_opt(2022, 4, 5).unwrap();
    let dates = start.iter_days().take(values.len()).collect();
    PortfolioValueSeries::new(dates, values.to_vec()).unwrap()
}

fn portfolio_values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0f64..1_000.0, 2..120)
}

proptest! {
    #[test]
    fn drawdowns_never_positive(values in portfolio_values()) {
        let dd = compute_drawdowns(&values);
        prop_assert!(dd.drawdowns[0].is_nan());
        for d in &dd.drawdowns[1..] {
            prop_assert!(*d <= 0.0, "drawdown {} > 0", d);
        }
    }

    #[test]
    fn drawdown_is_zero_at_each_new_peak(values in portfolio_values()) {
        let dd = compute_drawdowns(&values);
        prop_assert_eq!(dd.drawdowns[1], 0.0);
        for i in 2..values.len() {
            if dd.wealth_index[i] >= dd.peaks[i - 1] {
                prop_assert_eq!(dd.drawdowns[i], 0.0, "new peak at {}", i);
            }
        }
    }

    #[test]
    fn rolling_entries_defined_when_window_varies(values in portfolio_values(), window in 2usize..30) {
        let (result, _) = get_rolling_stats(&series(&values), window).unwrap();
        let returns = pct_change(&values, 1);

        for i in window..values.len() {
            if sample_std(&returns[i + 1 - window..=i]) > 0.0 {
                prop_assert!(result.rolling_sharpe[i].is_finite(), "sharpe at {}", i);
                prop_assert!(result.rolling_vol[i].is_finite(), "vol at {}", i);
            }
        }
    }

    #[test]
    fn wealth_index_tracks_value_ratio(values in portfolio_values()) {
        let dd = compute_drawdowns(&values);
        for i in 1..values.len() {
            assert_relative_eq!(dd.wealth_index[i], values[i] / values[0], max_relative = 1e-9);
        }
    }

    #[test]
    fn peaks_are_running_maximum(values in portfolio_values()) {
        let dd = compute_drawdowns(&values);
        for i in 2..values.len() {
            prop_assert!(dd.peaks[i] >= dd.peaks[i - 1]);
            prop_assert!(dd.peaks[i] >= dd.wealth_index[i]);
        }
    }

    #[test]
    fn rolling_columns_align_with_input(values in portfolio_values(), window in 1usize..30) {
        let (result, _) = get_rolling_stats(&series(&values), window).unwrap();

        prop_assert_eq!(result.rolling_sharpe.len(), values.len());
        prop_assert_eq!(result.rolling_vol.len(), values.len());
        prop_assert_eq!(result.drawdown.len(), values.len());

        for i in 0..window.min(values.len()) {
            prop_assert!(result.rolling_sharpe[i].is_nan());
            prop_assert!(result.rolling_vol[i].is_nan());
        }
        for v in result.rolling_vol.iter().filter(|v| !v.is_nan()) {
            prop_assert!(*v >= 0.0);
        }
    }

    #[test]
    fn mean_portfolio_value_is_plain_mean(values in portfolio_values()) {
        let (_, summary) = get_rolling_stats(&series(&values), 3).unwrap();
        let expected = values.iter().sum::<f64>() / values.len() as f64;
        assert_relative_eq!(summary.mean_portfolio_value, expected, max_relative = 1e-12);
    }
}

#[test]
fn reference_example() {
    let (result, summary) = get_rolling_stats(&series(&[100.0, 110.0, 99.0, 121.0]), 2).unwrap();

    assert_relative_eq!(result.wealth_index[1], 1.10, epsilon = 1e-12);
    assert_relative_eq!(result.wealth_index[2], 0.99, epsilon = 1e-12);
    assert_relative_eq!(result.wealth_index[3], 1.21, epsilon = 1e-12);
    assert_relative_eq!(result.drawdown[2], -0.1, epsilon = 1e-12);
    assert_eq!(result.drawdown[3], 0.0);
    assert_relative_eq!(summary.mean_portfolio_value, 107.5);
}

#[test]
fn window_longer_than_series_is_all_nan() {
    let (result, summary) = get_rolling_stats(&series(&[100.0, 101.0, 103.0]), 10).unwrap();
    assert!(result.rolling_sharpe.iter().all(|v| v.is_nan()));
    assert!(summary.sharpe_stability.is_nan());
    assert!(summary.mean_rolling_vol.is_nan());
}

#[test]
fn window_of_one_gives_nan_volatility() {
    // a single-sample std is undefined
    let (result, _) = get_rolling_stats(&series(&[100.0, 101.0, 103.0, 102.0]), 1).unwrap();
    assert!(result.rolling_vol.iter().all(|v| v.is_nan()));
}
