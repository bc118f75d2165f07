//! Rolling performance statistics over a portfolio-value series
//!
//! Rolling Sharpe and volatility over trailing windows of daily percent
//! changes, drawdowns from the compounded wealth index, and three summary
//! scalars. Degenerate windows are not special-cased: a zero-variance window
//! gives an infinite (or NaN) Sharpe, exactly as the floating-point division does.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::common::{cum_max, cum_prod, mean, nanmean, nanstd, pct_change, rolling_complete, sample_std};
use crate::error::{AnalyticsError, Result};

/// Annualization basis for daily returns
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Portfolio value per date, as produced by a backtest run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioValueSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl PortfolioValueSeries {
    /// Dates must be strictly increasing and values non-negative
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(AnalyticsError::InvalidSeries(format!(
                "{} dates but {} values",
                dates.len(),
                values.len()
            )));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AnalyticsError::InvalidSeries(
                "dates must be strictly increasing".into(),
            ));
        }
        if let Some(v) = values.iter().find(|v| **v < 0.0) {
            return Err(AnalyticsError::InvalidSeries(format!(
                "portfolio value {} is negative",
                v
            )));
        }
        Ok(PortfolioValueSeries { dates, values })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Sharpe ratio of one window of daily returns.
///
/// `mean / sample_std * sqrt(252)`. NaN/inf pass straight through.
pub fn rolling_sharpe(returns: &[f64]) -> f64 {
    mean(returns) / sample_std(returns) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Returns, wealth index, running peaks and drawdowns, all aligned to the input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawdowns {
    pub returns: Vec<f64>,
    pub wealth_index: Vec<f64>,
    pub peaks: Vec<f64>,
    pub drawdowns: Vec<f64>,
}

/// Drawdown series of a value series.
///
/// Entry 0 of every output is NaN: there is no prior value to compute a
/// return from. Drawdowns are <= 0 and exactly 0 at each new peak.
pub fn compute_drawdowns(values: &[f64]) -> Drawdowns {
    let returns = pct_change(values, 1);
    let growth: Vec<f64> = returns.iter().map(|r| 1.0 + r).collect();
    let wealth_index = cum_prod(&growth);
    let peaks = cum_max(&wealth_index);
    let drawdowns = wealth_index
        .iter()
        .zip(&peaks)
        .map(|(w, p)| (w - p) / p)
        .collect();

    Drawdowns {
        returns,
        wealth_index,
        peaks,
        drawdowns,
    }
}

/// Rolling Sharpe over trailing windows of the value series' percent changes
pub fn rolling_sharpe_series(values: &[f64], window: usize) -> Vec<f64> {
    rolling_complete(&pct_change(values, 1), window, rolling_sharpe)
}

/// Rolling sample standard deviation of the value series' percent changes
pub fn rolling_volatility(values: &[f64], window: usize) -> Vec<f64> {
    rolling_complete(&pct_change(values, 1), window, sample_std)
}

/// A portfolio series with its derived rolling columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingStatsResult {
    pub window: usize,
    pub dates: Vec<NaiveDate>,
    pub portfolio_value: Vec<f64>,
    pub rolling_sharpe: Vec<f64>,
    pub rolling_vol: Vec<f64>,
    pub drawdown: Vec<f64>,
    pub wealth_index: Vec<f64>,
    pub peaks: Vec<f64>,
}

impl RollingStatsResult {
    pub fn len(&self) -> usize {
        self.portfolio_value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.portfolio_value.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryStats {
    /// `ln(mean(rolling_sharpe)) / std(rolling_sharpe)`; NaN or -inf whenever
    /// the mean rolling Sharpe is not positive
    pub sharpe_stability: f64,
    pub mean_portfolio_value: f64,
    pub mean_rolling_vol: f64,
}

impl SummaryStats {
    pub fn from_result(result: &RollingStatsResult) -> SummaryStats {
        SummaryStats {
            sharpe_stability: nanmean(&result.rolling_sharpe).ln() / nanstd(&result.rolling_sharpe),
            mean_portfolio_value: nanmean(&result.portfolio_value),
            mean_rolling_vol: nanmean(&result.rolling_vol),
        }
    }
}

/// Rolling Sharpe, rolling volatility and drawdowns for a portfolio series.
///
/// The first `window` entries of the rolling columns are NaN. Drawdowns use
/// the full series, not the window.
pub fn get_rolling_stats(
    series: &PortfolioValueSeries,
    window: usize,
) -> Result<(RollingStatsResult, SummaryStats)> {
    if window == 0 {
        return Err(AnalyticsError::InvalidWindow(window));
    }

    let values = series.values();
    let dd = compute_drawdowns(values);

    let result = RollingStatsResult {
        window,
        dates: series.dates().to_vec(),
        portfolio_value: values.to_vec(),
        rolling_sharpe: rolling_sharpe_series(values, window),
        rolling_vol: rolling_volatility(values, window),
        drawdown: dd.drawdowns,
        wealth_index: dd.wealth_index,
        peaks: dd.peaks,
    };
    let summary = SummaryStats::from_result(&result);
    Ok((result, summary))
}
