//! Polars interop
//!
//! Converts the crate's value types to DataFrames and offers the rolling
//! statistics as lazy column expressions over an existing frame.

use polars::prelude::*;

use crate::error::{AnalyticsError, Result};
use crate::performance::{RollingStatsResult, TRADING_DAYS_PER_YEAR};
use crate::table::{OhlcvTable, PriceTable};

fn date_column(dates: &[chrono::NaiveDate]) -> Column {
    let dates: Vec<String> = dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();
    Column::new("date".into(), dates)
}

/// `date` plus one column per symbol
pub fn price_table_frame(table: &PriceTable) -> Result<DataFrame> {
    let mut columns = vec![date_column(table.index())];
    for (symbol, values) in table.columns() {
        columns.push(Column::new(symbol.into(), values));
    }
    Ok(DataFrame::new(columns)?)
}

/// `date` plus one `{symbol}_{field}` column per field and symbol
pub fn ohlcv_frame(table: &OhlcvTable) -> Result<DataFrame> {
    let mut columns = vec![date_column(table.index())];
    for (field, prices) in table.tables() {
        for (symbol, values) in prices.columns() {
            columns.push(Column::new(format!("{}_{}", symbol, field).into(), values));
        }
    }
    Ok(DataFrame::new(columns)?)
}

/// Rolling result as a frame with one row per portfolio observation
pub fn rolling_result_frame(result: &RollingStatsResult) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        date_column(&result.dates),
        Column::new("portfolio_value".into(), &result.portfolio_value),
        Column::new("rolling_sharpe".into(), &result.rolling_sharpe),
        Column::new("rolling_vol".into(), &result.rolling_vol),
        Column::new("drawdown".into(), &result.drawdown),
    ])?)
}

/// Append `returns`, `rolling_sharpe`, `rolling_vol`, `wealth_index`, `peaks`
/// and `drawdown` columns computed from `value_column`.
pub fn rolling_stats_frame(df: DataFrame, value_column: &str, window: usize) -> Result<DataFrame> {
    if window == 0 {
        return Err(AnalyticsError::InvalidWindow(window));
    }

    let opts = || RollingOptionsFixedWindow {
        window_size: window,
        min_periods: window,
        ..Default::default()
    };
    let value = col(value_column).cast(DataType::Float64);
    let returns = value.clone() / value.shift(lit(1)) - lit(1.0);

    let out = df
        .lazy()
        .with_column(returns.alias("returns"))
        .with_columns([
            (col("returns").rolling_mean(opts()) / col("returns").rolling_std(opts())
                * lit(TRADING_DAYS_PER_YEAR.sqrt()))
            .alias("rolling_sharpe"),
            col("returns").rolling_std(opts()).alias("rolling_vol"),
            (lit(1.0) + col("returns")).cum_prod(false).alias("wealth_index"),
        ])
        .with_column(col("wealth_index").cum_max(false).alias("peaks"))
        .with_column(((col("wealth_index") - col("peaks")) / col("peaks")).alias("drawdown"))
        .collect()?;
    Ok(out)
}

/// A float column as a vector, nulls read as NaN
pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df.column(name)?.as_materialized_series();
    let values = series.f64()?;
    Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}
