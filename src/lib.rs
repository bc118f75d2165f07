//! # Backtest Analytics
//!
//! Rolling performance statistics for backtest portfolio series and a
//! price-data accessor over pre-ingested daily bar bundles.
//!
//! ## Features
//! - Rolling Sharpe, rolling volatility, drawdowns and summary scalars
//! - OHLCV windows, average price and cached percent returns per coin
//! - Polars interop and a three-panel SVG report
//! - Compiles to native and WASM (statistics only)
//!
//! ## Example
//! ```
//! use backtest_analytics::{compute_drawdowns, rolling_sharpe};
//!
//! let dd = compute_drawdowns(&[100.0, 110.0, 99.0, 121.0]);
//! assert!((dd.drawdowns[2] + 0.1).abs() < 1e-12);
//!
//! let sharpe = rolling_sharpe(&[0.0, 0.01, 0.02]);
//! assert!((sharpe - 252.0_f64.sqrt()).abs() < 1e-9);
//! ```

pub mod common;
pub mod error;
pub mod config;
pub mod init;
pub mod calendar;
pub mod table;
pub mod bundle;
pub mod accessor;
pub mod performance;
pub mod frame;
pub mod report;

// Re-export commonly used items at crate root
pub use error::{AnalyticsError, Result};
pub use config::AnalyticsConfig;
pub use init::{initialize, Environment};
pub use calendar::{calendar_by_name, AlwaysOpen, TradingCalendar, WeekdayCalendar};
pub use table::{Field, OhlcvTable, PriceTable};
pub use bundle::{list_available_symbols, Adjustment, Asset, Bundle, DailyBar};
pub use accessor::{CachePolicy, PriceDataAccessor};
pub use performance::{
    compute_drawdowns, get_rolling_stats, rolling_sharpe, rolling_sharpe_series, rolling_volatility,
    Drawdowns, PortfolioValueSeries, RollingStatsResult, SummaryStats, TRADING_DAYS_PER_YEAR,
};
pub use frame::rolling_stats_frame;
pub use report::{render_rolling_stats, RenderedStats};

#[cfg(feature = "wasm")]
use wasm_bindgen::prelude::*;

/// WASM bindings for browser/Node.js use
#[cfg(feature = "wasm")]
#[wasm_bindgen]
pub struct Analytics;

#[cfg(feature = "wasm")]
#[wasm_bindgen]
impl Analytics {
    /// Rolling Sharpe of a portfolio-value series
    #[wasm_bindgen]
    pub fn rolling_sharpe(values: &[f64], window: usize) -> Vec<f64> {
        performance::rolling_sharpe_series(values, window)
    }

    #[wasm_bindgen]
    pub fn rolling_volatility(values: &[f64], window: usize) -> Vec<f64> {
        performance::rolling_volatility(values, window)
    }

    /// Drawdown from the running peak of the wealth index (<= 0)
    #[wasm_bindgen]
    pub fn drawdowns(values: &[f64]) -> Vec<f64> {
        performance::compute_drawdowns(values).drawdowns
    }
}
