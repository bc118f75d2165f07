//! Error type shared by the bundle, calendar and analytics modules

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Failures raised by the data side (bundle, calendar, configuration).
///
/// Arithmetic degeneracies in the statistics never show up here: a zero
/// variance window or the log of a non-positive mean come back as NaN/inf.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("symbol '{symbol}' not found in bundle '{bundle}'")]
    SymbolNotFound { symbol: String, bundle: String },

    #[error("bundle '{0}' is not registered")]
    UnknownBundle(String),

    #[error("{0} is not a trading session")]
    NotASession(NaiveDate),

    #[error(
        "history window of {bar_count} sessions ending {end} is outside the bundle's data ({first}..={last})"
    )]
    HistoryOutOfRange {
        end: NaiveDate,
        bar_count: usize,
        first: NaiveDate,
        last: NaiveDate,
    },

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("window size must be positive, got {0}")]
    InvalidWindow(usize),

    #[error("invalid series: {0}")]
    InvalidSeries(String),

    #[error("malformed bundle file {path}: {reason}")]
    MalformedBundle { path: PathBuf, reason: String },

    #[error("unknown calendar '{0}'")]
    UnknownCalendar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
