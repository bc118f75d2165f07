//! Tabular value types returned by the price accessor
//!
//! A [`PriceTable`] is a date index, an ordered list of symbols and one column
//! of values per symbol. An [`OhlcvTable`] stacks one `PriceTable` per field.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::common::{pct_change, row_nanmean};
use crate::error::{AnalyticsError, Result};

/// Daily bar field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Field {
    pub const PRICES: [Field; 4] = [Field::Open, Field::High, Field::Low, Field::Close];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Open => "open",
            Field::High => "high",
            Field::Low => "low",
            Field::Close => "close",
            Field::Volume => "volume",
        }
    }

    pub fn is_price(&self) -> bool {
        !matches!(self, Field::Volume)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Field::Open),
            "high" => Ok(Field::High),
            "low" => Ok(Field::Low),
            "close" => Ok(Field::Close),
            "volume" => Ok(Field::Volume),
            other => Err(format!("unknown field: {}", other)),
        }
    }
}

/// Date-indexed table with one column per symbol
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceTable {
    index: Vec<NaiveDate>,
    symbols: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl PriceTable {
    pub fn new(index: Vec<NaiveDate>, symbols: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if symbols.len() != columns.len() {
            return Err(AnalyticsError::InvalidSeries(format!(
                "{} symbols but {} columns",
                symbols.len(),
                columns.len()
            )));
        }
        if let Some(col) = columns.iter().find(|c| c.len() != index.len()) {
            return Err(AnalyticsError::InvalidSeries(format!(
                "column of length {} does not match index of length {}",
                col.len(),
                index.len()
            )));
        }
        if index.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AnalyticsError::InvalidSeries(
                "index dates must be strictly increasing".into(),
            ));
        }
        Ok(PriceTable { index, symbols, columns })
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn column(&self, symbol: &str) -> Option<&[f64]> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|i| self.columns[i].as_slice())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.symbols
            .iter()
            .zip(&self.columns)
            .map(|(s, c)| (s.as_str(), c.as_slice()))
    }

    /// Value for a symbol on a date, if both exist
    pub fn get(&self, date: NaiveDate, symbol: &str) -> Option<f64> {
        let row = self.index.binary_search(&date).ok()?;
        self.column(symbol).map(|c| c[row])
    }

    /// Period-over-period percent change of every column
    pub fn pct_change(&self, periods: usize) -> PriceTable {
        PriceTable {
            index: self.index.clone(),
            symbols: self.symbols.clone(),
            columns: self.columns.iter().map(|c| pct_change(c, periods)).collect(),
        }
    }

    /// Drop the first `n` rows
    pub fn skip_rows(&self, n: usize) -> PriceTable {
        let n = n.min(self.index.len());
        PriceTable {
            index: self.index[n..].to_vec(),
            symbols: self.symbols.clone(),
            columns: self.columns.iter().map(|c| c[n..].to_vec()).collect(),
        }
    }

    /// True if any cell is NaN
    pub fn has_nan(&self) -> bool {
        self.columns.iter().flatten().any(|v| v.is_nan())
    }
}

/// Several fields over the same dates and symbols, keyed by `(field, symbol)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OhlcvTable {
    fields: Vec<(Field, PriceTable)>,
}

impl OhlcvTable {
    pub fn new(fields: Vec<(Field, PriceTable)>) -> Result<Self> {
        if let Some((_, first)) = fields.first() {
            let mismatched = fields
                .iter()
                .any(|(_, t)| t.index != first.index || t.symbols != first.symbols);
            if mismatched {
                return Err(AnalyticsError::InvalidSeries(
                    "field tables must share index and symbols".into(),
                ));
            }
        }
        Ok(OhlcvTable { fields })
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.fields.iter().map(|(f, _)| *f)
    }

    pub fn field(&self, field: Field) -> Option<&PriceTable> {
        self.fields.iter().find(|(f, _)| *f == field).map(|(_, t)| t)
    }

    pub fn get(&self, field: Field, symbol: &str) -> Option<&[f64]> {
        self.field(field).and_then(|t| t.column(symbol))
    }

    pub fn index(&self) -> &[NaiveDate] {
        match self.fields.first() {
            Some((_, t)) => t.index(),
            None => &[],
        }
    }

    pub fn symbols(&self) -> &[String] {
        match self.fields.first() {
            Some((_, t)) => t.symbols(),
            None => &[],
        }
    }

    pub fn tables(&self) -> impl Iterator<Item = (Field, &PriceTable)> {
        self.fields.iter().map(|(f, t)| (*f, t))
    }

    /// Per date and symbol, the mean across the held fields, skipping NaN
    pub fn mean_across_fields(&self) -> PriceTable {
        let columns = self
            .symbols()
            .iter()
            .map(|symbol| {
                let stacked: Vec<&[f64]> = self
                    .fields
                    .iter()
                    .filter_map(|(_, t)| t.column(symbol))
                    .collect();
                row_nanmean(&stacked)
            })
            .collect();

        PriceTable {
            index: self.index().to_vec(),
            symbols: self.symbols().to_vec(),
            columns,
        }
    }
}
