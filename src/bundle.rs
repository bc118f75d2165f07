//! Pre-ingested market-data bundle
//!
//! A bundle is a directory of `<SYMBOL>.parquet` daily bar files plus an
//! optional `adjustments.json`. Loading it yields three read-only readers:
//! the asset finder (symbol -> sid), the daily bar reader and the
//! adjustment reader. History windows are served from those readers.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::array::{
    Array, ArrayRef, Date32Array, Float32Array, Float64Array, Int64Array, LargeStringArray,
    StringArray, TimestampMicrosecondArray, TimestampMillisecondArray,
    TimestampNanosecondArray, TimestampSecondArray,
};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::calendar::TradingCalendar;
use crate::error::{AnalyticsError, Result};
use crate::table::{Field, PriceTable};

pub const ADJUSTMENTS_FILE: &str = "adjustments.json";

/// Days between 0001-01-01 (CE day 1) and 1970-01-01
const UNIX_EPOCH_CE_DAYS: i32 = 719_163;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Asset {
    pub sid: u32,
    pub symbol: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl DailyBar {
    pub fn value(&self, field: Field) -> f64 {
        match field {
            Field::Open => self.open,
            Field::High => self.high,
            Field::Low => self.low,
            Field::Close => self.close,
            Field::Volume => self.volume,
        }
    }
}

/// Split or dividend multiplier.
///
/// Prices dated before `effective_date` are multiplied by `ratio` and volumes
/// divided by it, when the window being read ends on or after that date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub symbol: String,
    pub effective_date: NaiveDate,
    pub ratio: f64,
}

// ============================================================================
// Readers
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct AssetFinder {
    assets: Vec<Asset>,
    by_symbol: HashMap<String, u32>,
}

impl AssetFinder {
    /// Sids follow sorted symbol order
    fn from_symbols<'a, I: IntoIterator<Item = &'a String>>(symbols: I) -> Self {
        let mut sorted: Vec<&String> = symbols.into_iter().collect();
        sorted.sort();
        sorted.dedup();

        let assets: Vec<Asset> = sorted
            .into_iter()
            .enumerate()
            .map(|(i, s)| Asset { sid: i as u32, symbol: s.clone() })
            .collect();
        let by_symbol = assets.iter().map(|a| (a.symbol.clone(), a.sid)).collect();
        AssetFinder { assets, by_symbol }
    }

    pub fn sids(&self) -> Vec<u32> {
        self.assets.iter().map(|a| a.sid).collect()
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn lookup_symbol(&self, symbol: &str) -> Option<&Asset> {
        self.by_symbol.get(symbol).map(|&sid| &self.assets[sid as usize])
    }
}

#[derive(Debug, Clone, Default)]
pub struct DailyBarReader {
    bars: HashMap<u32, BTreeMap<NaiveDate, DailyBar>>,
    first_trading_day: Option<NaiveDate>,
    last_session: Option<NaiveDate>,
}

impl DailyBarReader {
    pub fn first_trading_day(&self) -> Option<NaiveDate> {
        self.first_trading_day
    }

    pub fn last_session(&self) -> Option<NaiveDate> {
        self.last_session
    }

    pub fn bar(&self, sid: u32, date: NaiveDate) -> Option<&DailyBar> {
        self.bars.get(&sid).and_then(|b| b.get(&date))
    }

    /// Most recent bar dated on or before `date`
    pub fn last_bar_on_or_before(&self, sid: u32, date: NaiveDate) -> Option<&DailyBar> {
        self.bars
            .get(&sid)
            .and_then(|b| b.range(..=date).next_back())
            .map(|(_, bar)| bar)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdjustmentReader {
    by_sid: HashMap<u32, Vec<Adjustment>>,
}

impl AdjustmentReader {
    /// Combined multiplier for a bar dated `bar_date` seen from a window ending `as_of`
    pub fn price_ratio(&self, sid: u32, bar_date: NaiveDate, as_of: NaiveDate) -> f64 {
        self.by_sid.get(&sid).map_or(1.0, |adjs| {
            adjs.iter()
                .filter(|a| bar_date < a.effective_date && a.effective_date <= as_of)
                .map(|a| a.ratio)
                .product()
        })
    }

    pub fn len(&self) -> usize {
        self.by_sid.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Bundle
// ============================================================================

#[derive(Debug, Clone)]
pub struct Bundle {
    name: String,
    asset_finder: AssetFinder,
    daily_bar_reader: DailyBarReader,
    adjustment_reader: AdjustmentReader,
}

impl Bundle {
    /// Build a bundle from bars already in memory
    pub fn from_bars(
        name: &str,
        bars: BTreeMap<String, Vec<DailyBar>>,
        adjustments: Vec<Adjustment>,
    ) -> Bundle {
        let asset_finder = AssetFinder::from_symbols(bars.keys());

        let mut reader = DailyBarReader::default();
        for (symbol, symbol_bars) in bars {
            let Some(asset) = asset_finder.lookup_symbol(&symbol) else {
                continue;
            };
            let by_date: BTreeMap<NaiveDate, DailyBar> =
                symbol_bars.into_iter().map(|b| (b.date, b)).collect();

            if let (Some(first), Some(last)) = (by_date.keys().next(), by_date.keys().next_back()) {
                reader.first_trading_day = Some(reader.first_trading_day.map_or(*first, |d| d.min(*first)));
                reader.last_session = Some(reader.last_session.map_or(*last, |d| d.max(*last)));
            }
            reader.bars.insert(asset.sid, by_date);
        }

        let mut adjustment_reader = AdjustmentReader::default();
        for adj in adjustments {
            match asset_finder.lookup_symbol(&adj.symbol) {
                Some(asset) => adjustment_reader.by_sid.entry(asset.sid).or_default().push(adj),
                None => warn!(bundle = name, symbol = %adj.symbol, "adjustment for unknown symbol skipped"),
            }
        }

        Bundle {
            name: name.to_string(),
            asset_finder,
            daily_bar_reader: reader,
            adjustment_reader,
        }
    }

    /// Load a bundle directory of per-symbol parquet files
    pub fn load(dir: &Path, name: &str) -> Result<Bundle> {
        let mut bars = BTreeMap::new();
        let mut adjustments = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }

            if path.file_name().is_some_and(|f| f == ADJUSTMENTS_FILE) {
                adjustments = read_adjustments(&path)?;
                continue;
            }

            if path.extension().map_or(true, |ext| ext != "parquet") {
                warn!(path = %path.display(), "skipping non-parquet file in bundle");
                continue;
            }

            let Some(symbol) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
                continue;
            };
            let symbol_bars = read_bar_file(&path)?;
            debug!(%symbol, bars = symbol_bars.len(), "read bar file");
            bars.insert(symbol, symbol_bars);
        }

        let bundle = Bundle::from_bars(name, bars, adjustments);
        info!(
            bundle = name,
            assets = bundle.asset_finder.assets.len(),
            adjustments = bundle.adjustment_reader.len(),
            first = ?bundle.daily_bar_reader.first_trading_day,
            last = ?bundle.daily_bar_reader.last_session,
            "loaded bundle"
        );
        Ok(bundle)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn asset_finder(&self) -> &AssetFinder {
        &self.asset_finder
    }

    pub fn daily_bar_reader(&self) -> &DailyBarReader {
        &self.daily_bar_reader
    }

    pub fn adjustment_reader(&self) -> &AdjustmentReader {
        &self.adjustment_reader
    }

    /// Resolve symbols to assets, failing on the first one the bundle lacks
    pub fn lookup_symbols<S: AsRef<str>>(&self, symbols: &[S]) -> Result<Vec<Asset>> {
        symbols
            .iter()
            .map(|s| {
                self.asset_finder
                    .lookup_symbol(s.as_ref())
                    .cloned()
                    .ok_or_else(|| AnalyticsError::SymbolNotFound {
                        symbol: s.as_ref().to_string(),
                        bundle: self.name.clone(),
                    })
            })
            .collect()
    }

    /// The `bar_count` daily values of `field` ending at `end`, one column per asset.
    ///
    /// Missing bars read as NaN (volume as 0). Close is forward-filled from the
    /// latest earlier bar. Adjustments effective inside the window are applied.
    pub fn history_window(
        &self,
        assets: &[Asset],
        field: Field,
        end: NaiveDate,
        bar_count: usize,
        calendar: &dyn TradingCalendar,
    ) -> Result<PriceTable> {
        debug!(bundle = %self.name, %field, %end, bar_count, "history window");

        let reader = &self.daily_bar_reader;
        let (Some(first), Some(last)) = (reader.first_trading_day, reader.last_session) else {
            return Err(AnalyticsError::InvalidSeries(format!(
                "bundle '{}' holds no bars",
                self.name
            )));
        };
        let out_of_range = AnalyticsError::HistoryOutOfRange { end, bar_count, first, last };
        if end > last {
            return Err(out_of_range);
        }

        // The walk never passes the first trading day, so a short result means
        // the window reaches back before the bundle's data.
        let sessions = calendar.sessions_window(end, bar_count, first)?;
        if sessions.len() < bar_count {
            return Err(out_of_range);
        }

        let columns = assets
            .iter()
            .map(|asset| {
                sessions
                    .iter()
                    .map(|&session| self.read_value(asset.sid, field, session, end))
                    .collect()
            })
            .collect();
        let symbols = assets.iter().map(|a| a.symbol.clone()).collect();

        PriceTable::new(sessions, symbols, columns)
    }

    fn read_value(&self, sid: u32, field: Field, session: NaiveDate, as_of: NaiveDate) -> f64 {
        let reader = &self.daily_bar_reader;
        let bar = match field {
            Field::Close => reader.last_bar_on_or_before(sid, session),
            _ => reader.bar(sid, session),
        };

        match bar {
            Some(bar) => {
                let ratio = if self.adjustment_reader.is_empty() {
                    1.0
                } else {
                    self.adjustment_reader.price_ratio(sid, bar.date, as_of)
                };
                if field.is_price() {
                    bar.value(field) * ratio
                } else {
                    bar.value(field) / ratio
                }
            }
            None if field == Field::Volume => 0.0,
            None => f64::NAN,
        }
    }
}

/// Symbols available in a data directory: every file name minus its extension.
///
/// Order follows the directory listing and is not sorted.
pub fn list_available_symbols(dir: &Path) -> Result<Vec<String>> {
    let mut symbols = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            symbols.push(stem.to_string());
        }
    }
    Ok(symbols)
}

// ============================================================================
// Parquet Reading
// ============================================================================

fn malformed(path: &Path, reason: impl Into<String>) -> AnalyticsError {
    AnalyticsError::MalformedBundle {
        path: PathBuf::from(path),
        reason: reason.into(),
    }
}

fn read_adjustments(path: &Path) -> Result<Vec<Adjustment>> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

/// Read one symbol's bars. Expects Date, Open, High, Low, Close, Volume columns.
fn read_bar_file(path: &Path) -> Result<Vec<DailyBar>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut bars = Vec::new();
    for batch in reader {
        let batch = batch?;
        let dates = date_column(&batch, path)?;
        let opens = f64_column(&batch, "Open", path)?;
        let highs = f64_column(&batch, "High", path)?;
        let lows = f64_column(&batch, "Low", path)?;
        let closes = f64_column(&batch, "Close", path)?;
        let volumes = f64_column(&batch, "Volume", path)?;

        for i in 0..batch.num_rows() {
            bars.push(DailyBar {
                date: dates[i],
                open: opens[i],
                high: highs[i],
                low: lows[i],
                close: closes[i],
                volume: if volumes[i].is_nan() { 0.0 } else { volumes[i] },
            });
        }
    }

    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

fn column<'a>(batch: &'a RecordBatch, name: &str, path: &Path) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| malformed(path, format!("missing column {}", name)))
}

fn f64_column(batch: &RecordBatch, name: &str, path: &Path) -> Result<Vec<f64>> {
    let col = column(batch, name, path)?;
    let any = col.as_any();

    if let Some(arr) = any.downcast_ref::<Float64Array>() {
        return Ok((0..arr.len())
            .map(|i| if arr.is_null(i) { f64::NAN } else { arr.value(i) })
            .collect());
    }
    if let Some(arr) = any.downcast_ref::<Float32Array>() {
        return Ok((0..arr.len())
            .map(|i| if arr.is_null(i) { f64::NAN } else { arr.value(i) as f64 })
            .collect());
    }
    if let Some(arr) = any.downcast_ref::<Int64Array>() {
        return Ok((0..arr.len())
            .map(|i| if arr.is_null(i) { f64::NAN } else { arr.value(i) as f64 })
            .collect());
    }

    Err(malformed(
        path,
        format!("column {} has unsupported type {}", name, col.data_type()),
    ))
}

fn parse_date_str(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()
}

fn date_from_secs(secs: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.date_naive())
}

fn date_column(batch: &RecordBatch, path: &Path) -> Result<Vec<NaiveDate>> {
    let col = column(batch, "Date", path)?;
    let any = col.as_any();
    let n = col.len();

    let dates: Vec<Option<NaiveDate>> = if let Some(arr) = any.downcast_ref::<StringArray>() {
        (0..n).map(|i| (!arr.is_null(i)).then(|| parse_date_str(arr.value(i))).flatten()).collect()
    } else if let Some(arr) = any.downcast_ref::<LargeStringArray>() {
        (0..n).map(|i| (!arr.is_null(i)).then(|| parse_date_str(arr.value(i))).flatten()).collect()
    } else if let Some(arr) = any.downcast_ref::<Date32Array>() {
        (0..n)
            .map(|i| {
                (!arr.is_null(i))
                    .then(|| NaiveDate::from_num_days_from_ce_opt(arr.value(i) + UNIX_EPOCH_CE_DAYS))
                    .flatten()
            })
            .collect()
    } else if let Some(arr) = any.downcast_ref::<TimestampNanosecondArray>() {
        (0..n)
            .map(|i| (!arr.is_null(i)).then(|| date_from_secs(arr.value(i).div_euclid(1_000_000_000))).flatten())
            .collect()
    } else if let Some(arr) = any.downcast_ref::<TimestampMicrosecondArray>() {
        (0..n)
            .map(|i| (!arr.is_null(i)).then(|| date_from_secs(arr.value(i).div_euclid(1_000_000))).flatten())
            .collect()
    } else if let Some(arr) = any.downcast_ref::<TimestampMillisecondArray>() {
        (0..n)
            .map(|i| (!arr.is_null(i)).then(|| date_from_secs(arr.value(i).div_euclid(1_000))).flatten())
            .collect()
    } else if let Some(arr) = any.downcast_ref::<TimestampSecondArray>() {
        (0..n)
            .map(|i| (!arr.is_null(i)).then(|| date_from_secs(arr.value(i))).flatten())
            .collect()
    } else {
        return Err(malformed(
            path,
            format!("Date column has unsupported type {}", col.data_type()),
        ));
    };

    dates
        .into_iter()
        .enumerate()
        .map(|(i, d)| d.ok_or_else(|| malformed(path, format!("unreadable date in row {}", i))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{AlwaysOpen, WeekdayCalendar};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 4, day).unwrap()
    }

    fn bar(day: u32, close: f64) -> DailyBar {
        DailyBar {
            date: d(day),
            open: close - 1.0,
            high: close + 2.0,
            low: close - 2.0,
            close,
            volume: 100.0,
        }
    }

    fn sample_bundle(adjustments: Vec<Adjustment>) -> Bundle {
        let mut bars = BTreeMap::new();
        bars.insert("ETH".to_string(), (1..=10).map(|i| bar(i, 10.0 + i as f64)).collect());
        // BTC is missing the 5th
        bars.insert(
            "BTC".to_string(),
            (1..=10).filter(|&i| i != 5).map(|i| bar(i, 100.0 + i as f64)).collect(),
        );
        Bundle::from_bars("test", bars, adjustments)
    }

    #[test]
    fn test_sids_follow_sorted_symbols() {
        let bundle = sample_bundle(vec![]);
        assert_eq!(bundle.asset_finder().lookup_symbol("BTC").unwrap().sid, 0);
        assert_eq!(bundle.asset_finder().lookup_symbol("ETH").unwrap().sid, 1);
        assert_eq!(bundle.asset_finder().sids(), vec![0, 1]);
        assert_eq!(bundle.daily_bar_reader().first_trading_day(), Some(d(1)));
        assert_eq!(bundle.daily_bar_reader().last_session(), Some(d(10)));
    }

    #[test]
    fn test_lookup_symbols_reports_missing() {
        let bundle = sample_bundle(vec![]);
        let err = bundle.lookup_symbols(&["BTC", "DOGE"]).unwrap_err();
        match err {
            AnalyticsError::SymbolNotFound { symbol, bundle } => {
                assert_eq!(symbol, "DOGE");
                assert_eq!(bundle, "test");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_history_window_shape_and_labels() {
        let bundle = sample_bundle(vec![]);
        let assets = bundle.lookup_symbols(&["ETH", "BTC"]).unwrap();
        let window = bundle
            .history_window(&assets, Field::Close, d(8), 3, &AlwaysOpen)
            .unwrap();
        assert_eq!(window.index(), &[d(6), d(7), d(8)]);
        assert_eq!(window.symbols(), &["ETH".to_string(), "BTC".to_string()]);
        assert_eq!(window.column("ETH").unwrap(), &[16.0, 17.0, 18.0]);
    }

    #[test]
    fn test_missing_bar_fill_rules() {
        let bundle = sample_bundle(vec![]);
        let assets = bundle.lookup_symbols(&["BTC"]).unwrap();
        let close = bundle.history_window(&assets, Field::Close, d(5), 2, &AlwaysOpen).unwrap();
        let open = bundle.history_window(&assets, Field::Open, d(5), 2, &AlwaysOpen).unwrap();
        let volume = bundle.history_window(&assets, Field::Volume, d(5), 2, &AlwaysOpen).unwrap();

        // close carries the 4th forward
        assert_eq!(close.column("BTC").unwrap(), &[104.0, 104.0]);
        assert!(open.column("BTC").unwrap()[1].is_nan());
        assert_eq!(volume.column("BTC").unwrap()[1], 0.0);
    }

    #[test]
    fn test_history_window_out_of_range() {
        let bundle = sample_bundle(vec![]);
        let assets = bundle.lookup_symbols(&["ETH"]).unwrap();
        let before = bundle.history_window(&assets, Field::Close, d(3), 5, &AlwaysOpen);
        assert!(matches!(before, Err(AnalyticsError::HistoryOutOfRange { .. })));
        let after = bundle.history_window(&assets, Field::Close, d(12), 2, &AlwaysOpen);
        assert!(matches!(after, Err(AnalyticsError::HistoryOutOfRange { .. })));
    }

    #[test]
    fn test_oversized_window_is_out_of_range_not_an_allocation() {
        let bundle = sample_bundle(vec![]);
        let assets = bundle.lookup_symbols(&["ETH"]).unwrap();
        let result = bundle.history_window(&assets, Field::Close, d(9), usize::MAX, &AlwaysOpen);
        match result {
            Err(AnalyticsError::HistoryOutOfRange { end, bar_count, first, last }) => {
                assert_eq!(end, d(9));
                assert_eq!(bar_count, usize::MAX);
                assert_eq!((first, last), (d(1), d(10)));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_history_window_end_must_be_session() {
        let bundle = sample_bundle(vec![]);
        let assets = bundle.lookup_symbols(&["ETH"]).unwrap();
        // 2022-04-09 is a Saturday
        let result = bundle.history_window(&assets, Field::Close, d(9), 2, &WeekdayCalendar::new());
        assert!(matches!(result, Err(AnalyticsError::NotASession(_))));
    }

    #[test]
    fn test_adjustments_apply_before_effective_date() {
        let split = Adjustment {
            symbol: "ETH".into(),
            effective_date: d(6),
            ratio: 0.5,
        };
        let bundle = sample_bundle(vec![split]);
        assert!(!bundle.adjustment_reader().is_empty());
        assert!(sample_bundle(vec![]).adjustment_reader().is_empty());
        let assets = bundle.lookup_symbols(&["ETH"]).unwrap();

        let close = bundle.history_window(&assets, Field::Close, d(7), 3, &AlwaysOpen).unwrap();
        assert_eq!(close.column("ETH").unwrap(), &[7.5, 16.0, 17.0]);

        let volume = bundle.history_window(&assets, Field::Volume, d(7), 3, &AlwaysOpen).unwrap();
        assert_eq!(volume.column("ETH").unwrap(), &[200.0, 100.0, 100.0]);

        // window ending before the split sees raw prices
        let raw = bundle.history_window(&assets, Field::Close, d(5), 2, &AlwaysOpen).unwrap();
        assert_eq!(raw.column("ETH").unwrap(), &[14.0, 15.0]);
    }

    #[test]
    fn test_parse_date_str_accepts_timestamps() {
        assert_eq!(parse_date_str("2022-04-05"), Some(d(5)));
        assert_eq!(parse_date_str("2022-04-05 00:00:00+00:00"), Some(d(5)));
        assert_eq!(parse_date_str("04/05/2022"), None);
    }
}
