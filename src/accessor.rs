//! Price data accessor
//!
//! A query facade over a loaded [`Bundle`] and a trading calendar: OHLCV
//! windows, a daily average-price proxy and percent returns for a fixed set
//! of coins resolved once at construction.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bundle::{Asset, Bundle};
use crate::calendar::TradingCalendar;
use crate::error::{AnalyticsError, Result};
use crate::table::{Field, OhlcvTable, PriceTable};

/// How percent-return results are kept between calls.
///
/// `Keyed` stores one entry per `(start, end, periods)`. The bundle is
/// read-only so an entry never goes stale; `clear_cache` drops them all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    #[default]
    Keyed,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ReturnKey {
    start: NaiveDate,
    end: NaiveDate,
    periods: usize,
}

pub struct PriceDataAccessor {
    calendar: Arc<dyn TradingCalendar>,
    bundle: Arc<Bundle>,
    coins: Vec<String>,
    assets: Vec<Asset>,
    cache_policy: CachePolicy,
    return_cache: HashMap<ReturnKey, PriceTable>,
}

impl PriceDataAccessor {
    /// Bind to a bundle and resolve `coins`. Fails with `SymbolNotFound` if
    /// any coin is absent from the bundle.
    pub fn new<S: AsRef<str>>(
        calendar: Arc<dyn TradingCalendar>,
        coins: &[S],
        bundle: Arc<Bundle>,
    ) -> Result<Self> {
        let assets = bundle.lookup_symbols(coins)?;
        debug!(bundle = bundle.name(), calendar = calendar.name(), coins = assets.len(), "accessor ready");

        Ok(PriceDataAccessor {
            calendar,
            bundle,
            coins: coins.iter().map(|c| c.as_ref().to_string()).collect(),
            assets,
            cache_policy: CachePolicy::default(),
            return_cache: HashMap::new(),
        })
    }

    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self.return_cache.clear();
        self
    }

    pub fn coins(&self) -> &[String] {
        &self.coins
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    pub fn calendar(&self) -> &dyn TradingCalendar {
        self.calendar.as_ref()
    }

    fn session_count(&self, start: NaiveDate, end: NaiveDate) -> Result<usize> {
        bar_count_for(self.calendar.as_ref(), &self.bundle, start, end)
    }

    fn history(&self, field: Field, end: NaiveDate, bar_count: usize) -> Result<PriceTable> {
        self.bundle
            .history_window(&self.assets, field, end, bar_count, self.calendar.as_ref())
    }

    /// One history window per field covering the sessions in `start..=end`.
    ///
    /// Pass `&[Field::Close]` for the default close-only query.
    pub fn ohlcv_window(&self, start: NaiveDate, end: NaiveDate, fields: &[Field]) -> Result<OhlcvTable> {
        let bar_count = self.session_count(start, end)?;

        let tables = fields
            .iter()
            .map(|&field| Ok((field, self.history(field, end, bar_count)?)))
            .collect::<Result<Vec<_>>>()?;
        OhlcvTable::new(tables)
    }

    /// Mean of open, high, low and close per date and symbol
    pub fn average_price(&self, start: NaiveDate, end: NaiveDate) -> Result<PriceTable> {
        let ohlc = self.ohlcv_window(start, end, &Field::PRICES)?;
        Ok(ohlc.mean_across_fields())
    }

    /// Close-to-close percent change over `periods` sessions for `start..=end`.
    ///
    /// Fetches `periods` extra sessions of lookback, so the result covers the
    /// same dates as `ohlcv_window(start, end)` with no leading NaN rows.
    pub fn percent_return(&mut self, start: NaiveDate, end: NaiveDate, periods: usize) -> Result<&PriceTable> {
        if self.cache_policy == CachePolicy::Disabled {
            self.return_cache.clear();
        }

        let PriceDataAccessor { calendar, bundle, assets, return_cache, .. } = self;
        match return_cache.entry(ReturnKey { start, end, periods }) {
            Entry::Occupied(entry) => {
                debug!(%start, %end, periods, "percent return cache hit");
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                // saturates instead of wrapping; an oversized count is out of range anyway
                let bar_count = bar_count_for(calendar.as_ref(), bundle, start, end)?.saturating_add(periods);
                let closes = bundle.history_window(assets, Field::Close, end, bar_count, calendar.as_ref())?;
                Ok(entry.insert(closes.pct_change(periods).skip_rows(periods)))
            }
        }
    }

    pub fn cached_returns(&self) -> usize {
        self.return_cache.len()
    }

    pub fn clear_cache(&mut self) {
        self.return_cache.clear();
    }
}

/// Sessions in `start..=end`, as the bar count of a history window.
///
/// Only the stretch inside the bundle's data is counted day by day. Any
/// session before the first trading day adds one, which already pushes the
/// window out of range without walking back to `start`.
fn bar_count_for(calendar: &dyn TradingCalendar, bundle: &Bundle, start: NaiveDate, end: NaiveDate) -> Result<usize> {
    if start > end {
        return Err(AnalyticsError::InvalidRange { start, end });
    }
    let reader = bundle.daily_bar_reader();
    let (Some(first), Some(last)) = (reader.first_trading_day(), reader.last_session()) else {
        // history_window reports the empty bundle
        return Ok(0);
    };

    let inside = calendar.count_sessions(start.max(first), end.min(last));
    let lead = match first.pred_opt() {
        Some(before_first) if start < first => usize::from(calendar.has_session(start, end.min(before_first))),
        _ => 0,
    };
    Ok(inside + lead)
}
