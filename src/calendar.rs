//! Trading calendars
//!
//! A calendar decides which dates are sessions. The accessor uses it to turn
//! a `start..=end` range into a bar count, and the bundle uses it to lay out
//! the dates of a history window.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::error::{AnalyticsError, Result};

pub trait TradingCalendar: Send + Sync {
    fn name(&self) -> &str;

    fn is_session(&self, date: NaiveDate) -> bool;

    /// Sessions in `start..=end`, oldest first. Empty when `start > end`.
    fn sessions_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| self.is_session(*d))
            .collect()
    }

    /// Number of sessions in `start..=end`, without materializing them
    fn count_sessions(&self, start: NaiveDate, end: NaiveDate) -> usize {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| self.is_session(*d))
            .count()
    }

    /// Whether `start..=end` holds at least one session. Stops at the first.
    fn has_session(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .any(|d| self.is_session(d))
    }

    /// Up to `count` sessions ending at `end` (inclusive), oldest first,
    /// never reaching back before `earliest`.
    ///
    /// `end` itself must be a session. Fewer than `count` entries come back
    /// when `earliest` cuts the walk short.
    fn sessions_window(&self, end: NaiveDate, count: usize, earliest: NaiveDate) -> Result<Vec<NaiveDate>> {
        if !self.is_session(end) {
            return Err(AnalyticsError::NotASession(end));
        }
        let mut sessions = Vec::new();
        let mut day = end;
        while sessions.len() < count && day >= earliest {
            if self.is_session(day) {
                sessions.push(day);
            }
            day = match day.checked_sub_days(Days::new(1)) {
                Some(prev) => prev,
                None => break,
            };
        }
        sessions.reverse();
        Ok(sessions)
    }
}

/// Every calendar day is a session (crypto markets)
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOpen;

impl TradingCalendar for AlwaysOpen {
    fn name(&self) -> &str {
        "24/7"
    }

    fn is_session(&self, _date: NaiveDate) -> bool {
        true
    }
}

/// Monday to Friday, minus a set of holidays
#[derive(Debug, Clone, Default)]
pub struct WeekdayCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl WeekdayCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holidays<I: IntoIterator<Item = NaiveDate>>(holidays: I) -> Self {
        WeekdayCalendar {
            holidays: holidays.into_iter().collect(),
        }
    }
}

impl TradingCalendar for WeekdayCalendar {
    fn name(&self) -> &str {
        "weekdays"
    }

    fn is_session(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }
}

/// Look a calendar up by its configured name
pub fn calendar_by_name(name: &str) -> Result<Arc<dyn TradingCalendar>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "24/7" | "always_open" | "alwaysopen" | "crypto" => Ok(Arc::new(AlwaysOpen)),
        "weekdays" | "weekday" | "mon-fri" => Ok(Arc::new(WeekdayCalendar::new())),
        _ => Err(AnalyticsError::UnknownCalendar(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_always_open_range_is_inclusive() {
        let sessions = AlwaysOpen.sessions_in_range(d(2022, 4, 5), d(2022, 4, 9));
        assert_eq!(sessions.len(), 5);
        assert_eq!(sessions[0], d(2022, 4, 5));
        assert_eq!(sessions[4], d(2022, 4, 9));
    }

    #[test]
    fn test_range_empty_when_reversed() {
        assert!(AlwaysOpen.sessions_in_range(d(2022, 4, 9), d(2022, 4, 5)).is_empty());
    }

    #[test]
    fn test_weekday_calendar_skips_weekends_and_holidays() {
        // 2022-04-15 is a Friday; 16/17 the weekend
        let cal = WeekdayCalendar::with_holidays([d(2022, 4, 15)]);
        let sessions = cal.sessions_in_range(d(2022, 4, 13), d(2022, 4, 19));
        assert_eq!(sessions, vec![d(2022, 4, 13), d(2022, 4, 14), d(2022, 4, 18), d(2022, 4, 19)]);
    }

    #[test]
    fn test_sessions_window_ends_at_end() {
        let cal = WeekdayCalendar::new();
        // Monday 2022-04-18, three sessions back: Thu 14, Fri 15, Mon 18
        let window = cal.sessions_window(d(2022, 4, 18), 3, d(2022, 1, 1)).unwrap();
        assert_eq!(window, vec![d(2022, 4, 14), d(2022, 4, 15), d(2022, 4, 18)]);
    }

    #[test]
    fn test_sessions_window_stops_at_earliest() {
        let window = AlwaysOpen.sessions_window(d(2022, 4, 9), usize::MAX, d(2022, 4, 5)).unwrap();
        assert_eq!(window, vec![d(2022, 4, 5), d(2022, 4, 6), d(2022, 4, 7), d(2022, 4, 8), d(2022, 4, 9)]);
    }

    #[test]
    fn test_count_and_has_session() {
        let cal = WeekdayCalendar::new();
        assert_eq!(cal.count_sessions(d(2022, 4, 13), d(2022, 4, 19)), 5);
        assert_eq!(cal.count_sessions(d(2022, 4, 19), d(2022, 4, 13)), 0);
        // Saturday and Sunday only
        assert!(!cal.has_session(d(2022, 4, 16), d(2022, 4, 17)));
        assert!(AlwaysOpen.has_session(NaiveDate::MIN, d(2022, 4, 17)));
    }

    #[test]
    fn test_sessions_window_rejects_non_session_end() {
        let cal = WeekdayCalendar::new();
        let err = cal.sessions_window(d(2022, 4, 16), 2, d(2022, 1, 1)).unwrap_err();
        assert!(matches!(err, AnalyticsError::NotASession(_)));
    }

    #[test]
    fn test_calendar_by_name() {
        assert_eq!(calendar_by_name("24/7").unwrap().name(), "24/7");
        assert_eq!(calendar_by_name("Weekdays").unwrap().name(), "weekdays");
        assert!(calendar_by_name("XLON").is_err());
    }
}
