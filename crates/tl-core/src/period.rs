//! Billing period date calculation.

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};
use thiserror::Error;

/// Compact date format used by time-tracking APIs and report rows.
const COMPACT_FORMAT: &str = "%Y%m%d";

/// Invalid billing period.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("period start {start} is after end {end}")]
    Reversed { start: NaiveDate, end: NaiveDate },
    #[error("invalid month {month} in year {year}")]
    InvalidMonth { year: i32, month: u32 },
    #[error("invalid date {0}, expected YYYYMMDD")]
    InvalidDate(String),
}

/// Inclusive date range covered by one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    start: NaiveDate,
    end: NaiveDate,
}

impl BillingPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PeriodError> {
        if start > end {
            return Err(PeriodError::Reversed { start, end });
        }
        Ok(Self { start, end })
    }

    /// First to last day of a calendar month.
    pub fn month(year: i32, month: u32) -> Result<Self, PeriodError> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or(PeriodError::InvalidMonth { year, month })?;
        let next_month = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or(PeriodError::InvalidMonth { year, month })?;
        Self::new(start, next_month - Duration::days(1))
    }

    /// The calendar month before the one containing `today`.
    pub fn previous_month(today: NaiveDate) -> Result<Self, PeriodError> {
        let start_of_month = today.with_day(1).unwrap_or(today);
        let last_month = start_of_month - Duration::days(1);
        Self::month(last_month.year(), last_month.month())
    }

    /// Parses a `YYYYMMDD` date.
    pub fn parse_compact(s: &str) -> Result<NaiveDate, PeriodError> {
        NaiveDate::parse_from_str(s, COMPACT_FORMAT)
            .map_err(|_| PeriodError::InvalidDate(s.to_string()))
    }

    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Start date as `YYYYMMDD`.
    pub fn compact_start(&self) -> String {
        self.start.format(COMPACT_FORMAT).to_string()
    }

    /// End date as `YYYYMMDD`.
    pub fn compact_end(&self) -> String {
        self.end.format(COMPACT_FORMAT).to_string()
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.compact_start(), self.compact_end())
    }
}
