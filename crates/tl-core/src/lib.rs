//! Core domain logic for the time ledger.
//!
//! This crate contains the fundamental types and logic for:
//! - Aggregation: folding time entries into a user → client → task ledger
//! - Classification: external clients and agency jurisdictions
//! - Exchange rates: a per-report memoizing rate cache
//! - Filtering and reporting: scoping a ledger and flattening it into rows
//!
//! All hours and money are exact rationals until a renderer formats them.

pub mod aggregate;
pub mod classify;
pub mod filter;
pub mod ledger;
pub mod money;
pub mod period;
pub mod rates;
mod record;
pub mod report;

pub use aggregate::{
    AggregateError, Aggregation, AggregationOptions, AggregationWarning, PeriodField, aggregate,
};
pub use classify::{AgencyDirectory, Classification, Jurisdiction, UnknownJurisdiction};
pub use filter::{FilterCriteria, FilterError};
pub use ledger::{Client, Ledger, Task, User};
pub use money::ParseDecimalError;
pub use period::{BillingPeriod, PeriodError};
pub use rates::{ExchangeRateSource, FixedRates, RateCache, RateError};
pub use record::TimeEntryRecord;
pub use report::{ReportError, ReportLine, build_lines};
