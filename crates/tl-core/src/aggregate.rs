//! Aggregation of time entries into a cost ledger.
//!
//! # Algorithm Summary
//!
//! For each entry, in input order:
//!
//! 1. Classify it as external or internal (see [`classify`](crate::classify)).
//!    External entries key the client dimension on the project name.
//! 2. Internal entries get a jurisdiction from the project name suffix, or the
//!    configured default with a warning.
//! 3. Derive the effective rate: the override rate if given, otherwise the
//!    entry's own rate. Entries without a usable rate are dropped. Internal
//!    rates are multiplied by the agency markup.
//! 4. Merge into the task for (user, client, task). Currency and jurisdiction
//!    must match the task's; a mismatch aborts the whole aggregation.
//! 5. Accumulate hours and cost exactly; the task's `hourly_rate` is the last
//!    effective rate seen.

use std::fmt;

use num::{BigRational, Zero};
use thiserror::Error;

use crate::classify::{Classification, Jurisdiction, classify};
use crate::ledger::{Ledger, Task};
use crate::period::BillingPeriod;
use crate::record::TimeEntryRecord;

/// Options for one aggregation run.
#[derive(Debug, Clone)]
pub struct AggregationOptions {
    /// Replaces every entry's own rate when set.
    pub override_hourly_rate: Option<BigRational>,

    /// Share of the client rate paid out for work billed through an agency
    /// (e.g. `3/4` when the agency retains 25%). When `None`, every entry is
    /// treated as external.
    pub agency_markup: Option<BigRational>,

    /// Jurisdiction assumed for internal projects without a country suffix.
    pub default_jurisdiction: Jurisdiction,

    /// Period the entries were fetched for. Only used in error messages.
    pub period: BillingPeriod,
}

impl AggregationOptions {
    pub const fn new(period: BillingPeriod) -> Self {
        Self {
            override_hourly_rate: None,
            agency_markup: None,
            default_jurisdiction: Jurisdiction::Uk,
            period,
        }
    }
}

/// Field that must stay constant for a task within one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodField {
    Currency,
    CountryCode,
}

impl fmt::Display for PeriodField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Currency => f.write_str("currency"),
            Self::CountryCode => f.write_str("country code"),
        }
    }
}

/// Fatal aggregation errors.
#[derive(Debug, Clone, Error)]
pub enum AggregateError {
    /// Currency or jurisdiction changed for one task within the period.
    #[error(
        "{field} of {user}/{client}/{task} changed from {previous} to {current} \
         within the billing period {period}; this is not supported"
    )]
    InconsistentPeriod {
        field: PeriodField,
        user: String,
        client: String,
        task: String,
        previous: String,
        current: String,
        period: BillingPeriod,
    },
}

/// Recoverable data-quality issue found while aggregating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationWarning {
    /// A billable entry had no usable rate and was dropped.
    ZeroRate {
        user: String,
        client: String,
        project: String,
        task: String,
    },
    /// A project name had no country suffix; the default was assumed.
    UnknownJurisdiction {
        project: String,
        assumed: Jurisdiction,
    },
    /// Entries merged into one task used different effective rates. The
    /// cost reflects each entry's rate; `hourly_rate` keeps the last one.
    DivergentRate {
        user: String,
        client: String,
        task: String,
        previous: BigRational,
        current: BigRational,
    },
}

impl fmt::Display for AggregationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroRate {
                client,
                project,
                task,
                ..
            } => write!(
                f,
                "hourly rate for {client}/{project}/{task} is 0, skipped for export"
            ),
            Self::UnknownJurisdiction { project, assumed } => write!(
                f,
                "project name {project} does not contain a country code, assuming {assumed}"
            ),
            Self::DivergentRate {
                user,
                client,
                task,
                previous,
                current,
            } => write!(
                f,
                "hourly rate of {user}/{client}/{task} changed from {previous} to {current}; \
                 cost uses each entry's rate, the last one is reported"
            ),
        }
    }
}

/// Result of a successful aggregation.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub ledger: Ledger,
    pub warnings: Vec<AggregationWarning>,
}

/// How one entry is billed, after classification and jurisdiction lookup.
enum Billing<'a> {
    External,
    Internal {
        markup: &'a BigRational,
        jurisdiction: Jurisdiction,
    },
}

/// Folds entries into a ledger.
///
/// Either every entry is merged consistently and a complete ledger is
/// returned, or an error is returned and no ledger exists.
pub fn aggregate(
    entries: &[TimeEntryRecord],
    options: &AggregationOptions,
) -> Result<Aggregation, AggregateError> {
    let mut aggregator = Aggregator {
        options,
        result: Aggregation::default(),
    };
    for entry in entries {
        aggregator.process(entry)?;
    }

    tracing::debug!(
        entries = entries.len(),
        users = aggregator.result.ledger.user_names().len(),
        warnings = aggregator.result.warnings.len(),
        "aggregated time entries"
    );
    Ok(aggregator.result)
}

struct Aggregator<'a> {
    options: &'a AggregationOptions,
    result: Aggregation,
}

impl<'a> Aggregator<'a> {
    fn warn(&mut self, warning: AggregationWarning) {
        self.result.warnings.push(warning);
    }

    fn billing(&mut self, entry: &TimeEntryRecord) -> Billing<'a> {
        let options: &'a AggregationOptions = self.options;
        let markup = options.agency_markup.as_ref();
        match (classify(&entry.client, &entry.project, markup.is_some()), markup) {
            (Classification::Internal { jurisdiction }, Some(markup)) => {
                let jurisdiction = match jurisdiction {
                    Some(jurisdiction) => jurisdiction,
                    None => {
                        self.warn(AggregationWarning::UnknownJurisdiction {
                            project: entry.project.clone(),
                            assumed: options.default_jurisdiction,
                        });
                        options.default_jurisdiction
                    }
                };
                Billing::Internal {
                    markup,
                    jurisdiction,
                }
            }
            _ => Billing::External,
        }
    }

    /// Rate before markup, or `None` if the entry must be dropped.
    fn base_rate(&mut self, entry: &TimeEntryRecord, client_key: &str) -> Option<BigRational> {
        if let Some(rate) = &self.options.override_hourly_rate {
            return Some(rate.clone());
        }
        match entry.hourly_rate.as_ref().filter(|rate| !rate.is_zero()) {
            Some(rate) => Some(rate.clone()),
            None => {
                if entry.billable {
                    self.warn(AggregationWarning::ZeroRate {
                        user: entry.user.clone(),
                        client: client_key.to_string(),
                        project: entry.project.clone(),
                        task: entry.task.clone(),
                    });
                }
                None
            }
        }
    }

    fn process(&mut self, entry: &TimeEntryRecord) -> Result<(), AggregateError> {
        let options = self.options;
        let (is_external, client_key, country_code, markup) = match self.billing(entry) {
            Billing::External => (true, entry.project.as_str(), None, None),
            Billing::Internal {
                markup,
                jurisdiction,
            } => (false, entry.client.as_str(), Some(jurisdiction), Some(markup)),
        };

        let Some(base_rate) = self.base_rate(entry, client_key) else {
            return Ok(());
        };
        let rate = match markup {
            Some(markup) => base_rate * markup,
            None => base_rate,
        };

        let (task, existed) = self
            .result
            .ledger
            .task_entry(&entry.user, client_key, &entry.task, || {
                Task::new(
                    &entry.task,
                    client_key,
                    &entry.project,
                    &entry.currency,
                    country_code,
                )
            });
        task.is_external = is_external;

        let inconsistent = |field, previous: String, current: String| {
            AggregateError::InconsistentPeriod {
                field,
                user: entry.user.clone(),
                client: client_key.to_string(),
                task: entry.task.clone(),
                previous,
                current,
                period: options.period,
            }
        };
        if task.country_code != country_code {
            return Err(inconsistent(
                PeriodField::CountryCode,
                task.country_label().to_string(),
                country_code.map_or("Unset", Jurisdiction::code).to_string(),
            ));
        }
        if !task.currency.eq_ignore_ascii_case(&entry.currency) {
            return Err(inconsistent(
                PeriodField::Currency,
                task.currency.clone(),
                entry.currency.clone(),
            ));
        }

        let divergent = (existed && task.hourly_rate != rate).then(|| task.hourly_rate.clone());
        task.cost += &entry.hours * &rate;
        task.rounded_hours += &entry.hours;
        task.hourly_rate = rate.clone();

        if let Some(previous) = divergent {
            self.warn(AggregationWarning::DivergentRate {
                user: entry.user.clone(),
                client: client_key.to_string(),
                task: entry.task.clone(),
                previous,
                current: rate,
            });
        }
        Ok(())
    }
}
