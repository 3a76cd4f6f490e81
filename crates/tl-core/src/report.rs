//! Flattening a ledger into report rows.
//!
//! Rows keep exact values; renderers round to cents when they format. Every
//! row is cross-checked before it is returned, so no output is produced from
//! a ledger whose costs and rates disagree.

use num::{BigRational, Zero};
use thiserror::Error;

use crate::classify::{AgencyDirectory, Jurisdiction};
use crate::ledger::{Ledger, Task};
use crate::money::{format_fixed, ratio, round_cents, within};
use crate::period::BillingPeriod;
use crate::rates::{RateCache, RateError};

/// Largest accepted difference between a stored rate and `cost / hours`.
const RATE_TOLERANCE: (i64, i64) = (2, 100);

/// Errors building report rows.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The per-hour price derived from a cost disagrees with the stored rate.
    #[error(
        "price {} {currency} of {user}/{client}/{task} is not similar to hourly rate {} {currency}",
        format_fixed(.derived, 2),
        format_fixed(.stored, 2)
    )]
    RateMismatch {
        user: String,
        client: String,
        task: String,
        currency: String,
        derived: BigRational,
        stored: BigRational,
    },
    #[error(transparent)]
    Rate(#[from] RateError),
    /// A task's jurisdiction has no agency configured.
    #[error(
        "no agency configured for {client}/{task} in jurisdiction {}",
        .jurisdiction.map_or("Unset", Jurisdiction::code)
    )]
    UnknownAgency {
        client: String,
        task: String,
        jurisdiction: Option<Jurisdiction>,
    },
}

/// One task, converted into the report currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub user: String,
    pub period: BillingPeriod,
    pub client: String,
    pub task: String,
    pub project: String,
    pub agency: String,
    pub rounded_hours: BigRational,
    pub source_hourly_rate: BigRational,
    pub source_cost: BigRational,
    pub source_currency: String,
    pub target_hourly_rate: BigRational,
    pub target_cost: BigRational,
    pub target_currency: String,
    pub exchange_rate: BigRational,
}

impl ReportLine {
    fn new(
        user: &str,
        task: &Task,
        period: BillingPeriod,
        target: &str,
        rates: &RateCache,
        agencies: &AgencyDirectory,
    ) -> Result<Self, ReportError> {
        let agency = task
            .agency(agencies)
            .ok_or_else(|| ReportError::UnknownAgency {
                client: task.client.clone(),
                task: task.name.clone(),
                jurisdiction: task.country_code,
            })?;

        Ok(Self {
            user: user.to_string(),
            period,
            client: task.client.clone(),
            task: task.name.clone(),
            project: task.project.clone(),
            agency: agency.to_string(),
            rounded_hours: task.rounded_hours.clone(),
            source_hourly_rate: task.hourly_rate.clone(),
            source_cost: task.cost.clone(),
            source_currency: task.currency.clone(),
            target_hourly_rate: task.converted_hourly_rate(target, rates)?,
            target_cost: task.converted_cost(target, rates)?,
            target_currency: target.to_string(),
            exchange_rate: task.exchange_rate(target, rates)?,
        })
    }

    /// Checks that `cost / hours`, rounded to cents, matches the stored rate
    /// in both currencies.
    pub fn check_rates(&self) -> Result<(), ReportError> {
        if self.rounded_hours.is_zero() {
            return Ok(());
        }
        let tolerance = ratio(RATE_TOLERANCE.0, RATE_TOLERANCE.1);

        let pairs = [
            (&self.target_cost, &self.target_hourly_rate, &self.target_currency),
            (&self.source_cost, &self.source_hourly_rate, &self.source_currency),
        ];
        for (cost, rate, currency) in pairs {
            let derived = round_cents(&(cost / &self.rounded_hours));
            if !within(&derived, rate, &tolerance) {
                return Err(ReportError::RateMismatch {
                    user: self.user.clone(),
                    client: self.client.clone(),
                    task: self.task.clone(),
                    currency: currency.clone(),
                    derived,
                    stored: rate.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Builds one checked row per task, in ledger order.
pub fn build_lines(
    ledger: &Ledger,
    period: BillingPeriod,
    target: &str,
    rates: &RateCache,
    agencies: &AgencyDirectory,
) -> Result<Vec<ReportLine>, ReportError> {
    let lines = ledger
        .tasks()
        .map(|(user, _, task)| ReportLine::new(user, task, period, target, rates, agencies))
        .collect::<Result<Vec<_>, _>>()?;

    for line in &lines {
        line.check_rates()?;
    }
    Ok(lines)
}
