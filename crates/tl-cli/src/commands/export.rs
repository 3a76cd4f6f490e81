//! Implementation of the `tl export` command.
//!
//! Fetches time entries for a billing period (from Harvest or Kimai, or a
//! JSON file exported from either), aggregates them into a ledger, scopes the ledger to one
//! billing target and prints the report to stdout. Warnings go to stderr.

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{Datelike, NaiveDate};
use tl_api::{
    HarvestClient, KimaiClient, WiseClient, parse_time_entries_json, parse_timesheets_json,
};
use tl_core::filter::{self, FilterCriteria};
use tl_core::{
    AggregationOptions, BillingPeriod, RateCache, ReportLine, TimeEntryRecord, aggregate,
    build_lines,
};
use tokio::runtime::Runtime;

use crate::cli::{EntrySource, ExportArgs};
use crate::config::{Config, Text};
use crate::rates::{WiseRates, runtime};
use crate::render::render;

/// Resolves the billing period from the flags.
///
/// `--month` (with an optional `--year`) selects a calendar month, `--start`
/// and `--end` an explicit range. Without either, the previous month.
pub fn resolve_period(args: &ExportArgs, today: NaiveDate) -> Result<BillingPeriod> {
    if let Some(month) = args.month {
        if args.start.is_some() || args.end.is_some() {
            bail!("--month flag conflicts with --start and --end");
        }
        let year = args.year.unwrap_or_else(|| today.year());
        return Ok(BillingPeriod::month(year, month)?);
    }
    match (args.start, args.end) {
        (Some(start), Some(end)) => Ok(BillingPeriod::new(start, end)?),
        (None, None) => Ok(BillingPeriod::previous_month(today)?),
        _ => bail!("both --start and --end flag must be passed"),
    }
}

/// Aggregates, scopes and converts entries into checked report lines.
pub fn build_report(
    entries: &[TimeEntryRecord],
    args: &ExportArgs,
    config: &Config,
    period: BillingPeriod,
    rates: &RateCache,
) -> Result<Vec<ReportLine>> {
    let options = AggregationOptions {
        override_hourly_rate: args.hourly_rate.clone(),
        agency_markup: match &args.agency_markup {
            Some(markup) => Some(markup.clone()),
            None => config.agency_markup()?,
        },
        default_jurisdiction: config.default_jurisdiction,
        period,
    };

    let aggregation = aggregate(entries, &options)?;
    for warning in &aggregation.warnings {
        eprintln!("WARNING, {warning}");
    }
    let mut ledger = aggregation.ledger;

    if let Some(user) = report_user(args, config) {
        filter::keep_user(&mut ledger, user)?;
    }
    if !args.all {
        let criteria = FilterCriteria {
            client: args.client.clone(),
            country: args.country,
        };
        filter::apply(&mut ledger, &criteria);
    }

    let currency = target_currency(args, config);
    Ok(build_lines(&ledger, period, &currency, rates, &config.agencies)?)
}

/// User to narrow the report to: `--user`, else the source's configured user.
fn report_user<'a>(args: &'a ExportArgs, config: &'a Config) -> Option<&'a str> {
    let configured = match args.source {
        EntrySource::Harvest => config.harvest_user.as_ref(),
        EntrySource::Kimai => config.kimai_user.as_ref(),
    };
    args.user.as_deref().or_else(|| configured.map(Text::as_str))
}

fn target_currency(args: &ExportArgs, config: &Config) -> String {
    args.currency
        .as_deref()
        .unwrap_or(&config.currency)
        .to_ascii_uppercase()
}

/// Loads entries from `--input`, or from the source's API.
fn load_entries(
    args: &ExportArgs,
    config: &Config,
    period: BillingPeriod,
    runtime: &Runtime,
) -> Result<Vec<TimeEntryRecord>> {
    if let Some(path) = &args.input {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let entries = match args.source {
            EntrySource::Harvest => parse_time_entries_json(&json),
            EntrySource::Kimai => parse_timesheets_json(&json),
        };
        return entries
            .with_context(|| format!("failed to parse time entries in {}", path.display()));
    }

    match args.source {
        EntrySource::Harvest => fetch_harvest(config, period, runtime),
        EntrySource::Kimai => fetch_kimai(config, period, runtime),
    }
}

fn fetch_harvest(
    config: &Config,
    period: BillingPeriod,
    runtime: &Runtime,
) -> Result<Vec<TimeEntryRecord>> {
    let account_id = config
        .harvest_account_id
        .as_ref()
        .context("no Harvest account id configured (set HARVEST_ACCOUNT_ID)")?;
    let token = config
        .harvest_bearer_token
        .as_ref()
        .context("no Harvest bearer token configured (set HARVEST_BEARER_TOKEN)")?;
    let client = HarvestClient::new(account_id.as_str(), token.as_str())?;
    runtime
        .block_on(client.time_entries(period.start(), period.end()))
        .context("failed to fetch time entries from Harvest")
}

fn fetch_kimai(
    config: &Config,
    period: BillingPeriod,
    runtime: &Runtime,
) -> Result<Vec<TimeEntryRecord>> {
    let api_url = config
        .kimai_api_url
        .as_ref()
        .context("no Kimai API URL configured (set KIMAI_API_URL)")?;
    let api_key = config
        .kimai_api_key
        .as_ref()
        .context("no Kimai API key configured (set KIMAI_API_KEY)")?;
    let client = KimaiClient::new(api_url.as_str(), api_key.as_str())?;
    runtime
        .block_on(client.timesheets(period.start(), period.end()))
        .context("failed to fetch timesheets from Kimai")
}

/// Creates the rate cache for one report: configured rates first, Wise
/// quotes for everything else.
pub fn rate_cache(config: &Config, runtime: Arc<Runtime>) -> Result<RateCache> {
    let wise = WiseRates::new(WiseClient::new()?, runtime);
    Ok(RateCache::new(config.fixed_rates()?.with_fallback(wise)))
}

/// Runs the export command.
pub fn run(args: &ExportArgs, config: &Config, today: NaiveDate) -> Result<()> {
    let period = resolve_period(args, today)?;
    tracing::debug!(%period, "resolved billing period");

    let runtime = Arc::new(runtime().context("failed to start async runtime")?);
    let entries = load_entries(args, config, period, &runtime)?;
    let rates = rate_cache(config, runtime)?;

    let lines = build_report(&entries, args, config, period, &rates)?;
    let output = render(args.format, period, &target_currency(args, config), &lines)?;
    print!("{output}");

    Ok(())
}
