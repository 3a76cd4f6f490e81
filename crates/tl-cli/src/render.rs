//! Report renderers.
//!
//! Every renderer consumes checked [`ReportLine`]s and rounds money to cents
//! only here, when formatting.

use std::collections::BTreeMap;
use std::fmt::Write;

use anyhow::{Context, Result};
use comfy_table::Table;
use num::BigRational;
use serde::Serialize;
use tl_core::money::{format_fixed, format_trimmed, round_cents, round_to, to_f64};
use tl_core::{BillingPeriod, ReportLine};

use crate::cli::OutputFormat;

/// Fractional digits shown for hours.
const HOUR_DECIMALS: u32 = 2;

/// Fractional digits shown for exchange rates.
const RATE_DECIMALS: u32 = 6;

const COLUMNS: [&str; 14] = [
    "user",
    "start_date",
    "end_date",
    "client",
    "task",
    "agency",
    "rounded_hours",
    "source_hourly_rate",
    "source_cost",
    "source_currency",
    "target_hourly_rate",
    "target_cost",
    "target_currency",
    "exchange_rate",
];

/// Renders report lines in the requested format.
pub fn render(
    format: OutputFormat,
    period: BillingPeriod,
    currency: &str,
    lines: &[ReportLine],
) -> Result<String> {
    match format {
        OutputFormat::Humanreadable => Ok(format_humanreadable(period, currency, lines)),
        OutputFormat::Csv => format_csv(lines),
        OutputFormat::Json => format_json(lines),
        OutputFormat::Table => Ok(format_table(lines)),
    }
}

fn hours(value: &BigRational) -> String {
    format_trimmed(value, HOUR_DECIMALS)
}

fn money(value: &BigRational) -> String {
    format_fixed(value, 2)
}

fn rate(value: &BigRational) -> String {
    format_trimmed(value, RATE_DECIMALS)
}

// ========== Human-readable ==========

/// Formats lines grouped by user, followed by the exchange rates used.
pub fn format_humanreadable(period: BillingPeriod, currency: &str, lines: &[ReportLine]) -> String {
    let mut output = String::new();
    writeln!(
        output,
        "time: {} -> {}",
        period.compact_start(),
        period.compact_end()
    )
    .unwrap();

    for user_lines in lines.chunk_by(|a, b| a.user == b.user) {
        writeln!(output, "{}:", user_lines[0].user).unwrap();

        let mut rates = BTreeMap::new();
        for line in user_lines {
            if line.source_currency != currency {
                rates.insert(line.source_currency.as_str(), &line.exchange_rate);
            }
            writeln!(
                output,
                "  {}/{}: {}h, {} {} -> {} {}",
                line.client,
                line.task,
                hours(&line.rounded_hours),
                money(&line.source_cost),
                line.source_currency,
                money(&line.target_cost),
                currency,
            )
            .unwrap();
        }

        writeln!(output, "Exchange rates").unwrap();
        for (source, exchange_rate) in rates {
            writeln!(output, "1 {source} -> {} {currency}", rate(exchange_rate)).unwrap();
        }
    }

    output
}

// ========== CSV ==========

#[derive(Serialize)]
struct CsvRow<'a> {
    user: &'a str,
    start_date: String,
    end_date: String,
    client: &'a str,
    task: &'a str,
    agency: &'a str,
    rounded_hours: String,
    source_hourly_rate: String,
    source_cost: String,
    source_currency: &'a str,
    target_hourly_rate: String,
    target_cost: String,
    target_currency: &'a str,
    exchange_rate: String,
}

impl<'a> From<&'a ReportLine> for CsvRow<'a> {
    fn from(line: &'a ReportLine) -> Self {
        Self {
            user: &line.user,
            start_date: line.period.compact_start(),
            end_date: line.period.compact_end(),
            client: &line.client,
            task: &line.task,
            agency: &line.agency,
            rounded_hours: hours(&line.rounded_hours),
            source_hourly_rate: money(&line.source_hourly_rate),
            source_cost: money(&line.source_cost),
            source_currency: &line.source_currency,
            target_hourly_rate: money(&line.target_hourly_rate),
            target_cost: money(&line.target_cost),
            target_currency: &line.target_currency,
            exchange_rate: rate(&line.exchange_rate),
        }
    }
}

/// Formats one CSV row per line, with a header even when empty.
pub fn format_csv(lines: &[ReportLine]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(COLUMNS)?;
    for line in lines {
        writer
            .serialize(CsvRow::from(line))
            .context("failed to write CSV row")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| err.into_error())
        .context("failed to flush CSV output")?;
    Ok(String::from_utf8(bytes)?)
}

// ========== JSON ==========

#[derive(Serialize)]
struct JsonRow<'a> {
    user: &'a str,
    start_date: String,
    end_date: String,
    client: &'a str,
    task: &'a str,
    agency: &'a str,
    rounded_hours: f64,
    source_hourly_rate: f64,
    source_cost: f64,
    source_currency: &'a str,
    target_hourly_rate: f64,
    target_cost: f64,
    target_currency: &'a str,
    exchange_rate: f64,
}

impl<'a> From<&'a ReportLine> for JsonRow<'a> {
    fn from(line: &'a ReportLine) -> Self {
        let cents = |value: &BigRational| to_f64(&round_cents(value));
        Self {
            user: &line.user,
            start_date: line.period.compact_start(),
            end_date: line.period.compact_end(),
            client: &line.client,
            task: &line.task,
            agency: &line.agency,
            rounded_hours: to_f64(&round_to(&line.rounded_hours, HOUR_DECIMALS)),
            source_hourly_rate: cents(&line.source_hourly_rate),
            source_cost: cents(&line.source_cost),
            source_currency: &line.source_currency,
            target_hourly_rate: cents(&line.target_hourly_rate),
            target_cost: cents(&line.target_cost),
            target_currency: &line.target_currency,
            exchange_rate: to_f64(&line.exchange_rate),
        }
    }
}

/// Formats lines as a pretty-printed JSON array.
pub fn format_json(lines: &[ReportLine]) -> Result<String> {
    let rows: Vec<JsonRow<'_>> = lines.iter().map(JsonRow::from).collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

// ========== Table ==========

/// Formats lines as a text table with the CSV columns.
pub fn format_table(lines: &[ReportLine]) -> String {
    let mut table = Table::new();
    table.set_header(COLUMNS);
    for line in lines {
        let row = CsvRow::from(line);
        table.add_row(vec![
            row.user.to_string(),
            row.start_date,
            row.end_date,
            row.client.to_string(),
            row.task.to_string(),
            row.agency.to_string(),
            row.rounded_hours,
            row.source_hourly_rate,
            row.source_cost,
            row.source_currency.to_string(),
            row.target_hourly_rate,
            row.target_cost,
            row.target_currency.to_string(),
            row.exchange_rate,
        ]);
    }
    format!("{table}\n")
}
