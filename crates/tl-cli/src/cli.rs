//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use num::BigRational;
use tl_core::money::parse_decimal;
use tl_core::{BillingPeriod, Jurisdiction};

/// Billable-hours ledger.
///
/// Aggregates time entries per user, client and task, applies agency
/// markups and currency conversion, and exports invoice-ready reports.
#[derive(Debug, Parser)]
#[command(name = "tl", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Aggregate time entries for a billing period and print a report.
    Export(ExportArgs),

    /// Print the exchange rate between two currencies.
    Rate {
        /// Currency to convert from, e.g. USD.
        source: String,

        /// Currency to convert to, e.g. EUR.
        target: String,
    },
}

/// Report output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Humanreadable,
    Csv,
    Json,
    Table,
}

/// Time-tracking platform the entries come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum EntrySource {
    #[default]
    Harvest,
    Kimai,
}

/// Arguments of `tl export`.
#[derive(Debug, Default, Args)]
pub struct ExportArgs {
    /// Platform to read time entries from.
    #[arg(long, value_enum, default_value_t)]
    pub source: EntrySource,

    /// Read time entries exported from the source as JSON instead of calling
    /// its API.
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// First day of the period, e.g. 20240101.
    #[arg(long, value_name = "YYYYMMDD", value_parser = BillingPeriod::parse_compact, requires = "end")]
    pub start: Option<NaiveDate>,

    /// Last day of the period, e.g. 20240131.
    #[arg(long, value_name = "YYYYMMDD", value_parser = BillingPeriod::parse_compact, requires = "start")]
    pub end: Option<NaiveDate>,

    /// Month to report on (conflicts with --start and --end).
    #[arg(
        long,
        value_parser = clap::value_parser!(u32).range(1..=12),
        conflicts_with_all = ["start", "end"]
    )]
    pub month: Option<u32>,

    /// Year of --month. Defaults to the current year.
    #[arg(long, requires = "month")]
    pub year: Option<i32>,

    /// Only report this user. Defaults to `harvest_user` or `kimai_user`
    /// from the config, depending on the source.
    #[arg(long)]
    pub user: Option<String>,

    /// Only report this client, external or not.
    #[arg(long)]
    pub client: Option<String>,

    /// Only report internal work invoiced in this jurisdiction.
    #[arg(long, value_name = "UK|CH")]
    pub country: Option<Jurisdiction>,

    /// Report every task, including external ones.
    #[arg(long, conflicts_with_all = ["client", "country"])]
    pub all: bool,

    /// Currency to convert to, e.g. EUR.
    #[arg(long)]
    pub currency: Option<String>,

    /// Replace every entry's hourly rate.
    #[arg(long, value_name = "RATE", value_parser = parse_decimal)]
    pub hourly_rate: Option<BigRational>,

    /// Share of the client rate paid out for agency work, e.g. 0.75.
    #[arg(long, value_name = "FACTOR", value_parser = parse_decimal)]
    pub agency_markup: Option<BigRational>,

    /// Output format.
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}
