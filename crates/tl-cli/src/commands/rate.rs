//! Implementation of the `tl rate` command.

use std::sync::Arc;

use anyhow::{Context, Result};
use tl_core::money::format_trimmed;

use super::export::rate_cache;
use crate::config::Config;
use crate::rates::runtime;

/// Fractional digits printed for a rate.
const RATE_DECIMALS: u32 = 6;

/// Prints `1 SOURCE -> RATE TARGET`.
pub fn run(source: &str, target: &str, config: &Config) -> Result<()> {
    let source = source.to_ascii_uppercase();
    let target = target.to_ascii_uppercase();

    let runtime = Arc::new(runtime().context("failed to start async runtime")?);
    let rates = rate_cache(config, runtime)?;
    let rate = rates
        .exchange_rate(&source, &target)
        .with_context(|| format!("failed to look up {source} -> {target}"))?;

    println!("1 {source} -> {} {target}", format_trimmed(&rate, RATE_DECIMALS));
    Ok(())
}
