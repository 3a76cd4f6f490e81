//! Exchange rate sources backed by the network.

use std::sync::Arc;

use num::BigRational;
use tl_api::WiseClient;
use tl_core::{ExchangeRateSource, RateError};
use tokio::runtime::Runtime;

/// Builds the single-threaded runtime used to drive API calls.
pub fn runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// Live rates from Wise quotes.
///
/// Each lookup blocks on the shared runtime; callers must not already be
/// inside it.
#[derive(Debug)]
pub struct WiseRates {
    client: WiseClient,
    runtime: Arc<Runtime>,
}

impl WiseRates {
    pub const fn new(client: WiseClient, runtime: Arc<Runtime>) -> Self {
        Self { client, runtime }
    }
}

impl ExchangeRateSource for WiseRates {
    fn fetch_rate(&self, from: &str, to: &str) -> Result<BigRational, RateError> {
        self.runtime
            .block_on(self.client.quote_rate(from, to))
            .map_err(|err| RateError::Provider {
                from: from.to_string(),
                to: to.to_string(),
                message: err.to_string(),
            })
    }
}
