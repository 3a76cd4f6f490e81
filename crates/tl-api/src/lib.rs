//! HTTP integrations for the time ledger.
//!
//! Provides:
//! - Harvest time entry fetching, with the wire-to-record adapter
//! - Kimai timesheet fetching, with its own adapter
//! - Wise quotes as a source of exchange rates

use std::time::Duration;

use thiserror::Error;
use tl_core::ParseDecimalError;

pub mod harvest;
pub mod kimai;
pub mod wise;

pub use harvest::{HarvestClient, HarvestTimeEntry, TimeEntriesPage, parse_time_entries_json};
pub use kimai::{KimaiClient, KimaiTimesheet, parse_timesheets_json};
pub use wise::WiseClient;

/// Default request timeout for API calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// API client errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required credential was blank.
    #[error("invalid credentials: {reason}")]
    InvalidCredentials { reason: &'static str },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// API returned an error response.
    #[error("API error: status {status}: {message}")]
    Api { status: u16, message: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// A numeric field could not be read as an exact decimal.
    #[error("invalid {field} in time entry {id}: {source}")]
    InvalidDecimal {
        id: u64,
        field: &'static str,
        #[source]
        source: ParseDecimalError,
    },
}

fn http_client() -> Result<reqwest::Client, ApiError> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(ApiError::ClientBuild)
}

/// Reads an error response body into an [`ApiError::Api`].
async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ApiError::Api {
        status: status.as_u16(),
        message,
    })
}
