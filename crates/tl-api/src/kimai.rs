//! Kimai timesheets.
//!
//! Timesheets are requested with `full=true`, so user, project, customer and
//! activity arrive expanded instead of as ids.

use std::fmt;

use chrono::NaiveDate;
use num::Zero;
use serde::Deserialize;
use serde_json::Number;
use tl_core::TimeEntryRecord;
use tl_core::money::{parse_decimal, ratio};

use crate::{ApiError, error_for_status, http_client};

const PAGE_SIZE: u32 = 250;
const TOTAL_PAGES_HEADER: &str = "x-total-pages";
const SECONDS_PER_HOUR: i64 = 3600;

#[derive(Debug, Clone, Deserialize)]
pub struct KimaiUser {
    pub username: String,
    #[serde(default)]
    pub alias: Option<String>,
}

impl KimaiUser {
    /// Display name: the alias when set, else the login.
    fn name(self) -> String {
        self.alias
            .filter(|alias| !alias.trim().is_empty())
            .unwrap_or(self.username)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KimaiCustomer {
    pub name: String,
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KimaiProject {
    pub name: String,
    pub customer: KimaiCustomer,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KimaiActivity {
    pub name: String,
}

/// A timesheet record as `GET /api/timesheets?full=true` returns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KimaiTimesheet {
    #[serde(default)]
    pub id: u64,
    pub user: KimaiUser,
    pub project: KimaiProject,
    pub activity: KimaiActivity,
    /// Seconds. `null` while the timer is still running.
    pub duration: Option<Number>,
    /// Total charged for this record.
    pub rate: Option<Number>,
    pub hourly_rate: Option<Number>,
    #[serde(default = "default_billable")]
    pub billable: bool,
}

const fn default_billable() -> bool {
    true
}

impl KimaiTimesheet {
    /// Converts into the normalized record.
    ///
    /// The activity becomes the task and the customer's currency the
    /// currency. The rate is `hourlyRate`, or the record's total `rate`
    /// spread over its hours when no hourly rate is set.
    pub fn into_record(self) -> Result<TimeEntryRecord, ApiError> {
        let id = self.id;
        let decimal = |field: &'static str, number: &Number| {
            parse_decimal(&number.to_string())
                .map_err(|source| ApiError::InvalidDecimal { id, field, source })
        };

        let hours = match &self.duration {
            Some(seconds) => decimal("duration", seconds)? / ratio(SECONDS_PER_HOUR, 1),
            None => tl_core::money::zero(),
        };
        let hourly_rate = match (&self.hourly_rate, &self.rate) {
            (Some(hourly), _) => Some(decimal("hourlyRate", hourly)?),
            (None, Some(total)) if !hours.is_zero() => Some(decimal("rate", total)? / &hours),
            _ => None,
        };

        let project = self.project;
        let mut record = TimeEntryRecord::new(
            self.user.name(),
            project.customer.name,
            project.name,
            self.activity.name,
            project.customer.currency,
        )
        .with_hours(hours)
        .with_billable(self.billable);
        record.hourly_rate = hourly_rate;
        Ok(record)
    }
}

/// Parses an exported timesheet file: a JSON array of timesheets.
pub fn parse_timesheets_json(json: &str) -> Result<Vec<TimeEntryRecord>, ApiError> {
    let timesheets: Vec<KimaiTimesheet> =
        serde_json::from_str(json).map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
    timesheets
        .into_iter()
        .map(KimaiTimesheet::into_record)
        .collect()
}

/// Kimai API client.
pub struct KimaiClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl fmt::Debug for KimaiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KimaiClient")
            .field("api_url", &self.api_url)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl KimaiClient {
    /// Creates a client for one Kimai instance, e.g. `https://kimai.example.com`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or token is blank, or if the HTTP client
    /// fails to build.
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ApiError> {
        let api_url = api_url.into();
        let token = token.into();
        if api_url.trim().is_empty() {
            return Err(ApiError::InvalidCredentials {
                reason: "Kimai API URL cannot be empty",
            });
        }
        if token.trim().is_empty() {
            return Err(ApiError::InvalidCredentials {
                reason: "Kimai API key cannot be empty",
            });
        }

        Ok(Self {
            http: http_client()?,
            api_url,
            token,
        })
    }

    fn page_url(&self, from: NaiveDate, to: NaiveDate, page: u32) -> String {
        format!(
            "{}/api/timesheets?full=true&begin={}T00:00:00&end={}T23:59:59&size={PAGE_SIZE}&page={page}",
            self.api_url.trim_end_matches('/'),
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d"),
        )
    }

    /// Fetches the timesheets between `from` and `to`, both inclusive,
    /// walking every page the server reports.
    pub async fn timesheets(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TimeEntryRecord>, ApiError> {
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let url = self.page_url(from, to, page);
            tracing::debug!(%url, "fetching timesheets page");
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;
            let response = error_for_status(response).await?;
            let total_pages = total_pages(response.headers());
            let body = response.text().await?;
            let timesheets: Vec<KimaiTimesheet> = serde_json::from_str(&body)
                .map_err(|err| ApiError::InvalidResponse(err.to_string()))?;

            for timesheet in timesheets {
                records.push(timesheet.into_record()?);
            }
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        tracing::debug!(entries = records.len(), "fetched timesheets");
        Ok(records)
    }
}

/// Page count announced by the server; a missing header means one page.
fn total_pages(headers: &reqwest::header::HeaderMap) -> u32 {
    headers
        .get(TOTAL_PAGES_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(1)
}
