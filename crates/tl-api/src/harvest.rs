//! Harvest v2 time entries.

use std::fmt;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Number;
use tl_core::TimeEntryRecord;
use tl_core::money::parse_decimal;

use crate::{ApiError, error_for_status, http_client};

const HARVEST_API_URL: &str = "https://api.harvestapp.com/v2";
const USER_AGENT: &str = concat!("tl/", env!("CARGO_PKG_VERSION"));

/// One page of `GET /v2/time_entries`.
#[derive(Debug, Deserialize)]
pub struct TimeEntriesPage {
    pub time_entries: Vec<HarvestTimeEntry>,
    #[serde(default)]
    pub links: Links,
}

/// Pagination links.
#[derive(Debug, Default, Deserialize)]
pub struct Links {
    pub next: Option<String>,
}

/// Reference to a named Harvest object.
#[derive(Debug, Clone, Deserialize)]
pub struct Named {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntryClient {
    pub name: String,
    pub currency: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskAssignment {
    pub hourly_rate: Option<Number>,
}

/// A time entry as Harvest sends it. Only the fields the ledger needs.
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestTimeEntry {
    #[serde(default)]
    pub id: u64,
    pub user: Named,
    pub client: EntryClient,
    pub project: Named,
    pub task: Named,
    pub hours: Option<Number>,
    pub rounded_hours: Option<Number>,
    #[serde(default = "default_billable")]
    pub billable: bool,
    pub billable_rate: Option<Number>,
    #[serde(default)]
    pub task_assignment: TaskAssignment,
}

const fn default_billable() -> bool {
    true
}

impl HarvestTimeEntry {
    /// Converts into the normalized record.
    ///
    /// The rate is the task assignment's hourly rate, falling back to the
    /// entry's billable rate. Hours prefer `rounded_hours` over `hours`.
    pub fn into_record(self) -> Result<TimeEntryRecord, ApiError> {
        let id = self.id;
        let decimal = |field: &'static str, number: &Number| {
            parse_decimal(&number.to_string())
                .map_err(|source| ApiError::InvalidDecimal { id, field, source })
        };

        let hours = match self.rounded_hours.as_ref().or(self.hours.as_ref()) {
            Some(hours) => decimal("rounded_hours", hours)?,
            None => tl_core::money::zero(),
        };
        let hourly_rate = self
            .task_assignment
            .hourly_rate
            .as_ref()
            .or(self.billable_rate.as_ref())
            .map(|rate| decimal("hourly_rate", rate))
            .transpose()?;

        let mut record = TimeEntryRecord::new(
            self.user.name,
            self.client.name,
            self.project.name,
            self.task.name,
            self.client.currency,
        )
        .with_hours(hours)
        .with_billable(self.billable);
        record.hourly_rate = hourly_rate;
        Ok(record)
    }
}

/// Parses an exported time entry file: either a page object or a bare array.
pub fn parse_time_entries_json(json: &str) -> Result<Vec<TimeEntryRecord>, ApiError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Input {
        Page(TimeEntriesPage),
        Entries(Vec<HarvestTimeEntry>),
    }

    let entries = match serde_json::from_str(json)
        .map_err(|err| ApiError::InvalidResponse(err.to_string()))?
    {
        Input::Page(page) => page.time_entries,
        Input::Entries(entries) => entries,
    };
    entries
        .into_iter()
        .map(HarvestTimeEntry::into_record)
        .collect()
}

/// Harvest API client.
pub struct HarvestClient {
    http: reqwest::Client,
    account_id: String,
    token: String,
    base_url: String,
}

impl fmt::Debug for HarvestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestClient")
            .field("account_id", &self.account_id)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HarvestClient {
    /// Creates a client for one Harvest account.
    ///
    /// # Errors
    ///
    /// Returns an error if either credential is blank, or if the HTTP client
    /// fails to build.
    pub fn new(account_id: impl Into<String>, token: impl Into<String>) -> Result<Self, ApiError> {
        let account_id = account_id.into();
        let token = token.into();
        if account_id.trim().is_empty() {
            return Err(ApiError::InvalidCredentials {
                reason: "Harvest account id cannot be empty",
            });
        }
        if token.trim().is_empty() {
            return Err(ApiError::InvalidCredentials {
                reason: "Harvest bearer token cannot be empty",
            });
        }

        Ok(Self {
            http: http_client()?,
            account_id,
            token,
            base_url: HARVEST_API_URL.to_string(),
        })
    }

    /// Points the client at another API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn first_page_url(&self, from: NaiveDate, to: NaiveDate) -> String {
        format!(
            "{}/time_entries?from={}&to={}",
            self.base_url.trim_end_matches('/'),
            from.format("%Y%m%d"),
            to.format("%Y%m%d"),
        )
    }

    /// Fetches every time entry between `from` and `to`, both inclusive,
    /// following pagination links.
    pub async fn time_entries(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TimeEntryRecord>, ApiError> {
        let mut url = Some(self.first_page_url(from, to));
        let mut records = Vec::new();

        while let Some(current) = url.take() {
            tracing::debug!(url = %current, "fetching time entries page");
            let response = self
                .http
                .get(&current)
                .bearer_auth(&self.token)
                .header("Harvest-Account-Id", &self.account_id)
                .header(reqwest::header::USER_AGENT, USER_AGENT)
                .send()
                .await?;
            let body = error_for_status(response).await?.text().await?;
            let page: TimeEntriesPage = serde_json::from_str(&body)
                .map_err(|err| ApiError::InvalidResponse(err.to_string()))?;

            for entry in page.time_entries {
                records.push(entry.into_record()?);
            }
            url = page.links.next;
        }

        tracing::debug!(entries = records.len(), "fetched time entries");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use tl_core::money::ratio;

    use super::*;

    const ENTRY: &str = r#"{
        "id": 636709355,
        "hours": 2.11,
        "rounded_hours": 2.25,
        "billable": true,
        "billable_rate": 100.0,
        "user": {"id": 1782959, "name": "Alice"},
        "client": {"id": 5735776, "name": "Acme", "currency": "EUR"},
        "project": {"id": 14307913, "name": "Acme - UK"},
        "task": {"id": 8083365, "name": "Dev"},
        "task_assignment": {"id": 155502709, "hourly_rate": 120.5}
    }"#;

    #[test]
    fn entry_converts_to_record() {
        let entry: HarvestTimeEntry = serde_json::from_str(ENTRY).unwrap();
        let record = entry.into_record().unwrap();

        assert_eq!(record.user, "Alice");
        assert_eq!(record.client, "Acme");
        assert_eq!(record.project, "Acme - UK");
        assert_eq!(record.task, "Dev");
        assert_eq!(record.currency, "EUR");
        assert_eq!(record.hours, ratio(9, 4));
        assert_eq!(record.hourly_rate, Some(ratio(241, 2)));
        assert!(record.billable);
    }

    #[test]
    fn decimals_are_exact() {
        let json = ENTRY.replace("\"rounded_hours\": 2.25", "\"rounded_hours\": 0.1");
        let entry: HarvestTimeEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry.into_record().unwrap().hours, ratio(1, 10));
    }

    #[test]
    fn rate_falls_back_to_billable_rate() {
        let json = ENTRY.replace("\"hourly_rate\": 120.5", "\"hourly_rate\": null");
        let entry: HarvestTimeEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry.into_record().unwrap().hourly_rate, Some(ratio(100, 1)));
    }

    #[test]
    fn missing_rates_leave_rate_unset() {
        let json = r#"{
            "user": {"name": "Bob"},
            "client": {"name": "Acme", "currency": "CHF"},
            "project": {"name": "Acme - CH"},
            "task": {"name": "Admin"},
            "rounded_hours": 1,
            "billable": false
        }"#;
        let entry: HarvestTimeEntry = serde_json::from_str(json).unwrap();
        let record = entry.into_record().unwrap();
        assert_eq!(record.hourly_rate, None);
        assert!(!record.billable);
    }

    #[test]
    fn currency_is_upper_cased() {
        let json = ENTRY.replace("\"currency\": \"EUR\"", "\"currency\": \"eur\"");
        let entry: HarvestTimeEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry.into_record().unwrap().currency, "EUR");
    }

    #[test]
    fn file_accepts_page_or_array() {
        let page = format!(r#"{{"time_entries": [{ENTRY}], "links": {{"next": null}}}}"#);
        let array = format!("[{ENTRY}, {ENTRY}]");

        assert_eq!(parse_time_entries_json(&page).unwrap().len(), 1);
        assert_eq!(parse_time_entries_json(&array).unwrap().len(), 2);
    }

    #[test]
    fn file_rejects_other_json() {
        let err = parse_time_entries_json(r#"{"entries": []}"#).unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn client_rejects_blank_credentials() {
        assert!(matches!(
            HarvestClient::new("", "token"),
            Err(ApiError::InvalidCredentials { .. })
        ));
        assert!(matches!(
            HarvestClient::new("123", "  "),
            Err(ApiError::InvalidCredentials { .. })
        ));
    }

    #[test]
    fn client_debug_redacts_token() {
        let client = HarvestClient::new("123", "secret-token").unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn first_page_url_uses_compact_dates() {
        let client = HarvestClient::new("123", "token")
            .unwrap()
            .with_base_url("http://localhost:9999/v2/");
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(
            client.first_page_url(from, to),
            "http://localhost:9999/v2/time_entries?from=20240101&to=20240131"
        );
    }
}
