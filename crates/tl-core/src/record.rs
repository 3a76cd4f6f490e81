//! Normalized time entry consumed by the aggregation engine.

use num::BigRational;

/// One billable unit of work, normalized from a time-tracking platform.
///
/// Source adapters build these at the I/O boundary; nothing downstream sees
/// platform-specific field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeEntryRecord {
    pub user: String,
    pub client: String,
    /// Project name, carrying the jurisdiction suffix for internal projects.
    pub project: String,
    pub task: String,
    /// Rounded duration in hours.
    pub hours: BigRational,
    /// Hourly rate in `currency`. `None` when the platform reports no rate.
    pub hourly_rate: Option<BigRational>,
    /// ISO 4217 code, upper case.
    pub currency: String,
    pub billable: bool,
}

impl TimeEntryRecord {
    /// Creates a billable entry with no hours and no rate.
    ///
    /// The currency code is normalized to upper case.
    pub fn new(
        user: impl Into<String>,
        client: impl Into<String>,
        project: impl Into<String>,
        task: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        let mut currency = currency.into();
        currency.make_ascii_uppercase();
        Self {
            user: user.into(),
            client: client.into(),
            project: project.into(),
            task: task.into(),
            hours: BigRational::default(),
            hourly_rate: None,
            currency,
            billable: true,
        }
    }

    #[must_use]
    pub fn with_hours(mut self, hours: BigRational) -> Self {
        self.hours = hours;
        self
    }

    #[must_use]
    pub fn with_rate(mut self, rate: BigRational) -> Self {
        self.hourly_rate = Some(rate);
        self
    }

    #[must_use]
    pub const fn with_billable(mut self, billable: bool) -> Self {
        self.billable = billable;
        self
    }
}
