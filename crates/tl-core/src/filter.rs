//! Narrowing a ledger down to what one report should contain.

use thiserror::Error;

use crate::classify::Jurisdiction;
use crate::ledger::{Ledger, Task, User};

/// Errors from selecting part of a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("user {user} not found in time range, found {}", known.join(", "))]
    UserNotFound { user: String, known: Vec<String> },
}

/// Report selection criteria.
///
/// With no criteria set, only internal tasks are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Keep exactly the tasks of this client.
    pub client: Option<String>,
    /// Keep only internal tasks invoiced in this jurisdiction.
    pub country: Option<Jurisdiction>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.client.is_none() && self.country.is_none()
    }
}

/// Returns true if `task` must be left out of the report.
///
/// Rules apply in order:
///
/// 1. A client criterion decides alone: matching tasks are kept (external or
///    not), all others excluded.
/// 2. A country criterion excludes tasks from other jurisdictions. External
///    tasks have no jurisdiction and are excluded too.
/// 3. External tasks are excluded.
pub fn exclude(task: &Task, criteria: &FilterCriteria) -> bool {
    if let Some(client) = &criteria.client {
        return task.client != *client;
    }
    if criteria
        .country
        .is_some_and(|country| task.country_code != Some(country))
    {
        return true;
    }
    task.is_external
}

/// Looks up one user's slice of the ledger.
pub fn select_user<'a>(ledger: &'a Ledger, name: &str) -> Result<&'a User, FilterError> {
    ledger.user(name).ok_or_else(|| FilterError::UserNotFound {
        user: name.to_string(),
        known: ledger.user_names(),
    })
}

/// Narrows the ledger to a single user.
pub fn keep_user(ledger: &mut Ledger, name: &str) -> Result<(), FilterError> {
    select_user(ledger, name)?;
    ledger.users.retain(|user, _| user == name);
    Ok(())
}

/// Drops every task [`exclude`] rejects, along with clients and users left
/// without tasks.
pub fn apply(ledger: &mut Ledger, criteria: &FilterCriteria) {
    ledger.retain_tasks(|task| !exclude(task, criteria));
}
