//! Aggregated cost ledger: user → client → task.
//!
//! Every level is an ordered map, so iteration is lexicographic by key and
//! identical input always renders identically. Ledgers are built by
//! [`aggregate`](crate::aggregate) and are read-only afterwards, apart from
//! the narrowing done by the [`filter`](crate::filter) module.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use num::BigRational;

use crate::classify::{AgencyDirectory, Jurisdiction, NO_AGENCY};
use crate::rates::{RateCache, RateError};

/// Aggregate of all entries sharing one (user, client, task) key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: String,
    /// Client dimension: the client name for internal work, the project name
    /// for external work.
    pub client: String,
    /// Project the hours were booked on.
    pub project: String,
    /// Exact sum of entry hours.
    pub rounded_hours: BigRational,
    /// Exact sum of `hours × effective rate` per entry, in `currency`.
    pub cost: BigRational,
    /// Effective rate of the most recently merged entry.
    pub hourly_rate: BigRational,
    pub currency: String,
    /// Agency jurisdiction. `None` for external tasks.
    pub country_code: Option<Jurisdiction>,
    pub is_external: bool,
}

impl Task {
    pub(crate) fn new(
        name: &str,
        client: &str,
        project: &str,
        currency: &str,
        country_code: Option<Jurisdiction>,
    ) -> Self {
        Self {
            name: name.to_string(),
            client: client.to_string(),
            project: project.to_string(),
            rounded_hours: BigRational::default(),
            cost: BigRational::default(),
            hourly_rate: BigRational::default(),
            currency: currency.to_ascii_uppercase(),
            country_code,
            is_external: false,
        }
    }

    /// Rate converting this task's currency into `target`.
    pub fn exchange_rate(&self, target: &str, rates: &RateCache) -> Result<BigRational, RateError> {
        rates.exchange_rate(&self.currency, target)
    }

    /// Total cost expressed in `target`.
    pub fn converted_cost(&self, target: &str, rates: &RateCache) -> Result<BigRational, RateError> {
        rates.convert(&self.cost, &self.currency, target)
    }

    /// Hourly rate expressed in `target`.
    pub fn converted_hourly_rate(
        &self,
        target: &str,
        rates: &RateCache,
    ) -> Result<BigRational, RateError> {
        rates.convert(&self.hourly_rate, &self.currency, target)
    }

    /// Name of the agency entity invoicing this task.
    ///
    /// External tasks report [`NO_AGENCY`]. Returns `None` if the task's
    /// jurisdiction is missing from `agencies`.
    pub fn agency<'a>(&self, agencies: &'a AgencyDirectory) -> Option<&'a str> {
        if self.is_external {
            return Some(NO_AGENCY);
        }
        agencies.get(self.country_code?)
    }

    /// Country code as displayed in reports.
    pub fn country_label(&self) -> &'static str {
        self.country_code.map_or("Unset", Jurisdiction::code)
    }
}

/// Tasks booked for one client, keyed by task name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Client {
    pub(crate) tasks: BTreeMap<String, Task>,
}

impl Client {
    pub fn tasks(&self) -> impl Iterator<Item = (&str, &Task)> {
        self.tasks.iter().map(|(name, task)| (name.as_str(), task))
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Clients one user worked for, keyed by client name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub(crate) clients: BTreeMap<String, Client>,
}

impl User {
    pub fn clients(&self) -> impl Iterator<Item = (&str, &Client)> {
        self.clients
            .iter()
            .map(|(name, client)| (name.as_str(), client))
    }

    pub fn client(&self, name: &str) -> Option<&Client> {
        self.clients.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Aggregation output, keyed by user name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    pub(crate) users: BTreeMap<String, User>,
}

impl Ledger {
    pub fn users(&self) -> impl Iterator<Item = (&str, &User)> {
        self.users.iter().map(|(name, user)| (name.as_str(), user))
    }

    pub fn user(&self, name: &str) -> Option<&User> {
        self.users.get(name)
    }

    /// Looks up a task by its full key.
    pub fn task(&self, user: &str, client: &str, task: &str) -> Option<&Task> {
        self.user(user)?.client(client)?.task(task)
    }

    /// Every task with its user and client key, in ledger order.
    pub fn tasks(&self) -> impl Iterator<Item = (&str, &str, &Task)> {
        self.users().flat_map(|(user, u)| {
            u.clients().flat_map(move |(client, c)| {
                c.tasks().map(move |(_, task)| (user, client, task))
            })
        })
    }

    pub fn user_names(&self) -> Vec<String> {
        self.users.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Returns the task for a key, creating it with `make` if absent. The
    /// flag is true if the task already existed.
    pub(crate) fn task_entry(
        &mut self,
        user: &str,
        client: &str,
        task: &str,
        make: impl FnOnce() -> Task,
    ) -> (&mut Task, bool) {
        let tasks = &mut self
            .users
            .entry(user.to_string())
            .or_default()
            .clients
            .entry(client.to_string())
            .or_default()
            .tasks;
        match tasks.entry(task.to_string()) {
            Entry::Occupied(entry) => (entry.into_mut(), true),
            Entry::Vacant(entry) => (entry.insert(make()), false),
        }
    }

    /// Keeps only the tasks matching `keep`, dropping clients and users left
    /// empty.
    pub(crate) fn retain_tasks(&mut self, mut keep: impl FnMut(&Task) -> bool) {
        for user in self.users.values_mut() {
            for client in user.clients.values_mut() {
                client.tasks.retain(|_, task| keep(task));
            }
            user.clients.retain(|_, client| !client.is_empty());
        }
        self.users.retain(|_, user| !user.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::ratio;
    use crate::rates::FixedRates;

    fn task(currency: &str) -> Task {
        let mut task = Task::new("Dev", "Acme", "Acme - UK", currency, Some(Jurisdiction::Uk));
        task.rounded_hours = ratio(5, 1);
        task.hourly_rate = ratio(75, 1);
        task.cost = ratio(375, 1);
        task
    }

    fn usd_to_eur() -> RateCache {
        RateCache::new(FixedRates::new().with_rate("USD", "EUR", ratio(9, 10)))
    }

    #[test]
    fn test_converted_values() {
        let rates = usd_to_eur();
        let task = task("USD");

        assert_eq!(task.exchange_rate("EUR", &rates).unwrap(), ratio(9, 10));
        assert_eq!(task.converted_cost("EUR", &rates).unwrap(), ratio(675, 2));
        assert_eq!(
            task.converted_hourly_rate("EUR", &rates).unwrap(),
            ratio(135, 2)
        );
    }

    #[test]
    fn test_converted_cost_roundtrips_through_rate() {
        let rates = usd_to_eur();
        let mut task = task("USD");
        task.cost = ratio(1000, 3);

        let converted = task.converted_cost("EUR", &rates).unwrap();
        let rate = task.exchange_rate("EUR", &rates).unwrap();
        assert_eq!(converted / rate, task.cost);
    }

    #[test]
    fn test_same_currency_conversion_is_identity() {
        let rates = RateCache::new(FixedRates::new());
        let task = task("EUR");
        assert_eq!(task.converted_cost("EUR", &rates).unwrap(), task.cost);
    }

    #[test]
    fn test_agency_lookup() {
        let agencies = AgencyDirectory::default();
        let mut task = task("EUR");
        assert_eq!(task.agency(&agencies), Some("Numtide Ltd."));

        task.is_external = true;
        task.country_code = None;
        assert_eq!(task.agency(&agencies), Some(NO_AGENCY));
        assert_eq!(task.country_label(), "Unset");
    }

    #[test]
    fn test_ledger_iterates_in_key_order() {
        let mut ledger = Ledger::default();
        for (user, client) in [("bob", "Zeta"), ("alice", "Beta"), ("alice", "Alpha")] {
            ledger.task_entry(user, client, "Dev", || {
                Task::new("Dev", client, client, "EUR", Some(Jurisdiction::Uk))
            });
        }

        let keys: Vec<_> = ledger.tasks().map(|(u, c, _)| (u, c)).collect();
        assert_eq!(
            keys,
            vec![("alice", "Alpha"), ("alice", "Beta"), ("bob", "Zeta")]
        );
    }

    #[test]
    fn test_retain_drops_empty_levels() {
        let mut ledger = Ledger::default();
        ledger.task_entry("alice", "Acme", "Dev", || task("EUR"));
        let (_, existed) = ledger.task_entry("alice", "Acme", "Dev", || task("USD"));
        assert!(existed);
        ledger.task_entry("bob", "Other", "Dev", || task("EUR"));

        ledger.retain_tasks(|_| false);
        assert!(ledger.is_empty());
    }
}
