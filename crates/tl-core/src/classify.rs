//! Billing classification of time entries.
//!
//! Client and project names carry billing meaning by convention:
//! - a client named `External - …` is billed directly, without an agency
//! - an internal project name ends in ` - UK` or ` - CH`, naming the
//!   jurisdiction of the agency entity that invoices it
//!
//! This module is the only place that interprets those names.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Client-name prefix marking a directly billed (external) client.
pub const EXTERNAL_CLIENT_PREFIX: &str = "External - ";

/// Agency name reported for external tasks.
pub const NO_AGENCY: &str = "none";

static JURISDICTION_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+ - (UK|CH)$").unwrap());

/// Jurisdiction of the agency entity that invoices an internal project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Jurisdiction {
    Uk,
    Ch,
}

impl Jurisdiction {
    /// Every supported jurisdiction.
    pub const ALL: [Self; 2] = [Self::Uk, Self::Ch];

    /// Two-letter code as it appears in project names.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Uk => "UK",
            Self::Ch => "CH",
        }
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Jurisdiction {
    type Err = UnknownJurisdiction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UK" => Ok(Self::Uk),
            "CH" => Ok(Self::Ch),
            _ => Err(UnknownJurisdiction(s.to_string())),
        }
    }
}

impl Serialize for Jurisdiction {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Jurisdiction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown jurisdiction codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownJurisdiction(String);

impl fmt::Display for UnknownJurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown jurisdiction: {} (expected UK or CH)", self.0)
    }
}

impl std::error::Error for UnknownJurisdiction {}

/// How a single entry is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Billed directly to the client at the raw rate.
    External,
    /// Billed through an agency. `jurisdiction` is `None` when the project
    /// name has no recognizable country suffix.
    Internal { jurisdiction: Option<Jurisdiction> },
}

/// Returns true if the client name carries the external marker.
pub fn is_external_client(client: &str) -> bool {
    client.starts_with(EXTERNAL_CLIENT_PREFIX)
}

/// Parses the trailing ` - XX` jurisdiction suffix of a project name.
pub fn parse_jurisdiction(project: &str) -> Option<Jurisdiction> {
    let caps = JURISDICTION_SUFFIX_RE.captures(project)?;
    caps[1].parse().ok()
}

/// Classifies an entry from its client and project names.
///
/// Without an agency markup nothing can be billed through an agency, so every
/// entry is external.
pub fn classify(client: &str, project: &str, has_agency_markup: bool) -> Classification {
    if !has_agency_markup || is_external_client(client) {
        Classification::External
    } else {
        Classification::Internal {
            jurisdiction: parse_jurisdiction(project),
        }
    }
}

/// Maps jurisdictions to the name of the agency entity invoicing there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgencyDirectory(BTreeMap<Jurisdiction, String>);

impl Default for AgencyDirectory {
    fn default() -> Self {
        Self(BTreeMap::from([
            (Jurisdiction::Uk, "Numtide Ltd.".to_string()),
            (Jurisdiction::Ch, "Numtide Sàrl".to_string()),
        ]))
    }
}

impl AgencyDirectory {
    /// Looks up the agency for a jurisdiction.
    pub fn get(&self, jurisdiction: Jurisdiction) -> Option<&str> {
        self.0.get(&jurisdiction).map(String::as_str)
    }

    /// Registers or replaces the agency for a jurisdiction.
    pub fn insert(&mut self, jurisdiction: Jurisdiction, name: impl Into<String>) {
        self.0.insert(jurisdiction, name.into());
    }
}

impl<S: Into<String>> FromIterator<(Jurisdiction, S)> for AgencyDirectory {
    fn from_iter<I: IntoIterator<Item = (Jurisdiction, S)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(jurisdiction, name)| (jurisdiction, name.into()))
                .collect(),
        )
    }
}
