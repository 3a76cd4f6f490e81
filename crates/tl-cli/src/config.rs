//! Configuration loading and management.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use num::BigRational;
use serde::{Deserialize, Deserializer, Serialize};
use tl_core::money::parse_decimal;
use tl_core::{AgencyDirectory, FixedRates, Jurisdiction};

/// Raw environment variables read for compatibility with older setups.
const LEGACY_ENV: [&str; 6] = [
    "HARVEST_ACCOUNT_ID",
    "HARVEST_BEARER_TOKEN",
    "HARVEST_USER",
    "KIMAI_API_URL",
    "KIMAI_API_KEY",
    "KIMAI_USER",
];

/// A string setting that may also be written as a number.
///
/// The environment provider parses `TL_AGENCY_MARKUP=0.75` or
/// `HARVEST_ACCOUNT_ID=123456` as numbers; both are kept as text.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Text(String);

impl Text {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl<'de> Deserialize<'de> for Text {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Unsigned(u64),
            Signed(i64),
            Float(f64),
        }

        Ok(Self(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Unsigned(n) => n.to_string(),
            Raw::Signed(n) => n.to_string(),
            Raw::Float(n) => n.to_string(),
        }))
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Harvest account id.
    pub harvest_account_id: Option<Text>,

    /// Harvest personal access token.
    pub harvest_bearer_token: Option<Text>,

    /// User reported when `--user` is not given and the source is Harvest.
    pub harvest_user: Option<Text>,

    /// Root URL of the Kimai instance.
    pub kimai_api_url: Option<Text>,

    /// Kimai API token.
    pub kimai_api_key: Option<Text>,

    /// User reported when `--user` is not given and the source is Kimai.
    pub kimai_user: Option<Text>,

    /// Report currency.
    pub currency: String,

    /// Share of the client rate paid out for agency work, e.g. `"0.75"`.
    pub agency_markup: Option<Text>,

    /// Jurisdiction assumed for internal projects without a country suffix.
    pub default_jurisdiction: Jurisdiction,

    /// Agency entity per jurisdiction.
    pub agencies: AgencyDirectory,

    /// Fixed exchange rates keyed `"SRC/DST"`, e.g. `"EUR/USD" = "1.08"`.
    pub rates: BTreeMap<String, Text>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("harvest_account_id", &self.harvest_account_id)
            .field(
                "harvest_bearer_token",
                &self.harvest_bearer_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("harvest_user", &self.harvest_user)
            .field("kimai_api_url", &self.kimai_api_url)
            .field(
                "kimai_api_key",
                &self.kimai_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("kimai_user", &self.kimai_user)
            .field("currency", &self.currency)
            .field("agency_markup", &self.agency_markup)
            .field("default_jurisdiction", &self.default_jurisdiction)
            .field("agencies", &self.agencies)
            .field("rates", &self.rates)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            harvest_account_id: None,
            harvest_bearer_token: None,
            harvest_user: None,
            kimai_api_url: None,
            kimai_api_key: None,
            kimai_user: None,
            currency: "EUR".to_string(),
            agency_markup: None,
            default_jurisdiction: Jurisdiction::Uk,
            agencies: AgencyDirectory::default(),
            rates: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Legacy HARVEST_* variables, then TL_* which win
        figment = figment
            .merge(Env::raw().only(&LEGACY_ENV))
            .merge(Env::prefixed("TL_"));

        figment.extract()
    }

    /// Parsed agency markup, if configured.
    pub fn agency_markup(&self) -> Result<Option<BigRational>> {
        self.agency_markup
            .as_ref()
            .map(|markup| {
                parse_decimal(markup.as_str())
                    .with_context(|| format!("invalid agency_markup {:?}", markup.as_str()))
            })
            .transpose()
    }

    /// Fixed exchange rates from the `[rates]` table.
    pub fn fixed_rates(&self) -> Result<FixedRates> {
        let mut rates = FixedRates::new();
        for (pair, rate) in &self.rates {
            let Some((source, target)) = pair.split_once('/') else {
                bail!("invalid rate key {pair:?}, expected SOURCE/TARGET");
            };
            let rate = parse_decimal(rate.as_str())
                .with_context(|| format!("invalid rate for {pair}"))?;
            rates.insert(source.trim(), target.trim(), rate);
        }
        Ok(rates)
    }
}

/// Returns the platform-specific config directory for tl.
///
/// On Linux: `~/.config/tl`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tl"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;
    use tl_core::ExchangeRateSource;
    use tl_core::money::ratio;

    use super::*;

    fn config_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_dirs_config_path_ends_with_tl() {
        let path = dirs_config_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "tl");
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.currency, "EUR");
        assert_eq!(config.default_jurisdiction, Jurisdiction::Uk);
        assert_eq!(config.agencies.get(Jurisdiction::Ch), Some("Numtide Sàrl"));
        assert!(config.agency_markup().unwrap().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let file = config_file(
            r#"
currency = "CHF"
agency_markup = 0.75
default_jurisdiction = "CH"

[agencies]
UK = "Example Ltd."

[rates]
"EUR/CHF" = "0.95"
"#,
        );
        let config = Config::load_from(Some(file.path())).unwrap();

        assert_eq!(config.currency, "CHF");
        assert_eq!(config.agency_markup().unwrap(), Some(ratio(3, 4)));
        assert_eq!(config.default_jurisdiction, Jurisdiction::Ch);
        assert_eq!(config.agencies.get(Jurisdiction::Uk), Some("Example Ltd."));
        // Unlisted jurisdictions keep their defaults
        assert_eq!(config.agencies.get(Jurisdiction::Ch), Some("Numtide Sàrl"));

        let rates = config.fixed_rates().unwrap();
        assert_eq!(rates.fetch_rate("EUR", "CHF").unwrap(), ratio(19, 20));
        assert_eq!(rates.fetch_rate("CHF", "EUR").unwrap(), ratio(20, 19));
    }

    #[test]
    fn test_invalid_rate_key() {
        let mut config = Config::default();
        config.rates.insert("EURUSD".to_string(), Text::from("1.08"));
        let err = config.fixed_rates().unwrap_err();
        assert!(err.to_string().contains("expected SOURCE/TARGET"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = Config {
            harvest_bearer_token: Some(Text::from("secret-token")),
            ..Config::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_load_kimai_settings() {
        let file = config_file(
            r#"
kimai_api_url = "https://kimai.example.com"
kimai_api_key = "secret-key"
kimai_user = "Alice"
"#,
        );
        let config = Config::load_from(Some(file.path())).unwrap();

        assert_eq!(
            config.kimai_api_url.as_ref().map(Text::as_str),
            Some("https://kimai.example.com")
        );
        assert_eq!(config.kimai_user.as_ref().map(Text::as_str), Some("Alice"));
        assert!(!format!("{config:?}").contains("secret-key"));
    }
}
