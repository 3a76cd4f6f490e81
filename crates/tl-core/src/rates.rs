//! Currency exchange rates.
//!
//! A [`RateCache`] memoizes rates per (source, target) pair for the lifetime
//! of one report generation. Create a fresh cache per report; rates are not
//! refreshed once cached.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use num::{BigRational, One, Signed};
use thiserror::Error;

/// Exchange rate lookup errors.
#[derive(Debug, Error)]
pub enum RateError {
    /// No source knows this currency pair.
    #[error("no exchange rate available for {from} -> {to}")]
    Unavailable { from: String, to: String },
    /// The source returned zero or a negative rate.
    #[error("exchange rate for {from} -> {to} must be positive, got {rate}")]
    NonPositive {
        from: String,
        to: String,
        rate: BigRational,
    },
    /// The source failed to answer.
    #[error("exchange rate lookup for {from} -> {to} failed: {message}")]
    Provider {
        from: String,
        to: String,
        message: String,
    },
}

/// Supplies the rate to multiply a `from` amount by to get a `to` amount.
pub trait ExchangeRateSource {
    /// Looks up the current rate. Never called with `from == to`.
    fn fetch_rate(&self, from: &str, to: &str) -> Result<BigRational, RateError>;
}

/// Rates fixed up front, e.g. from configuration.
///
/// A pair is also answered by inverting its reverse pair. Unknown pairs go to
/// the fallback source, if any.
#[derive(Default)]
pub struct FixedRates {
    rates: HashMap<(String, String), BigRational>,
    fallback: Option<Box<dyn ExchangeRateSource + Send + Sync>>,
}

impl fmt::Debug for FixedRates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedRates")
            .field("rates", &self.rates)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl FixedRates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rate for one pair.
    #[must_use]
    pub fn with_rate(mut self, from: &str, to: &str, rate: BigRational) -> Self {
        self.insert(from, to, rate);
        self
    }

    /// Sets the source consulted for pairs not fixed here.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl ExchangeRateSource + Send + Sync + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn insert(&mut self, from: &str, to: &str, rate: BigRational) {
        self.rates
            .insert((from.to_ascii_uppercase(), to.to_ascii_uppercase()), rate);
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl ExchangeRateSource for FixedRates {
    fn fetch_rate(&self, from: &str, to: &str) -> Result<BigRational, RateError> {
        let from_key = from.to_ascii_uppercase();
        let to_key = to.to_ascii_uppercase();

        if let Some(rate) = self.rates.get(&(from_key.clone(), to_key.clone())) {
            return Ok(rate.clone());
        }
        if let Some(rate) = self.rates.get(&(to_key, from_key)) {
            if rate.is_positive() {
                return Ok(rate.recip());
            }
        }
        match &self.fallback {
            Some(fallback) => fallback.fetch_rate(from, to),
            None => Err(RateError::Unavailable {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }
}

/// Memoizing front for an [`ExchangeRateSource`].
///
/// The cache is guarded by a mutex, so one cache can be shared by reports
/// rendered on different threads.
pub struct RateCache {
    source: Box<dyn ExchangeRateSource + Send + Sync>,
    cache: Mutex<HashMap<(String, String), BigRational>>,
}

impl fmt::Debug for RateCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateCache")
            .field("cached", &self.lock().len())
            .finish_non_exhaustive()
    }
}

impl RateCache {
    pub fn new(source: impl ExchangeRateSource + Send + Sync + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, String), BigRational>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the rate converting `from` amounts into `to` amounts.
    ///
    /// Currency codes are case-insensitive. Identical currencies convert at
    /// exactly 1 without consulting the source.
    pub fn exchange_rate(&self, from: &str, to: &str) -> Result<BigRational, RateError> {
        let from = from.to_ascii_uppercase();
        let to = to.to_ascii_uppercase();
        if from == to {
            return Ok(BigRational::one());
        }

        let key = (from, to);
        if let Some(rate) = self.lock().get(&key) {
            return Ok(rate.clone());
        }

        let (from, to) = (key.0.as_str(), key.1.as_str());
        let rate = self.source.fetch_rate(from, to)?;
        if !rate.is_positive() {
            return Err(RateError::NonPositive {
                from: from.to_string(),
                to: to.to_string(),
                rate,
            });
        }
        tracing::debug!(from, to, %rate, "cached exchange rate");
        self.lock().insert(key, rate.clone());
        Ok(rate)
    }

    /// Converts an amount from one currency into another.
    pub fn convert(
        &self,
        amount: &BigRational,
        from: &str,
        to: &str,
    ) -> Result<BigRational, RateError> {
        Ok(amount * self.exchange_rate(from, to)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::money::ratio;

    /// Source that counts lookups and answers with a constant.
    struct CountingSource {
        calls: Arc<AtomicUsize>,
        rate: BigRational,
    }

    impl ExchangeRateSource for CountingSource {
        fn fetch_rate(&self, _from: &str, _to: &str) -> Result<BigRational, RateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rate.clone())
        }
    }

    fn counting(rate: BigRational) -> (CountingSource, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            CountingSource {
                calls: Arc::clone(&calls),
                rate,
            },
            calls,
        )
    }

    #[test]
    fn test_same_currency_is_one_without_lookup() {
        let (source, calls) = counting(ratio(2, 1));
        let cache = RateCache::new(source);

        assert_eq!(cache.exchange_rate("EUR", "EUR").unwrap(), ratio(1, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_currency_codes_ignore_case() {
        let (source, calls) = counting(ratio(9, 10));
        let cache = RateCache::new(source);

        assert_eq!(cache.exchange_rate("eur", "EUR").unwrap(), ratio(1, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(cache.exchange_rate("usd", "EUR").unwrap(), ratio(9, 10));
        assert_eq!(cache.exchange_rate("USD", "eur").unwrap(), ratio(9, 10));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rates_are_memoized_per_pair() {
        let (source, calls) = counting(ratio(9, 10));
        let cache = RateCache::new(source);

        for _ in 0..3 {
            assert_eq!(cache.exchange_rate("USD", "EUR").unwrap(), ratio(9, 10));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.exchange_rate("GBP", "EUR").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_non_positive_rate_rejected() {
        let (source, _) = counting(ratio(0, 1));
        let cache = RateCache::new(source);

        let err = cache.exchange_rate("USD", "EUR").unwrap_err();
        assert!(matches!(err, RateError::NonPositive { .. }));
    }

    #[test]
    fn test_convert_multiplies_exactly() {
        let cache = RateCache::new(FixedRates::new().with_rate("USD", "EUR", ratio(9, 10)));
        assert_eq!(
            cache.convert(&ratio(100, 3), "USD", "EUR").unwrap(),
            ratio(30, 1)
        );
    }

    #[test]
    fn test_fixed_rates_invert_reverse_pair() {
        let rates = FixedRates::new().with_rate("EUR", "USD", ratio(5, 4));
        assert_eq!(rates.fetch_rate("usd", "eur").unwrap(), ratio(4, 5));
    }

    #[test]
    fn test_fixed_rates_unknown_pair() {
        let rates = FixedRates::new();
        let err = rates.fetch_rate("USD", "CHF").unwrap_err();
        assert_eq!(err.to_string(), "no exchange rate available for USD -> CHF");
    }

    #[test]
    fn test_fixed_rates_fallback() {
        let (source, calls) = counting(ratio(11, 10));
        let rates = FixedRates::new()
            .with_rate("EUR", "USD", ratio(5, 4))
            .with_fallback(source);

        assert_eq!(rates.fetch_rate("EUR", "USD").unwrap(), ratio(5, 4));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(rates.fetch_rate("GBP", "EUR").unwrap(), ratio(11, 10));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
