//! Exact rational helpers for hours and money.
//!
//! Hours, rates and costs stay [`BigRational`] through every arithmetic step.
//! Rounding to cents happens once, when a value leaves the ledger for output.

use std::cmp::Ordering;
use std::str::FromStr;

use num::{BigInt, BigRational, Integer, One, Signed, ToPrimitive, Zero};
use thiserror::Error;

/// Largest decimal exponent accepted by [`parse_decimal`].
const MAX_EXPONENT: u32 = 64;

/// Error parsing a decimal string into a rational.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseDecimalError {
    /// The input was empty or whitespace-only.
    #[error("empty decimal value")]
    Empty,
    /// The input was not a plain decimal number.
    #[error("invalid decimal value: {0}")]
    Invalid(String),
}

/// Parses a decimal string (`"75"`, `"0.75"`, `"-1.5"`, `"2.5e-1"`) exactly.
///
/// `0.1` becomes `1/10`, not the nearest binary float.
pub fn parse_decimal(s: &str) -> Result<BigRational, ParseDecimalError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ParseDecimalError::Empty);
    }
    let invalid = || ParseDecimalError::Invalid(s.to_string());

    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(idx) => {
            let exponent: i32 = s[idx + 1..].parse().map_err(|_| invalid())?;
            (&s[..idx], exponent)
        }
        None => (s, 0),
    };
    if exponent.unsigned_abs() > MAX_EXPONENT {
        return Err(invalid());
    }

    let (negative, digits) = match mantissa.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, mantissa.strip_prefix('+').unwrap_or(mantissa)),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !int_part
        .chars()
        .chain(frac_part.chars())
        .all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let numer = BigInt::from_str(&format!("{int_part}{frac_part}")).map_err(|_| invalid())?;
    let frac_len = i32::try_from(frac_part.len()).map_err(|_| invalid())?;
    let scale = frac_len - exponent;
    let ten = BigInt::from(10);
    let value = if scale >= 0 {
        BigRational::new(numer, ten.pow(scale.unsigned_abs()))
    } else {
        BigRational::from_integer(numer * ten.pow(scale.unsigned_abs()))
    };

    Ok(if negative { -value } else { value })
}

/// Builds `numer / denom` from machine integers.
pub fn ratio(numer: i64, denom: i64) -> BigRational {
    BigRational::new(BigInt::from(numer), BigInt::from(denom))
}

/// Rounds to `decimals` places, ties to even.
pub fn round_to(value: &BigRational, decimals: u32) -> BigRational {
    let scale = BigRational::from_integer(BigInt::from(10).pow(decimals));
    let scaled = value * &scale;
    let floor = scaled.floor();
    let half = ratio(1, 2);

    let rounded = match (&scaled - &floor).cmp(&half) {
        Ordering::Less => floor,
        Ordering::Greater => floor + BigRational::one(),
        Ordering::Equal => {
            if floor.to_integer().is_even() {
                floor
            } else {
                floor + BigRational::one()
            }
        }
    };
    rounded / scale
}

/// Rounds a money amount to cents. Only call this at the output boundary.
pub fn round_cents(value: &BigRational) -> BigRational {
    round_to(value, 2)
}

/// Formats with exactly `decimals` fractional digits (`375` -> `"375.00"`).
pub fn format_fixed(value: &BigRational, decimals: u32) -> String {
    let scale = BigRational::from_integer(BigInt::from(10).pow(decimals));
    let scaled = (round_to(value, decimals) * scale).to_integer();
    let sign = if scaled.is_negative() { "-" } else { "" };
    let digits = scaled.abs().to_string();
    if decimals == 0 {
        return format!("{sign}{digits}");
    }

    let places = decimals as usize;
    let padded = format!("{digits:0>width$}", width = places + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - places);
    format!("{sign}{int_part}.{frac_part}")
}

/// Formats like [`format_fixed`] but drops trailing zeros (`1.50` -> `"1.5"`).
pub fn format_trimmed(value: &BigRational, decimals: u32) -> String {
    let fixed = format_fixed(value, decimals);
    if !fixed.contains('.') {
        return fixed;
    }
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Converts to the nearest `f64` for serialization.
pub fn to_f64(value: &BigRational) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// Returns true if `a` and `b` differ by at most `tolerance`.
pub fn within(a: &BigRational, b: &BigRational, tolerance: &BigRational) -> bool {
    (a - b).abs() <= *tolerance
}

/// Zero as a rational.
pub fn zero() -> BigRational {
    BigRational::zero()
}
