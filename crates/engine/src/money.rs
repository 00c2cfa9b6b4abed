use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Signed money amount represented as an integer number of **minor units**.
///
/// `scale` is the number of fraction digits of the currency the amount is
/// expressed in (2 for EUR cents, 0 for JPY). Keeping the scale next to the
/// value lets conversions between currencies with different minor units stay
/// exact on the source side.
///
/// # Examples
///
/// ```rust
/// use engine::Money;
///
/// let amount = Money::parse("12,5", 2).unwrap();
/// assert_eq!(amount.minor(), 1250);
/// assert_eq!(amount.to_string(), "12.50");
/// assert!(Money::parse("12.345", 2).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor: i64,
    scale: u8,
}

impl Money {
    /// Creates a new amount from integer minor units.
    #[must_use]
    pub const fn new(minor: i64, scale: u8) -> Self {
        Self { minor, scale }
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.minor
    }

    #[must_use]
    pub const fn scale(self) -> u8 {
        self.scale
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.minor > 0
    }

    /// The amount in major units as a float, for rate arithmetic only.
    #[must_use]
    pub fn as_major(self) -> f64 {
        self.minor as f64 / 10f64.powi(i32::from(self.scale))
    }

    /// Build an amount from major units, rounding half away from zero to `scale` digits.
    pub fn from_major(value: f64, scale: u8) -> ResultEngine<Self> {
        if !value.is_finite() {
            return Err(EngineError::Validation(format!(
                "amount is not a finite number: {value}"
            )));
        }
        let scaled = (value * 10f64.powi(i32::from(scale))).round();
        if scaled.abs() >= i64::MAX as f64 {
            return Err(EngineError::Validation("amount too large".to_string()));
        }
        Ok(Self::new(scaled as i64, scale))
    }

    /// Express the same numeric value with a different number of fraction digits.
    pub fn rescale(self, scale: u8) -> ResultEngine<Self> {
        if scale >= self.scale {
            let factor = 10i64
                .checked_pow(u32::from(scale - self.scale))
                .ok_or_else(|| EngineError::Validation("amount too large".to_string()))?;
            let minor = self
                .minor
                .checked_mul(factor)
                .ok_or_else(|| EngineError::Validation("amount too large".to_string()))?;
            return Ok(Self::new(minor, scale));
        }
        Self::from_major(self.as_major(), scale)
    }

    /// Returns `true` if `s` is a plain decimal [`Money::parse`] understands,
    /// whatever its number of fraction digits.
    #[must_use]
    pub fn is_decimal(s: &str) -> bool {
        split_decimal(s).is_ok()
    }

    /// Parses a decimal string into minor units of a currency with `scale` fraction digits.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    ///
    /// Validation rules:
    /// - at most `scale` significant fractional digits (trailing zeros are tolerated)
    /// - rejects empty/invalid strings, exponents included
    pub fn parse(s: &str, scale: u8) -> ResultEngine<Self> {
        let overflow = || EngineError::Validation("amount too large".to_string());
        let (negative, units_str, frac_str) = split_decimal(s)?;

        let significant = frac_str.trim_end_matches('0');
        if significant.len() > usize::from(scale) {
            return Err(EngineError::Validation(format!(
                "too many decimals: at most {scale} allowed"
            )));
        }

        let units: i64 = units_str.parse().map_err(|_| overflow())?;
        let mut frac: i64 = 0;
        for digit in significant
            .bytes()
            .chain(std::iter::repeat(b'0'))
            .take(usize::from(scale))
        {
            frac = frac * 10 + i64::from(digit - b'0');
        }

        let factor = 10i64.checked_pow(u32::from(scale)).ok_or_else(overflow)?;
        let total = units
            .checked_mul(factor)
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(overflow)?;

        let signed = if negative {
            total.checked_neg().ok_or_else(overflow)?
        } else {
            total
        };

        Ok(Self::new(signed, scale))
    }
}

/// Sign, integer digits and fraction digits of a decimal string.
fn split_decimal(s: &str) -> ResultEngine<(bool, &str, &str)> {
    let empty = || EngineError::Validation("empty amount".to_string());
    let invalid = || EngineError::Validation(format!("invalid amount: {s:?}"));

    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(empty());
    }

    let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
        (true, stripped)
    } else if let Some(stripped) = trimmed.strip_prefix('+') {
        (false, stripped)
    } else {
        (false, trimmed)
    };

    let rest = rest.trim();
    if rest.is_empty() {
        return Err(empty());
    }

    let mut parts = rest.split(['.', ',']);
    let units_str = parts.next().ok_or_else(invalid)?;
    let frac_str = parts.next().unwrap_or("");

    if parts.next().is_some() {
        return Err(invalid());
    }
    if units_str.is_empty() || !units_str.bytes().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if !frac_str.bytes().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    Ok((negative, units_str, frac_str))
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.minor < 0 { "-" } else { "" };
        let abs = self.minor.unsigned_abs();
        if self.scale == 0 {
            return write!(f, "{sign}{abs}");
        }
        let factor = 10u64.pow(u32::from(self.scale));
        let width = usize::from(self.scale);
        write!(
            f,
            "{sign}{}.{:0width$}",
            abs / factor,
            abs % factor,
            width = width
        )
    }
}
