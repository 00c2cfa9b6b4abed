use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Three-letter ISO-like currency code, always upper case.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for CurrencyCode {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let code = value.trim().to_ascii_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(EngineError::Validation(format!(
                "invalid currency code: {value:?}"
            )));
        }
        Ok(Self(code))
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.0
    }
}

/// Reference entry of the currency catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub code: CurrencyCode,
    pub name: String,
    pub symbol: String,
    /// Number of fraction digits used by amounts in this currency.
    pub minor_units: u8,
    pub active: bool,
}

/// `(code, name, symbol, minor units)` seeded on startup.
pub(crate) const CATALOG: &[(&str, &str, &str, u8)] = &[
    ("USD", "United States Dollar", "$", 2),
    ("EUR", "Euro", "€", 2),
    ("GBP", "British Pound Sterling", "£", 2),
    ("JPY", "Japanese Yen", "¥", 0),
    ("CNY", "Chinese Yuan", "¥", 2),
    ("PHP", "Philippine Peso", "₱", 2),
    ("CAD", "Canadian Dollar", "CA$", 2),
    ("AUD", "Australian Dollar", "A$", 2),
    ("CHF", "Swiss Franc", "CHF", 2),
    ("INR", "Indian Rupee", "₹", 2),
    ("KRW", "South Korean Won", "₩", 0),
    ("SGD", "Singapore Dollar", "S$", 2),
    ("HKD", "Hong Kong Dollar", "HK$", 2),
    ("MXN", "Mexican Peso", "MX$", 2),
    ("BRL", "Brazilian Real", "R$", 2),
    ("ZAR", "South African Rand", "R", 2),
    ("NZD", "New Zealand Dollar", "NZ$", 2),
    ("SEK", "Swedish Krona", "kr", 2),
    ("NOK", "Norwegian Krone", "kr", 2),
    ("DKK", "Danish Krone", "kr", 2),
    ("THB", "Thai Baht", "฿", 2),
    ("MYR", "Malaysian Ringgit", "RM", 2),
    ("IDR", "Indonesian Rupiah", "Rp", 2),
    ("VND", "Vietnamese Dong", "₫", 0),
];

/// Fraction digits for `code`, falling back to 2 for codes outside the catalog.
pub(crate) fn catalog_minor_units(code: &CurrencyCode) -> u8 {
    CATALOG
        .iter()
        .find(|(c, ..)| *c == code.as_str())
        .map_or(2, |(.., units)| *units)
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "currencies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,
    pub name: String,
    pub symbol: String,
    pub minor_units: i32,
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Currency> for ActiveModel {
    fn from(currency: &Currency) -> Self {
        Self {
            code: ActiveValue::Set(currency.code.to_string()),
            name: ActiveValue::Set(currency.name.clone()),
            symbol: ActiveValue::Set(currency.symbol.clone()),
            minor_units: ActiveValue::Set(i32::from(currency.minor_units)),
            active: ActiveValue::Set(currency.active),
        }
    }
}

impl TryFrom<Model> for Currency {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            code: CurrencyCode::try_from(model.code.as_str())?,
            name: model.name,
            symbol: model.symbol,
            minor_units: u8::try_from(model.minor_units).map_err(|_| {
                EngineError::Validation(format!("invalid minor units: {}", model.minor_units))
            })?,
            active: model.active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_normalized_to_upper_case() {
        let code = CurrencyCode::try_from(" eur ").unwrap();
        assert_eq!(code.as_str(), "EUR");
    }

    #[test]
    fn code_rejects_wrong_shapes() {
        assert!(CurrencyCode::try_from("EURO").is_err());
        assert!(CurrencyCode::try_from("E1R").is_err());
        assert!(CurrencyCode::try_from("").is_err());
    }

    #[test]
    fn catalog_knows_zero_decimal_currencies() {
        assert_eq!(catalog_minor_units(&CurrencyCode::try_from("JPY").unwrap()), 0);
        assert_eq!(catalog_minor_units(&CurrencyCode::try_from("EUR").unwrap()), 2);
        assert_eq!(catalog_minor_units(&CurrencyCode::try_from("XAU").unwrap()), 2);
        assert_eq!(CATALOG.len(), 24);
    }
}
