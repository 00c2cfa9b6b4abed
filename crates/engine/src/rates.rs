//! Exchange rate cache.
//!
//! Keeps the append-only history of rate observations in the system-of-record
//! and converts amounts between currencies through the base currency. Two rate
//! rows are read independently for every conversion, never a stored cross rate.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::currency::{CATALOG, catalog_minor_units};
use crate::ops::with_tx;
use crate::{
    Currency, CurrencyCode, EngineError, ExchangeRate, Money, RateSettings, ResultEngine,
    currency, exchange_rates,
};

pub use source::{ExchangeRateApi, FixedRateSource, RateSource, RateSourceError};

mod source;

/// Outcome of a conversion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub amount: Money,
    /// Effective `from -> to` rate, rounded to 6 decimals.
    pub rate: f64,
    /// Age reference of the conversion: the older of the two rates used.
    pub rate_timestamp: DateTime<Utc>,
    /// The rate is older than the absolute staleness bound. Flagged, never blocked.
    pub stale: bool,
}

/// What a refresh did, per currency.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    pub inserted: usize,
    pub skipped_recent: usize,
    /// Active currencies the source did not quote (or quoted with an unusable value).
    pub missing: Vec<String>,
}

/// One usable leg of a conversion.
struct Leg {
    to_base: f64,
    from_base: f64,
    timestamp: Option<DateTime<Utc>>,
}

pub struct RateCache {
    database: DatabaseConnection,
    source: Arc<dyn RateSource>,
    settings: RateSettings,
    base: CurrencyCode,
    refresh_lock: Mutex<()>,
}

impl std::fmt::Debug for RateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateCache")
            .field("base", &self.base)
            .field("source", &self.source.name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn round_rate(rate: f64) -> f64 {
    (rate * 1_000_000.0).round() / 1_000_000.0
}

fn usable(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

impl RateCache {
    pub fn new(
        database: DatabaseConnection,
        source: Arc<dyn RateSource>,
        settings: RateSettings,
    ) -> ResultEngine<Self> {
        let base = CurrencyCode::try_from(settings.base_currency.as_str()).map_err(|_| {
            EngineError::Configuration(format!(
                "invalid base currency: {}",
                settings.base_currency
            ))
        })?;
        Ok(Self {
            database,
            source,
            settings,
            base,
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn base_currency(&self) -> &CurrencyCode {
        &self.base
    }

    pub fn settings(&self) -> &RateSettings {
        &self.settings
    }

    /// Insert the catalog entries that are not stored yet. Returns how many were added.
    pub async fn seed_currency_catalog(&self) -> ResultEngine<usize> {
        let existing: Vec<String> = currency::Entity::find()
            .all(&self.database)
            .await?
            .into_iter()
            .map(|m| m.code)
            .collect();

        let missing: Vec<currency::ActiveModel> = CATALOG
            .iter()
            .filter(|(code, ..)| !existing.iter().any(|c| c == code))
            .map(|(code, name, symbol, minor_units)| -> ResultEngine<currency::ActiveModel> {
                let entry = Currency {
                    code: CurrencyCode::try_from(*code)?,
                    name: (*name).to_string(),
                    symbol: (*symbol).to_string(),
                    minor_units: *minor_units,
                    active: true,
                };
                Ok(currency::ActiveModel::from(&entry))
            })
            .collect::<ResultEngine<_>>()?;

        let inserted = missing.len();
        if inserted > 0 {
            currency::Entity::insert_many(missing)
                .exec(&self.database)
                .await?;
            tracing::info!(inserted, "seeded currency catalog");
        }
        Ok(inserted)
    }

    pub async fn currencies(&self, active_only: bool) -> ResultEngine<Vec<Currency>> {
        let mut query = currency::Entity::find();
        if active_only {
            query = query.filter(currency::Column::Active.eq(true));
        }
        query
            .order_by_asc(currency::Column::Code)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Currency::try_from)
            .collect()
    }

    pub async fn currency(&self, code: &CurrencyCode) -> ResultEngine<Currency> {
        let model = currency::Entity::find_by_id(code.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("currency {code}")))?;
        Currency::try_from(model)
    }

    /// Fraction digits used for amounts in `code`.
    pub async fn minor_units(&self, code: &CurrencyCode) -> ResultEngine<u8> {
        match self.currency(code).await {
            Ok(currency) => Ok(currency.minor_units),
            Err(EngineError::NotFound(_)) => Ok(catalog_minor_units(code)),
            Err(err) => Err(err),
        }
    }

    /// Most recent observation for `code`, if any.
    pub async fn latest_rate(&self, code: &CurrencyCode) -> ResultEngine<Option<ExchangeRate>> {
        exchange_rates::Entity::find()
            .filter(exchange_rates::Column::CurrencyCode.eq(code.as_str()))
            .order_by_desc(exchange_rates::Column::Timestamp)
            .order_by_desc(exchange_rates::Column::Id)
            .one(&self.database)
            .await?
            .map(ExchangeRate::try_from)
            .transpose()
    }

    /// Latest observation of every active currency that has one.
    pub async fn latest_rates(&self) -> ResultEngine<Vec<ExchangeRate>> {
        let mut rates = Vec::new();
        for currency in self.currencies(true).await? {
            if let Some(rate) = self.latest_rate(&currency.code).await? {
                rates.push(rate);
            }
        }
        Ok(rates)
    }

    async fn newest_timestamp(&self) -> ResultEngine<Option<DateTime<Utc>>> {
        Ok(exchange_rates::Entity::find()
            .order_by_desc(exchange_rates::Column::Timestamp)
            .one(&self.database)
            .await?
            .map(|m| m.timestamp))
    }

    /// `true` when the newest stored rate is older than `max_age_hours`, or nothing is stored.
    pub async fn is_stale(&self, max_age_hours: i64) -> ResultEngine<bool> {
        Ok(match self.newest_timestamp().await? {
            Some(newest) => Utc::now() - newest > Duration::hours(max_age_hours),
            None => true,
        })
    }

    /// Append one observation taken at `timestamp`.
    pub async fn record_rate(
        &self,
        code: &CurrencyCode,
        rate_from_base: f64,
        source: &str,
        timestamp: DateTime<Utc>,
    ) -> ResultEngine<ExchangeRate> {
        if !usable(rate_from_base) {
            return Err(EngineError::Validation(format!(
                "rate for {code} must be a positive number"
            )));
        }
        if *code == self.base && rate_from_base != 1.0 {
            return Err(EngineError::Validation(format!(
                "base currency {code} is pinned to 1.0"
            )));
        }
        let model = exchange_rates::ActiveModel::observation(code, rate_from_base, source, timestamp)
            .insert(&self.database)
            .await?;
        ExchangeRate::try_from(model)
    }

    async fn leg(&self, code: &CurrencyCode) -> ResultEngine<Leg> {
        match self.latest_rate(code).await? {
            Some(rate) if usable(rate.rate_to_base) && usable(rate.rate_from_base) => Ok(Leg {
                to_base: rate.rate_to_base,
                from_base: rate.rate_from_base,
                timestamp: Some(rate.timestamp),
            }),
            _ if *code == self.base => Ok(Leg {
                to_base: 1.0,
                from_base: 1.0,
                timestamp: None,
            }),
            _ => Err(EngineError::RateUnavailable(format!(
                "no exchange rate stored for {code}"
            ))),
        }
    }

    /// Convert `amount` (expressed in `from`) to `to`.
    ///
    /// The result is rounded to the minor units of `to`. Same-currency
    /// conversions are exact and report rate `1.0` at the current time.
    pub async fn convert(
        &self,
        amount: Money,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> ResultEngine<Conversion> {
        let now = Utc::now();
        if from == to {
            return Ok(Conversion {
                amount,
                rate: 1.0,
                rate_timestamp: now,
                stale: false,
            });
        }

        let from_leg = self.leg(from).await?;
        let to_leg = self.leg(to).await?;
        let scale = self.minor_units(to).await?;

        let factor = from_leg.to_base * to_leg.from_base;
        let converted = Money::from_major(amount.as_major() * factor, scale)?;
        let rate_timestamp = match (from_leg.timestamp, to_leg.timestamp) {
            (Some(a), Some(b)) => a.min(b),
            (Some(t), None) | (None, Some(t)) => t,
            (None, None) => now,
        };
        let stale = now - rate_timestamp > Duration::hours(self.settings.max_rate_age_hours);
        if stale {
            tracing::warn!(%from, %to, %rate_timestamp, "converting with stale exchange rate");
        }

        Ok(Conversion {
            amount: converted,
            rate: round_rate(factor),
            rate_timestamp,
            stale,
        })
    }

    /// Fetch the source once and append a row for every active currency
    /// without a recent observation.
    ///
    /// Concurrent refreshes are serialized; the dedup window check runs after
    /// the lock is taken so a second refresh sees the rows of the first.
    pub async fn refresh_rates(&self) -> ResultEngine<RefreshReport> {
        let _guard = self.refresh_lock.lock().await;

        let quotes = self.source.fetch(&self.base).await.map_err(|e| {
            tracing::warn!(error = %e, source = self.source.name(), "rate refresh failed");
            EngineError::RateUnavailable(e.to_string())
        })?;
        let active = self.currencies(true).await?;
        let now = Utc::now();
        let window_start = now - Duration::hours(self.settings.dedup_window_hours());
        let source = self.source.name().to_string();

        let report = with_tx!(self, |db_tx| {
            let mut report = RefreshReport::default();
            for currency in &active {
                let code = &currency.code;
                let recent = exchange_rates::Entity::find()
                    .filter(exchange_rates::Column::CurrencyCode.eq(code.as_str()))
                    .filter(exchange_rates::Column::Timestamp.gte(window_start))
                    .one(&db_tx)
                    .await?;
                if recent.is_some() {
                    report.skipped_recent += 1;
                    continue;
                }

                let rate = if *code == self.base {
                    Some(1.0)
                } else {
                    quotes.get(code.as_str()).copied().filter(|r| usable(*r))
                };
                let Some(rate) = rate else {
                    tracing::warn!(currency = %code, "rate source has no usable rate, skipping");
                    report.missing.push(code.to_string());
                    continue;
                };

                exchange_rates::ActiveModel::observation(code, rate, &source, now)
                    .insert(&db_tx)
                    .await?;
                report.inserted += 1;
            }
            Ok::<_, EngineError>(report)
        })?;

        tracing::info!(
            inserted = report.inserted,
            skipped_recent = report.skipped_recent,
            missing = report.missing.len(),
            "exchange rates refreshed"
        );
        Ok(report)
    }

    /// Boolean form of [`RateCache::refresh_rates`]: `false` when the source or the store failed.
    pub async fn refresh(&self) -> bool {
        match self.refresh_rates().await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(error = %err, "exchange rate refresh did not complete");
                false
            }
        }
    }

    /// Refresh only when the newest stored rate is older than the refresh threshold.
    pub async fn refresh_if_due(&self) -> ResultEngine<Option<RefreshReport>> {
        if !self.is_stale(self.settings.refresh_threshold_hours).await? {
            tracing::debug!("exchange rates are fresh, refresh not due");
            return Ok(None);
        }
        self.refresh_rates().await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_are_rounded_to_six_decimals() {
        assert_eq!(round_rate(1.080_000_4), 1.08);
        assert_eq!(round_rate(0.925_925_925), 0.925_926);
    }

    #[test]
    fn unusable_rates() {
        assert!(!usable(0.0));
        assert!(!usable(-1.0));
        assert!(!usable(f64::NAN));
        assert!(!usable(f64::INFINITY));
        assert!(usable(0.0001));
    }
}
