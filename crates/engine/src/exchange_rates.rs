//! Exchange rate observations.
//!
//! Rows are append-only: every refresh inserts a new observation per
//! currency and older rows are kept as history.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{CurrencyCode, EngineError, ResultEngine};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub id: i64,
    pub currency: CurrencyCode,
    /// Units of base currency for one unit of `currency`.
    pub rate_to_base: f64,
    /// Units of `currency` for one unit of base currency.
    pub rate_from_base: f64,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "exchange_rates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub currency_code: String,
    pub rate_to_base: f64,
    pub rate_from_base: f64,
    pub source: String,
    pub timestamp: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn observation(
        currency: &CurrencyCode,
        rate_from_base: f64,
        source: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ActiveValue::NotSet,
            currency_code: ActiveValue::Set(currency.to_string()),
            rate_to_base: ActiveValue::Set(1.0 / rate_from_base),
            rate_from_base: ActiveValue::Set(rate_from_base),
            source: ActiveValue::Set(source.to_string()),
            timestamp: ActiveValue::Set(timestamp),
        }
    }
}

impl TryFrom<Model> for ExchangeRate {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: model.id,
            currency: CurrencyCode::try_from(model.currency_code.as_str())?,
            rate_to_base: model.rate_to_base,
            rate_from_base: model.rate_from_base,
            source: model.source,
            timestamp: model.timestamp,
        })
    }
}
