//! Transaction primitives.
//!
//! A `Transaction` is the confirmed, currency-normalized financial record of a
//! receipt. At most one exists per receipt and it is never updated.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{CurrencyCode, EngineError, Money, ResultEngine};

/// How the normalized amount was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Original currency already is the base currency.
    SameCurrency,
    /// Converted with stored exchange rates.
    Converted,
    /// No rate was available and the caller accepted the original amount as-is.
    FallbackUnconverted,
}

impl Normalization {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SameCurrency => "same_currency",
            Self::Converted => "converted",
            Self::FallbackUnconverted => "fallback_unconverted",
        }
    }
}

impl TryFrom<&str> for Normalization {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "same_currency" => Ok(Self::SameCurrency),
            "converted" => Ok(Self::Converted),
            "fallback_unconverted" => Ok(Self::FallbackUnconverted),
            other => Err(EngineError::Validation(format!(
                "invalid normalization: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub receipt_id: i64,
    pub vendor_name: String,
    pub receipt_number: Option<String>,
    pub original_amount: Money,
    pub original_currency: CurrencyCode,
    /// Amount in the base currency.
    pub total_amount: Money,
    pub currency: CurrencyCode,
    pub exchange_rate_used: Option<f64>,
    pub rate_timestamp: Option<DateTime<Utc>>,
    pub rate_stale: bool,
    pub normalization: Normalization,
    pub transaction_date: NaiveDate,
    pub payer_id: Option<i64>,
    pub payer_name: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub receipt_id: i64,
    pub vendor_name: String,
    pub receipt_number: Option<String>,
    pub original_amount_minor: i64,
    pub original_currency: String,
    pub original_scale: i32,
    pub total_amount_minor: i64,
    pub currency: String,
    pub scale: i32,
    pub exchange_rate_used: Option<f64>,
    pub rate_timestamp: Option<DateTimeUtc>,
    pub rate_stale: bool,
    pub normalization: String,
    pub transaction_date: Date,
    pub payer_id: Option<i64>,
    pub payer_name: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::receipts::Entity",
        from = "Column::ReceiptId",
        to = "super::receipts::Column::Id"
    )]
    Receipt,
}

impl Related<super::receipts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Receipt.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::NotSet,
            receipt_id: ActiveValue::Set(tx.receipt_id),
            vendor_name: ActiveValue::Set(tx.vendor_name.clone()),
            receipt_number: ActiveValue::Set(tx.receipt_number.clone()),
            original_amount_minor: ActiveValue::Set(tx.original_amount.minor()),
            original_currency: ActiveValue::Set(tx.original_currency.to_string()),
            original_scale: ActiveValue::Set(i32::from(tx.original_amount.scale())),
            total_amount_minor: ActiveValue::Set(tx.total_amount.minor()),
            currency: ActiveValue::Set(tx.currency.to_string()),
            scale: ActiveValue::Set(i32::from(tx.total_amount.scale())),
            exchange_rate_used: ActiveValue::Set(tx.exchange_rate_used),
            rate_timestamp: ActiveValue::Set(tx.rate_timestamp),
            rate_stale: ActiveValue::Set(tx.rate_stale),
            normalization: ActiveValue::Set(tx.normalization.as_str().to_string()),
            transaction_date: ActiveValue::Set(tx.transaction_date),
            payer_id: ActiveValue::Set(tx.payer_id),
            payer_name: ActiveValue::Set(tx.payer_name.clone()),
            description: ActiveValue::Set(tx.description.clone()),
            created_at: ActiveValue::Set(tx.created_at),
        }
    }
}

fn stored_scale(value: i32) -> ResultEngine<u8> {
    u8::try_from(value)
        .map_err(|_| EngineError::Validation(format!("invalid stored scale: {value}")))
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: model.id,
            receipt_id: model.receipt_id,
            vendor_name: model.vendor_name,
            receipt_number: model.receipt_number,
            original_amount: Money::new(
                model.original_amount_minor,
                stored_scale(model.original_scale)?,
            ),
            original_currency: CurrencyCode::try_from(model.original_currency.as_str())?,
            total_amount: Money::new(model.total_amount_minor, stored_scale(model.scale)?),
            currency: CurrencyCode::try_from(model.currency.as_str())?,
            exchange_rate_used: model.exchange_rate_used,
            rate_timestamp: model.rate_timestamp,
            rate_stale: model.rate_stale,
            normalization: Normalization::try_from(model.normalization.as_str())?,
            transaction_date: model.transaction_date,
            payer_id: model.payer_id,
            payer_name: model.payer_name,
            description: model.description,
            created_at: model.created_at,
        })
    }
}
