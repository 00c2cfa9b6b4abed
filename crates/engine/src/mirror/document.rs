//! Mirror document: one denormalized row per receipt in the document store.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{EngineError, Receipt, ReceiptStatus, ResultEngine};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReceiptDocument {
    pub receipt_id: i64,
    pub owner_id: i64,
    pub image_url: String,
    pub status: ReceiptStatus,
    pub vendor_name: Option<String>,
    pub receipt_number: Option<String>,
    pub total_amount: Option<String>,
    pub currency: Option<String>,
    pub transaction_date: Option<NaiveDate>,
    pub payer_name: Option<String>,
    pub transaction_id: Option<i64>,
    pub extracted: Option<Value>,
    pub tags: Vec<String>,
    pub archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub archive_reason: Option<String>,
    pub archived_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update of a mirror document. `None` leaves the field untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentPatch {
    pub status: Option<ReceiptStatus>,
    pub vendor_name: Option<String>,
    pub receipt_number: Option<String>,
    pub total_amount: Option<String>,
    pub currency: Option<String>,
    pub transaction_date: Option<NaiveDate>,
    pub payer_name: Option<String>,
    pub transaction_id: Option<i64>,
    pub extracted: Option<Value>,
    pub tags: Option<Vec<String>>,
}

impl DocumentPatch {
    pub fn status(status: ReceiptStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "receipt_documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub receipt_id: i64,
    pub owner_id: i64,
    pub image_url: String,
    pub status: String,
    pub vendor_name: Option<String>,
    pub receipt_number: Option<String>,
    pub total_amount: Option<String>,
    pub currency: Option<String>,
    pub transaction_date: Option<Date>,
    pub payer_name: Option<String>,
    pub transaction_id: Option<i64>,
    pub extracted: Option<Json>,
    pub tags: Json,
    pub archived: bool,
    pub archived_at: Option<DateTimeUtc>,
    pub archive_reason: Option<String>,
    pub archived_by: Option<i64>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn from_receipt(receipt: &Receipt, now: DateTime<Utc>) -> Self {
        Self {
            receipt_id: ActiveValue::Set(receipt.id),
            owner_id: ActiveValue::Set(receipt.uploader_id),
            image_url: ActiveValue::Set(receipt.image_url.clone()),
            status: ActiveValue::Set(receipt.status.as_str().to_string()),
            vendor_name: ActiveValue::Set(None),
            receipt_number: ActiveValue::Set(None),
            total_amount: ActiveValue::Set(None),
            currency: ActiveValue::Set(None),
            transaction_date: ActiveValue::Set(None),
            payer_name: ActiveValue::Set(None),
            transaction_id: ActiveValue::Set(None),
            extracted: ActiveValue::Set(receipt.raw_payload.clone()),
            tags: ActiveValue::Set(Value::Array(Vec::new())),
            archived: ActiveValue::Set(false),
            archived_at: ActiveValue::Set(None),
            archive_reason: ActiveValue::Set(None),
            archived_by: ActiveValue::Set(None),
            created_at: ActiveValue::Set(receipt.created_at),
            updated_at: ActiveValue::Set(now),
        }
    }

    pub(crate) fn apply(&mut self, patch: DocumentPatch, now: DateTime<Utc>) {
        if let Some(status) = patch.status {
            self.status = ActiveValue::Set(status.as_str().to_string());
        }
        if let Some(value) = patch.vendor_name {
            self.vendor_name = ActiveValue::Set(Some(value));
        }
        if let Some(value) = patch.receipt_number {
            self.receipt_number = ActiveValue::Set(Some(value));
        }
        if let Some(value) = patch.total_amount {
            self.total_amount = ActiveValue::Set(Some(value));
        }
        if let Some(value) = patch.currency {
            self.currency = ActiveValue::Set(Some(value));
        }
        if let Some(value) = patch.transaction_date {
            self.transaction_date = ActiveValue::Set(Some(value));
        }
        if let Some(value) = patch.payer_name {
            self.payer_name = ActiveValue::Set(Some(value));
        }
        if let Some(value) = patch.transaction_id {
            self.transaction_id = ActiveValue::Set(Some(value));
        }
        if let Some(value) = patch.extracted {
            self.extracted = ActiveValue::Set(Some(value));
        }
        if let Some(tags) = patch.tags {
            self.tags = ActiveValue::Set(Value::from(tags));
        }
        self.updated_at = ActiveValue::Set(now);
    }
}

impl TryFrom<Model> for ReceiptDocument {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        let tags = match model.tags {
            Value::Array(values) => values
                .into_iter()
                .filter_map(|v| v.as_str().map(ToString::to_string))
                .collect(),
            _ => Vec::new(),
        };
        Ok(Self {
            receipt_id: model.receipt_id,
            owner_id: model.owner_id,
            image_url: model.image_url,
            status: ReceiptStatus::try_from(model.status.as_str())?,
            vendor_name: model.vendor_name,
            receipt_number: model.receipt_number,
            total_amount: model.total_amount,
            currency: model.currency,
            transaction_date: model.transaction_date,
            payer_name: model.payer_name,
            transaction_id: model.transaction_id,
            extracted: model.extracted,
            tags,
            archived: model.archived,
            archived_at: model.archived_at,
            archive_reason: model.archive_reason,
            archived_by: model.archived_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
