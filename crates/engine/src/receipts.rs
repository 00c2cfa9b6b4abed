//! Receipt primitives.
//!
//! A `Receipt` is created for every upload attempt and walks the lifecycle
//! described by [`ReceiptStatus`]. Rows are never deleted.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptStatus {
    PendingConfirmation,
    Processed,
    Error,
    ErrorDataParse,
    Cancelled,
    Rejected,
}

impl ReceiptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingConfirmation => "PENDING_CONFIRMATION",
            Self::Processed => "PROCESSED",
            Self::Error => "ERROR",
            Self::ErrorDataParse => "ERROR_DATA_PARSE",
            Self::Cancelled => "CANCELLED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::PendingConfirmation)
    }

    /// Every legal transition leaves `PENDING_CONFIRMATION`.
    pub fn can_transition_to(self, next: ReceiptStatus) -> bool {
        self == Self::PendingConfirmation && next != Self::PendingConfirmation
    }
}

impl core::fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ReceiptStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, EngineError> {
        match value {
            "PENDING_CONFIRMATION" => Ok(Self::PendingConfirmation),
            "PROCESSED" => Ok(Self::Processed),
            "ERROR" => Ok(Self::Error),
            "ERROR_DATA_PARSE" => Ok(Self::ErrorDataParse),
            "CANCELLED" => Ok(Self::Cancelled),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(EngineError::Validation(format!(
                "invalid receipt status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: i64,
    pub uploader_id: i64,
    pub image_url: String,
    pub status: ReceiptStatus,
    /// Raw extraction payload plus any rejection or parse-failure notes.
    pub raw_payload: Option<Json>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "receipts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub uploader_id: i64,
    pub image_url: String,
    pub status: String,
    pub raw_ai_data: Option<Json>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::transactions::Entity")]
    Transaction,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    /// A fresh `PENDING_CONFIRMATION` row; the id is assigned by the database.
    pub(crate) fn pending(uploader_id: i64, image_url: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: ActiveValue::NotSet,
            uploader_id: ActiveValue::Set(uploader_id),
            image_url: ActiveValue::Set(image_url.to_string()),
            status: ActiveValue::Set(ReceiptStatus::PendingConfirmation.as_str().to_string()),
            raw_ai_data: ActiveValue::Set(None),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        }
    }
}

impl TryFrom<Model> for Receipt {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: model.id,
            uploader_id: model.uploader_id,
            image_url: model.image_url,
            status: ReceiptStatus::try_from(model.status.as_str())?,
            raw_payload: model.raw_ai_data,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_has_outgoing_transitions() {
        use ReceiptStatus::*;
        let all = [
            PendingConfirmation,
            Processed,
            Error,
            ErrorDataParse,
            Cancelled,
            Rejected,
        ];
        for from in all {
            for to in all {
                let expected = from == PendingConfirmation && to != PendingConfirmation;
                assert_eq!(from.can_transition_to(to), expected, "{from} -> {to}");
            }
            assert_eq!(from.is_terminal(), from != PendingConfirmation);
        }
    }

    #[test]
    fn status_round_trips_through_storage_string() {
        for status in [
            ReceiptStatus::Error,
            ReceiptStatus::ErrorDataParse,
            ReceiptStatus::Cancelled,
        ] {
            assert_eq!(ReceiptStatus::try_from(status.as_str()).unwrap(), status);
        }
        assert!(ReceiptStatus::try_from("PENDING").is_err());
    }
}
