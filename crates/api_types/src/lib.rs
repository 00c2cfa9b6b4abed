//! Request and response bodies of the HTTP surface.
//!
//! Field names are camelCase on the wire, matching the extraction schema.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A decimal amount as sent by clients: either a JSON number or a string.
///
/// Strings are kept verbatim so the engine decides whether they parse.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Number(serde_json::Number),
    Text(String),
}

impl Amount {
    pub fn to_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

pub mod error {
    use super::*;

    /// Body of every non-2xx response.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ErrorBody {
        /// Machine-readable error kind, e.g. `invalid_state_transition`.
        pub kind: String,
        pub message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub receipt_id: Option<i64>,
    }
}

pub mod receipt {
    use super::*;

    /// Exactly one of `imageUrl` and `imageBase64` must be set.
    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct UploadReceipt {
        pub image_url: Option<String>,
        pub image_base64: Option<String>,
        pub mime_type: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ReceiptView {
        pub id: i64,
        pub uploader_id: i64,
        pub image_url: String,
        pub status: String,
        pub raw_ai_data: Option<Value>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ExtractedView {
        pub vendor_name: String,
        pub receipt_number: Option<String>,
        pub total_amount: String,
        pub currency_code: Option<String>,
        pub transaction_date: NaiveDate,
        pub payer_name: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct UploadResponse {
        pub receipt: ReceiptView,
        pub extracted: ExtractedView,
    }

    /// Confirmation overrides. Missing fields fall back to the extraction.
    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ConfirmReceipt {
        pub vendor_name: Option<String>,
        pub receipt_number: Option<String>,
        pub total_amount: Option<Amount>,
        pub currency_code: Option<String>,
        pub transaction_date: Option<String>,
        pub payer_name: Option<String>,
        pub description: Option<String>,
        /// Store the unconverted amount when no exchange rate is available.
        #[serde(default)]
        pub fallback_to_original: bool,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct RejectReceipt {
        pub reason: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReceiptDetails {
        pub receipt: ReceiptView,
        pub transaction: Option<super::transaction::TransactionView>,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TransactionView {
        pub id: i64,
        pub receipt_id: i64,
        pub vendor_name: String,
        pub receipt_number: Option<String>,
        pub original_amount: String,
        pub original_currency: String,
        pub total_amount: String,
        pub currency: String,
        pub exchange_rate_used: Option<f64>,
        pub rate_timestamp: Option<DateTime<Utc>>,
        pub rate_stale: bool,
        /// `same_currency`, `converted` or `fallback_unconverted`.
        pub normalization: String,
        pub transaction_date: NaiveDate,
        pub payer_id: Option<i64>,
        pub payer_name: Option<String>,
        pub description: Option<String>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionListResponse {
        pub transactions: Vec<TransactionView>,
    }
}

pub mod archive {
    use super::*;

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ArchiveReceipt {
        pub reason: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ArchiveResponse {
        /// `archived`, `already_archived`, `unarchived` or `not_archived`.
        pub outcome: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BulkArchive {
        pub days: Option<i64>,
        pub owner_id: Option<i64>,
        pub reason: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BulkArchiveResponse {
        pub archived: u64,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DocumentsQuery {
        #[serde(default)]
        pub include_archived: bool,
        pub limit: Option<u64>,
        pub offset: Option<u64>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SearchQuery {
        pub q: String,
        #[serde(default)]
        pub include_archived: bool,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ArchivedQuery {
        pub days_old: Option<i64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DocumentView {
        pub receipt_id: i64,
        pub owner_id: i64,
        pub image_url: String,
        pub status: String,
        pub vendor_name: Option<String>,
        pub receipt_number: Option<String>,
        pub total_amount: Option<String>,
        pub currency: Option<String>,
        pub transaction_date: Option<NaiveDate>,
        pub payer_name: Option<String>,
        pub transaction_id: Option<i64>,
        pub tags: Vec<String>,
        pub archived: bool,
        pub archived_at: Option<DateTime<Utc>>,
        pub archive_reason: Option<String>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DocumentListResponse {
        pub documents: Vec<DocumentView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MirrorStats {
        pub total: u64,
        pub archived: u64,
        pub active: u64,
        pub pending: u64,
        pub processed: u64,
    }
}

pub mod rates {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CurrencyView {
        pub code: String,
        pub name: String,
        pub symbol: String,
        pub minor_units: u8,
        pub active: bool,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CurrenciesQuery {
        #[serde(default)]
        pub include_inactive: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CurrenciesResponse {
        pub currencies: Vec<CurrencyView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RateView {
        pub currency: String,
        pub rate_to_base: f64,
        pub rate_from_base: f64,
        pub source: String,
        pub timestamp: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RatesResponse {
        pub base_currency: String,
        pub rates: Vec<RateView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ConvertQuery {
        pub amount: String,
        pub from: String,
        pub to: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ConversionView {
        pub amount: String,
        pub currency: String,
        pub rate: f64,
        pub rate_timestamp: DateTime<Utc>,
        pub stale: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RefreshResponse {
        pub inserted: usize,
        pub skipped_recent: usize,
        pub missing: Vec<String>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_accepts_numbers_and_text() {
        let parsed: receipt::ConfirmReceipt =
            serde_json::from_str(r#"{"totalAmount": 12.50}"#).unwrap();
        assert_eq!(parsed.total_amount.unwrap().to_text(), "12.5");

        let parsed: receipt::ConfirmReceipt =
            serde_json::from_str(r#"{"totalAmount": "not-a-number"}"#).unwrap();
        assert_eq!(parsed.total_amount.unwrap().to_text(), "not-a-number");
        assert!(!parsed.fallback_to_original);
    }

    #[test]
    fn error_body_omits_missing_receipt_id() {
        let body = error::ErrorBody {
            kind: "not_found".to_string(),
            message: "receipt 9".to_string(),
            receipt_id: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "not_found", "message": "receipt 9"}));
    }
}
