//! Extraction gateway.
//!
//! Wraps the external AI extraction call behind one contract: an
//! [`ImageSource`] goes in, either a validated [`Extraction`] or an
//! [`ExtractionError`] comes out. Transport, upstream and semantic failures all
//! share that single error shape. Gateways make exactly one attempt per call;
//! retrying is the caller's decision.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{EngineError, ExtractionError, Money, ResultEngine};

pub use gemini::GeminiExtractor;

mod gemini;

/// Calendar format every transaction date must use.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Where the receipt image comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSource {
    /// A fetchable URL; it is also stored as the receipt's image locator.
    Url(String),
    /// An in-memory payload; `locator` is the storage-relative reference kept on the receipt.
    Inline {
        locator: String,
        mime_type: String,
        bytes: Vec<u8>,
    },
}

impl ImageSource {
    pub fn locator(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::Inline { locator, .. } => locator,
        }
    }

    pub(crate) fn validate(&self) -> ResultEngine<()> {
        match self {
            Self::Url(url) => {
                let url = url.trim();
                if url.is_empty() {
                    return Err(EngineError::Validation(
                        "missing required field: image_url".to_string(),
                    ));
                }
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(EngineError::Validation(format!(
                        "image_url must be an http(s) URL: {url}"
                    )));
                }
            }
            Self::Inline {
                locator,
                mime_type,
                bytes,
            } => {
                if bytes.is_empty() {
                    return Err(EngineError::Validation("empty image payload".to_string()));
                }
                if locator.trim().is_empty() {
                    return Err(EngineError::Validation(
                        "missing image locator for inline payload".to_string(),
                    ));
                }
                if !mime_type.starts_with("image/") {
                    return Err(EngineError::Validation(format!(
                        "unsupported mime type: {mime_type}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Fields extracted from a receipt image, validated against the fixed schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedReceipt {
    pub vendor_name: String,
    pub receipt_number: Option<String>,
    /// Decimal text as returned by the model, e.g. `"12.5"`.
    pub total_amount: String,
    pub currency_code: Option<String>,
    pub transaction_date: NaiveDate,
    pub payer_name: Option<String>,
}

/// A successful extraction: the validated record and the raw model payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Extraction {
    pub receipt: ExtractedReceipt,
    pub raw: Value,
}

/// One best-effort extraction attempt.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, source: &ImageSource) -> Result<Extraction, ExtractionError>;
}

/// Wire shape of the model answer: every field optional so that schema
/// violations are reported by [`RawExtraction::validate`] instead of serde.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawExtraction {
    #[serde(alias = "vendor_name")]
    pub vendor_name: Option<String>,
    #[serde(alias = "receipt_number")]
    pub receipt_number: Option<String>,
    #[serde(alias = "total_amount")]
    pub total_amount: Option<Value>,
    #[serde(alias = "currency_code", alias = "currency")]
    pub currency_code: Option<String>,
    #[serde(alias = "transaction_date")]
    pub transaction_date: Option<String>,
    #[serde(alias = "payer_name")]
    pub payer_name: Option<String>,
}

impl RawExtraction {
    /// Lenient read of a stored payload; unknown shapes yield all-absent fields.
    pub(crate) fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub(crate) fn amount_text(&self) -> Option<String> {
        self.total_amount.as_ref().and_then(amount_text)
    }

    pub(crate) fn validate(self) -> Result<ExtractedReceipt, ExtractionError> {
        let total_amount = self.amount_text();
        let vendor_name = non_blank(self.vendor_name)
            .ok_or_else(|| ExtractionError::semantic("missing required field: vendorName"))?;
        let total_amount = total_amount
            .ok_or_else(|| ExtractionError::semantic("missing required field: totalAmount"))?;
        if !Money::is_decimal(&total_amount) {
            return Err(ExtractionError::semantic(format!(
                "totalAmount is not a decimal: {total_amount}"
            )));
        }
        let date = non_blank(self.transaction_date)
            .ok_or_else(|| ExtractionError::semantic("missing required field: transactionDate"))?;
        let transaction_date = NaiveDate::parse_from_str(&date, DATE_FORMAT).map_err(|_| {
            ExtractionError::semantic(format!("transactionDate is not YYYY-MM-DD: {date}"))
        })?;

        Ok(ExtractedReceipt {
            vendor_name,
            receipt_number: non_blank(self.receipt_number),
            total_amount,
            currency_code: non_blank(self.currency_code).map(|c| c.to_ascii_uppercase()),
            transaction_date,
            payer_name: non_blank(self.payer_name),
        })
    }
}

fn amount_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => non_blank(Some(s.clone())),
        _ => None,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Validate a JSON object produced by an extraction model.
pub fn validate_payload(raw: Value) -> Result<Extraction, ExtractionError> {
    if !raw.is_object() {
        return Err(ExtractionError::upstream(
            "model payload is not a JSON object",
        ));
    }
    let receipt = RawExtraction::from_value(&raw).validate()?;
    Ok(Extraction { receipt, raw })
}
