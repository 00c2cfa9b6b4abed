use chrono::{NaiveDate, Utc};
use sea_orm::{TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::AuditAction;
use crate::extraction::{DATE_FORMAT, RawExtraction};
use crate::mirror::DocumentPatch;
use crate::{
    CurrencyCode, EngineError, Money, Normalization, Principal, ReceiptStatus, ResultEngine,
    Transaction, receipts, transactions,
};

use super::{
    Engine, annotate, mirror_outcome, normalize_optional_text, not_pending, require_pending,
    transition, with_tx,
};

/// What to do when no exchange rate is available at confirmation time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionPolicy {
    /// Abort the confirmation; the receipt stays pending.
    #[default]
    Strict,
    /// Store the original amount as the base amount, marked `fallback_unconverted`.
    FallbackToOriginal,
}

/// User-reviewed fields. Absent fields fall back to the stored extraction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmReceipt {
    pub vendor_name: Option<String>,
    pub receipt_number: Option<String>,
    /// Decimal text, `.` or `,` as separator.
    pub total_amount: Option<String>,
    pub currency_code: Option<String>,
    /// `YYYY-MM-DD`.
    pub transaction_date: Option<String>,
    pub payer_name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub conversion: ConversionPolicy,
}

/// Confirmation data after merging with the extraction and checking presence.
struct MergedFields {
    vendor_name: String,
    receipt_number: Option<String>,
    total_amount: String,
    currency: Option<String>,
    transaction_date: String,
    payer_name: Option<String>,
}

fn merge(input: &ConfirmReceipt, extracted: RawExtraction) -> ResultEngine<MergedFields> {
    let pick = |confirmed: &Option<String>, stored: Option<String>| {
        normalize_optional_text(confirmed.as_deref())
            .or_else(|| normalize_optional_text(stored.as_deref()))
    };
    let missing = |field: &str| EngineError::Validation(format!("missing required field: {field}"));

    let total_amount = normalize_optional_text(input.total_amount.as_deref())
        .or_else(|| extracted.amount_text())
        .ok_or_else(|| missing("totalAmount"))?;
    Ok(MergedFields {
        vendor_name: pick(&input.vendor_name, extracted.vendor_name)
            .ok_or_else(|| missing("vendorName"))?,
        receipt_number: pick(&input.receipt_number, extracted.receipt_number),
        total_amount,
        currency: pick(&input.currency_code, extracted.currency_code),
        transaction_date: pick(&input.transaction_date, extracted.transaction_date)
            .ok_or_else(|| missing("transactionDate"))?,
        payer_name: pick(&input.payer_name, extracted.payer_name),
    })
}

/// Normalized amount and how it was obtained.
struct Normalized {
    total: Money,
    rate: Option<f64>,
    rate_timestamp: Option<chrono::DateTime<Utc>>,
    stale: bool,
    normalization: Normalization,
}

impl Engine {
    /// Confirm a pending receipt, creating its transaction.
    ///
    /// Status flip and transaction insert commit together. Unparseable amount
    /// or date moves the receipt to `ERROR_DATA_PARSE`.
    pub async fn confirm_receipt(
        &self,
        principal: &Principal,
        receipt_id: i64,
        input: ConfirmReceipt,
    ) -> ResultEngine<Transaction> {
        let result = self.confirm(principal, receipt_id, &input).await;
        let metadata = match &result {
            Ok(tx) => json!({
                "transaction_id": tx.id,
                "normalization": tx.normalization.as_str(),
                "original_currency": tx.original_currency.as_str(),
            }),
            Err(_) => json!({ "conversion": input.conversion }),
        };
        self.audit(
            AuditAction::ConfirmReceipt,
            principal,
            Some(receipt_id),
            &result,
            metadata,
        )
        .await;
        result
    }

    async fn confirm(
        &self,
        principal: &Principal,
        receipt_id: i64,
        input: &ConfirmReceipt,
    ) -> ResultEngine<Transaction> {
        principal.ensure_active()?;
        let model = self.require_receipt(receipt_id).await?;
        principal.ensure_owner_or_admin(model.uploader_id)?;
        require_pending(&model)?;

        let extracted = model
            .raw_ai_data
            .as_ref()
            .map(RawExtraction::from_value)
            .unwrap_or_default();
        let fields = merge(input, extracted)?;

        let base = self.base_currency().clone();
        let currency = match &fields.currency {
            Some(code) => CurrencyCode::try_from(code.as_str())?,
            None => base.clone(),
        };
        let scale = self.rates.minor_units(&currency).await?;

        let amount = match Money::parse(&fields.total_amount, scale) {
            Ok(amount) => amount,
            Err(err) => return Err(self.mark_parse_error(model, "totalAmount", err).await),
        };
        let transaction_date = match NaiveDate::parse_from_str(&fields.transaction_date, DATE_FORMAT)
        {
            Ok(date) => date,
            Err(_) => {
                let err = EngineError::Validation(format!(
                    "transactionDate is not YYYY-MM-DD: {}",
                    fields.transaction_date
                ));
                return Err(self.mark_parse_error(model, "transactionDate", err).await);
            }
        };
        if !amount.is_positive() {
            return Err(EngineError::Validation(format!(
                "totalAmount must be positive, got {amount}"
            )));
        }

        let normalized = self.normalize(amount, &currency, &base, input.conversion).await?;

        let now = Utc::now();
        let draft = Transaction {
            id: 0,
            receipt_id,
            vendor_name: fields.vendor_name,
            receipt_number: fields.receipt_number,
            original_amount: amount,
            original_currency: currency,
            total_amount: normalized.total,
            currency: base,
            exchange_rate_used: normalized.rate,
            rate_timestamp: normalized.rate_timestamp,
            rate_stale: normalized.stale,
            normalization: normalized.normalization,
            transaction_date,
            payer_id: Some(model.uploader_id),
            payer_name: fields.payer_name,
            description: normalize_optional_text(input.description.as_deref())
                .or_else(|| Some(format!("Transaction processed from Receipt ID {receipt_id}"))),
            created_at: now,
        };

        let stored = with_tx!(self, |db_tx| {
            if !transition(&db_tx, receipt_id, ReceiptStatus::Processed, None, now).await? {
                let current = receipts::Entity::find_by_id(receipt_id)
                    .one(&db_tx)
                    .await?
                    .map(|m| m.status)
                    .unwrap_or_default();
                Err(not_pending(receipt_id, &current))
            } else {
                let model = transactions::ActiveModel::from(&draft)
                    .insert(&db_tx)
                    .await?;
                Ok(model)
            }
        })?;
        let transaction = Transaction::try_from(stored)?;
        tracing::info!(
            receipt_id,
            transaction_id = transaction.id,
            normalization = transaction.normalization.as_str(),
            "receipt confirmed"
        );

        let patch = DocumentPatch {
            status: Some(ReceiptStatus::Processed),
            vendor_name: Some(transaction.vendor_name.clone()),
            receipt_number: transaction.receipt_number.clone(),
            total_amount: Some(transaction.original_amount.to_string()),
            currency: Some(transaction.original_currency.to_string()),
            transaction_date: Some(transaction.transaction_date),
            payer_name: transaction.payer_name.clone(),
            transaction_id: Some(transaction.id),
            ..Default::default()
        };
        mirror_outcome(
            receipt_id,
            "mirror_update",
            self.mirror.mirror_update(receipt_id, patch).await,
        );

        Ok(transaction)
    }

    async fn normalize(
        &self,
        amount: Money,
        currency: &CurrencyCode,
        base: &CurrencyCode,
        policy: ConversionPolicy,
    ) -> ResultEngine<Normalized> {
        if currency == base {
            return Ok(Normalized {
                total: amount,
                rate: None,
                rate_timestamp: None,
                stale: false,
                normalization: Normalization::SameCurrency,
            });
        }
        match self.rates.convert(amount, currency, base).await {
            Ok(conversion) => Ok(Normalized {
                total: conversion.amount,
                rate: Some(conversion.rate),
                rate_timestamp: Some(conversion.rate_timestamp),
                stale: conversion.stale,
                normalization: Normalization::Converted,
            }),
            Err(EngineError::RateUnavailable(reason))
                if policy == ConversionPolicy::FallbackToOriginal =>
            {
                tracing::warn!(
                    %currency,
                    %base,
                    reason = %reason,
                    "no exchange rate, storing the original amount unconverted"
                );
                let base_scale = self.rates.minor_units(base).await?;
                Ok(Normalized {
                    total: amount.rescale(base_scale)?,
                    rate: None,
                    rate_timestamp: None,
                    stale: false,
                    normalization: Normalization::FallbackUnconverted,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Taint a pending receipt whose confirmation data cannot be parsed.
    async fn mark_parse_error(
        &self,
        model: receipts::Model,
        field: &str,
        err: EngineError,
    ) -> EngineError {
        let note = json!({
            "field": field,
            "message": err.to_string(),
            "at": Utc::now(),
        });
        let raw = annotate(model.raw_ai_data, "parse_error", note);
        match transition(
            &self.database,
            model.id,
            ReceiptStatus::ErrorDataParse,
            Some(raw),
            Utc::now(),
        )
        .await
        {
            Ok(true) => {
                tracing::warn!(receipt_id = model.id, field, error = %err, "confirmation data unparseable");
                self.mirror_status(model.id, ReceiptStatus::ErrorDataParse, "mirror_update")
                    .await;
                err
            }
            Ok(false) => not_pending(model.id, "no longer pending"),
            Err(storage) => storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn confirmation_overrides_extraction() {
        let extracted = RawExtraction::from_value(&json!({
            "vendorName": "Cafe X",
            "totalAmount": 12.5,
            "currencyCode": "EUR",
            "transactionDate": "2024-03-01",
            "payerName": "Ada"
        }));
        let input = ConfirmReceipt {
            vendor_name: Some("Cafe Y".to_string()),
            total_amount: Some(" ".to_string()),
            ..Default::default()
        };
        let merged = merge(&input, extracted).unwrap();
        assert_eq!(merged.vendor_name, "Cafe Y");
        assert_eq!(merged.total_amount, "12.5");
        assert_eq!(merged.currency.as_deref(), Some("EUR"));
        assert_eq!(merged.payer_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn missing_required_fields_are_reported() {
        let input = ConfirmReceipt {
            vendor_name: Some("Cafe".to_string()),
            total_amount: Some("3".to_string()),
            ..Default::default()
        };
        let err = merge(&input, RawExtraction::default()).err().unwrap();
        assert_eq!(
            err,
            EngineError::Validation("missing required field: transactionDate".to_string())
        );
    }
}
