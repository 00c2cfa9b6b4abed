use std::time::Duration;

use chrono::Utc;
use sea_orm::{QueryFilter, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::AuditAction;
use crate::extraction::{ExtractedReceipt, Extraction, ImageSource};
use crate::mirror::DocumentPatch;
use crate::principal::Role;
use crate::{
    EngineError, ExtractionError, Principal, Receipt, ReceiptStatus, ResultEngine, receipts,
};

use super::{Engine, annotate, mirror_outcome, transition};

/// A pending receipt with the extracted fields awaiting review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub receipt: Receipt,
    pub extracted: ExtractedReceipt,
}

impl Engine {
    /// Create a pending receipt for `source` and run one extraction attempt.
    ///
    /// The receipt row is committed before extraction starts. A failed
    /// extraction moves it to `ERROR` and is returned as
    /// [`EngineError::Extraction`] carrying the receipt id.
    pub async fn upload_receipt(
        &self,
        principal: &Principal,
        source: ImageSource,
    ) -> ResultEngine<UploadOutcome> {
        let result = self.upload(principal, &source).await;
        let resource_id = result.as_ref().ok().map(|o| o.receipt.id);
        self.audit(
            AuditAction::UploadReceipt,
            principal,
            resource_id,
            &result,
            json!({ "image_url": source.locator() }),
        )
        .await;
        result
    }

    async fn upload(
        &self,
        principal: &Principal,
        source: &ImageSource,
    ) -> ResultEngine<UploadOutcome> {
        principal.ensure_role(&[Role::SystemAdmin, Role::ReceiptLogger])?;
        source.validate()?;

        let model = receipts::ActiveModel::pending(principal.id, source.locator().trim(), Utc::now())
            .insert(&self.database)
            .await?;
        let mut receipt = Receipt::try_from(model)?;
        tracing::info!(receipt_id = receipt.id, uploader_id = principal.id, "receipt created");

        mirror_outcome(
            receipt.id,
            "mirror_create",
            self.mirror.mirror_create(&receipt).await,
        );

        let timeout = Duration::from_secs(self.settings.extraction_timeout_secs);
        let attempt = match tokio::time::timeout(timeout, self.extractor.extract(source)).await {
            Ok(attempt) => attempt,
            Err(_) => Err(ExtractionError::transport(format!(
                "extraction timed out after {}s",
                timeout.as_secs()
            ))),
        };

        match attempt {
            Ok(extraction) => self.attach_extraction(receipt, extraction).await,
            Err(err) => {
                tracing::warn!(receipt_id = receipt.id, error = %err, "extraction failed");
                let note = json!({ "kind": err.kind, "message": err.message });
                let raw = annotate(receipt.raw_payload.take(), "error", note);
                if transition(
                    &self.database,
                    receipt.id,
                    ReceiptStatus::Error,
                    Some(raw),
                    Utc::now(),
                )
                .await?
                {
                    self.mirror_status(receipt.id, ReceiptStatus::Error, "mirror_update")
                        .await;
                }
                Err(EngineError::Extraction {
                    receipt_id: Some(receipt.id),
                    source: err,
                })
            }
        }
    }

    async fn attach_extraction(
        &self,
        mut receipt: Receipt,
        extraction: Extraction,
    ) -> ResultEngine<UploadOutcome> {
        let now = Utc::now();
        let updated = receipts::Entity::update_many()
            .col_expr(receipts::Column::RawAiData, Expr::value(extraction.raw.clone()))
            .col_expr(receipts::Column::UpdatedAt, Expr::value(now))
            .filter(receipts::Column::Id.eq(receipt.id))
            .filter(receipts::Column::Status.eq(ReceiptStatus::PendingConfirmation.as_str()))
            .exec(&self.database)
            .await?;
        if updated.rows_affected == 0 {
            return Err(EngineError::InvalidStateTransition(format!(
                "receipt {} left {} during extraction",
                receipt.id,
                ReceiptStatus::PendingConfirmation
            )));
        }
        receipt.raw_payload = Some(extraction.raw);
        receipt.updated_at = now;

        let extracted = extraction.receipt;
        let patch = DocumentPatch {
            vendor_name: Some(extracted.vendor_name.clone()),
            receipt_number: extracted.receipt_number.clone(),
            total_amount: Some(extracted.total_amount.clone()),
            currency: extracted.currency_code.clone(),
            transaction_date: Some(extracted.transaction_date),
            payer_name: extracted.payer_name.clone(),
            extracted: receipt.raw_payload.clone(),
            ..Default::default()
        };
        mirror_outcome(
            receipt.id,
            "mirror_update",
            self.mirror.mirror_update(receipt.id, patch).await,
        );

        Ok(UploadOutcome { receipt, extracted })
    }
}
