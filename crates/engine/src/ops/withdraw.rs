use chrono::Utc;
use serde_json::{Value, json};

use crate::audit::AuditAction;
use crate::{Principal, Receipt, ReceiptStatus, ResultEngine};

use super::{Engine, annotate, normalize_optional_text, not_pending, require_pending, transition};

impl Engine {
    /// Withdraw a pending receipt before confirming it.
    pub async fn cancel_receipt(
        &self,
        principal: &Principal,
        receipt_id: i64,
    ) -> ResultEngine<Receipt> {
        let result = self
            .withdraw(principal, receipt_id, ReceiptStatus::Cancelled, None)
            .await;
        self.audit(
            AuditAction::CancelReceipt,
            principal,
            Some(receipt_id),
            &result,
            json!({}),
        )
        .await;
        result
    }

    /// Mark the extracted data of a pending receipt unusable.
    ///
    /// The reason is stored on the raw payload under `rejection`.
    pub async fn reject_receipt(
        &self,
        principal: &Principal,
        receipt_id: i64,
        reason: Option<&str>,
    ) -> ResultEngine<Receipt> {
        let reason = normalize_optional_text(reason);
        let note = json!({
            "reason": reason,
            "rejected_at": Utc::now(),
            "rejected_by": principal.id,
        });
        let result = self
            .withdraw(principal, receipt_id, ReceiptStatus::Rejected, Some(note))
            .await;
        self.audit(
            AuditAction::RejectReceipt,
            principal,
            Some(receipt_id),
            &result,
            json!({ "reason": reason }),
        )
        .await;
        result
    }

    async fn withdraw(
        &self,
        principal: &Principal,
        receipt_id: i64,
        to: ReceiptStatus,
        rejection: Option<Value>,
    ) -> ResultEngine<Receipt> {
        principal.ensure_active()?;
        let model = self.require_receipt(receipt_id).await?;
        principal.ensure_owner_or_admin(model.uploader_id)?;
        require_pending(&model)?;

        let raw = rejection.map(|note| annotate(model.raw_ai_data.clone(), "rejection", note));
        let now = Utc::now();
        if !transition(&self.database, receipt_id, to, raw.clone(), now).await? {
            return Err(not_pending(receipt_id, "no longer pending"));
        }
        tracing::info!(receipt_id, status = to.as_str(), "receipt withdrawn");
        self.mirror_status(receipt_id, to, "mirror_update").await;

        let mut receipt = Receipt::try_from(model)?;
        receipt.status = to;
        receipt.updated_at = now;
        if raw.is_some() {
            receipt.raw_payload = raw;
        }
        Ok(receipt)
    }
}
