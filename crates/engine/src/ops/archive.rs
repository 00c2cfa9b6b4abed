use serde_json::json;

use crate::audit::AuditAction;
use crate::mirror::{ArchiveOutcome, MirrorStats, ReceiptDocument};
use crate::principal::Role;
use crate::{Principal, ResultEngine};

use super::{Engine, normalize_optional_text};

/// Age used by bulk archival when the caller gives none.
pub const DEFAULT_BULK_ARCHIVE_DAYS: i64 = 90;

impl Engine {
    /// Soft-delete the mirror document of a receipt. Archiving twice is a no-op.
    pub async fn archive_receipt(
        &self,
        principal: &Principal,
        receipt_id: i64,
        reason: Option<&str>,
    ) -> ResultEngine<ArchiveOutcome> {
        let reason = normalize_optional_text(reason);
        let result = async {
            principal.ensure_active()?;
            let model = self.require_receipt(receipt_id).await?;
            principal.ensure_owner_or_admin(model.uploader_id)?;
            self.mirror
                .archive(receipt_id, reason.as_deref(), Some(principal.id))
                .await
        }
        .await;
        self.audit(
            AuditAction::ArchiveReceipt,
            principal,
            Some(receipt_id),
            &result,
            json!({ "reason": reason, "outcome": result.as_ref().ok() }),
        )
        .await;
        result
    }

    pub async fn unarchive_receipt(
        &self,
        principal: &Principal,
        receipt_id: i64,
    ) -> ResultEngine<ArchiveOutcome> {
        let result = async {
            principal.ensure_active()?;
            let model = self.require_receipt(receipt_id).await?;
            principal.ensure_owner_or_admin(model.uploader_id)?;
            self.mirror.unarchive(receipt_id).await
        }
        .await;
        self.audit(
            AuditAction::UnarchiveReceipt,
            principal,
            Some(receipt_id),
            &result,
            json!({ "outcome": result.as_ref().ok() }),
        )
        .await;
        result
    }

    /// Archive every document older than `days` (default 90, never below 30).
    pub async fn bulk_archive(
        &self,
        principal: &Principal,
        days: Option<i64>,
        owner: Option<i64>,
        reason: Option<&str>,
    ) -> ResultEngine<u64> {
        let days = days.unwrap_or(DEFAULT_BULK_ARCHIVE_DAYS);
        let reason = normalize_optional_text(reason)
            .unwrap_or_else(|| format!("bulk archive: older than {days} days"));
        let result = async {
            principal.ensure_role(&[Role::SystemAdmin])?;
            self.mirror
                .bulk_archive_older_than(days, owner, Some(&reason), Some(principal.id))
                .await
        }
        .await;
        self.audit(
            AuditAction::BulkArchiveReceipts,
            principal,
            None,
            &result,
            json!({ "days": days, "owner": owner, "archived": result.as_ref().ok() }),
        )
        .await;
        result
    }

    /// Physically remove a mirror document. The relational receipt is untouched.
    pub async fn delete_mirror_permanently(
        &self,
        principal: &Principal,
        receipt_id: i64,
    ) -> ResultEngine<()> {
        let result = async {
            principal.ensure_role(&[Role::SystemAdmin])?;
            self.mirror.delete_permanently(receipt_id).await
        }
        .await;
        self.audit(
            AuditAction::DeleteReceiptDocument,
            principal,
            Some(receipt_id),
            &result,
            json!({}),
        )
        .await;
        result
    }

    /// The caller's mirror documents, newest first.
    pub async fn receipt_documents(
        &self,
        principal: &Principal,
        include_archived: bool,
        limit: u64,
        offset: u64,
    ) -> ResultEngine<Vec<ReceiptDocument>> {
        principal.ensure_active()?;
        self.mirror
            .documents_for_owner(principal.id, include_archived, limit, offset)
            .await
    }

    /// Search the mirror. Admins search every owner.
    pub async fn search_receipts(
        &self,
        principal: &Principal,
        text: &str,
        include_archived: bool,
    ) -> ResultEngine<Vec<ReceiptDocument>> {
        principal.ensure_active()?;
        self.mirror
            .search(text, scope(principal), include_archived)
            .await
    }

    pub async fn archived_receipts(
        &self,
        principal: &Principal,
        days_old: Option<i64>,
    ) -> ResultEngine<Vec<ReceiptDocument>> {
        principal.ensure_active()?;
        self.mirror
            .archived_documents(scope(principal), days_old)
            .await
    }

    pub async fn mirror_stats(&self, principal: &Principal) -> ResultEngine<MirrorStats> {
        principal.ensure_active()?;
        self.mirror.stats(scope(principal)).await
    }
}

fn scope(principal: &Principal) -> Option<i64> {
    (!principal.is_admin()).then_some(principal.id)
}
