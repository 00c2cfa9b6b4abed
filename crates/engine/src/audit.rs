//! Audit collaborator boundary.
//!
//! The engine emits one [`AuditEvent`] per lifecycle transition attempt,
//! successful or not. Sinks must not fail the caller: persistence problems are
//! theirs to log.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    UploadReceipt,
    ConfirmReceipt,
    CancelReceipt,
    RejectReceipt,
    ArchiveReceipt,
    UnarchiveReceipt,
    BulkArchiveReceipts,
    DeleteReceiptDocument,
    RefreshExchangeRates,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UploadReceipt => "UPLOAD_RECEIPT",
            Self::ConfirmReceipt => "CONFIRM_RECEIPT",
            Self::CancelReceipt => "CANCEL_RECEIPT",
            Self::RejectReceipt => "REJECT_RECEIPT",
            Self::ArchiveReceipt => "ARCHIVE_RECEIPT",
            Self::UnarchiveReceipt => "UNARCHIVE_RECEIPT",
            Self::BulkArchiveReceipts => "BULK_ARCHIVE_RECEIPTS",
            Self::DeleteReceiptDocument => "DELETE_RECEIPT_DOCUMENT",
            Self::RefreshExchangeRates => "REFRESH_EXCHANGE_RATES",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: Option<i64>,
    pub actor_id: Option<i64>,
    pub success: bool,
    /// Error kind and message on failure, plus operation specific context.
    pub metadata: Value,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent);
}

/// Default sink: writes every event as a structured `tracing` record.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "audit",
            action = event.action.as_str(),
            resource_type = %event.resource_type,
            resource_id = ?event.resource_id,
            actor_id = ?event.actor_id,
            success = event.success,
            metadata = %event.metadata,
            "audit event"
        );
    }
}
