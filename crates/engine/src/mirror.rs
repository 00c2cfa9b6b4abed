//! Dual-store synchronizer.
//!
//! Owns every write to the document mirror. The mirror is a denormalized,
//! searchable projection of receipts kept in its own database; the relational
//! store stays authoritative. Callers write the system-of-record first and
//! decide themselves whether a mirror failure matters to them.

use chrono::{Duration, Utc};
use sea_orm::{
    Condition, IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};

use crate::{EngineError, Receipt, ReceiptStatus, ResultEngine};

pub use document::{DocumentPatch, ReceiptDocument};

pub(crate) mod document;

/// Bulk archival never touches documents younger than this.
pub const MIN_BULK_ARCHIVE_DAYS: i64 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveOutcome {
    Archived,
    AlreadyArchived,
    Unarchived,
    NotArchived,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorStats {
    pub total: u64,
    pub archived: u64,
    pub active: u64,
    pub pending: u64,
    pub processed: u64,
}

fn mirror_err(err: DbErr) -> EngineError {
    EngineError::MirrorWrite(err.to_string())
}

fn not_found(receipt_id: i64) -> EngineError {
    EngineError::NotFound(format!("mirror document for receipt {receipt_id}"))
}

#[derive(Debug, Clone)]
pub struct Synchronizer {
    database: DatabaseConnection,
}

impl Synchronizer {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }

    async fn find(&self, receipt_id: i64) -> ResultEngine<Option<document::Model>> {
        document::Entity::find_by_id(receipt_id)
            .one(&self.database)
            .await
            .map_err(mirror_err)
    }

    /// Create the document for `receipt`, or return the existing one untouched.
    pub async fn mirror_create(&self, receipt: &Receipt) -> ResultEngine<ReceiptDocument> {
        if let Some(existing) = self.find(receipt.id).await? {
            return ReceiptDocument::try_from(existing);
        }
        let inserted = document::ActiveModel::from_receipt(receipt, Utc::now())
            .insert(&self.database)
            .await;
        match inserted {
            Ok(model) => ReceiptDocument::try_from(model),
            // A concurrent create won the unique key; theirs is the document.
            Err(err) => match self.find(receipt.id).await? {
                Some(existing) => ReceiptDocument::try_from(existing),
                None => Err(mirror_err(err)),
            },
        }
    }

    pub async fn mirror_update(
        &self,
        receipt_id: i64,
        patch: DocumentPatch,
    ) -> ResultEngine<ReceiptDocument> {
        let model = self
            .find(receipt_id)
            .await?
            .ok_or_else(|| not_found(receipt_id))?;
        let mut active = model.into_active_model();
        active.apply(patch, Utc::now());
        let model = active.update(&self.database).await.map_err(mirror_err)?;
        ReceiptDocument::try_from(model)
    }

    /// Soft-delete: set the archived flag, timestamp and reason.
    pub async fn archive(
        &self,
        receipt_id: i64,
        reason: Option<&str>,
        archived_by: Option<i64>,
    ) -> ResultEngine<ArchiveOutcome> {
        let now = Utc::now();
        let result = document::Entity::update_many()
            .col_expr(document::Column::Archived, Expr::value(true))
            .col_expr(document::Column::ArchivedAt, Expr::value(Some(now)))
            .col_expr(
                document::Column::ArchiveReason,
                Expr::value(reason.map(ToString::to_string)),
            )
            .col_expr(document::Column::ArchivedBy, Expr::value(archived_by))
            .col_expr(document::Column::UpdatedAt, Expr::value(now))
            .filter(document::Column::ReceiptId.eq(receipt_id))
            .filter(document::Column::Archived.eq(false))
            .exec(&self.database)
            .await
            .map_err(mirror_err)?;
        if result.rows_affected > 0 {
            return Ok(ArchiveOutcome::Archived);
        }
        match self.find(receipt_id).await? {
            Some(_) => Ok(ArchiveOutcome::AlreadyArchived),
            None => Err(not_found(receipt_id)),
        }
    }

    pub async fn unarchive(&self, receipt_id: i64) -> ResultEngine<ArchiveOutcome> {
        let result = document::Entity::update_many()
            .col_expr(document::Column::Archived, Expr::value(false))
            .col_expr(
                document::Column::ArchivedAt,
                Expr::value(Option::<DateTimeUtc>::None),
            )
            .col_expr(
                document::Column::ArchiveReason,
                Expr::value(Option::<String>::None),
            )
            .col_expr(document::Column::ArchivedBy, Expr::value(Option::<i64>::None))
            .col_expr(document::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(document::Column::ReceiptId.eq(receipt_id))
            .filter(document::Column::Archived.eq(true))
            .exec(&self.database)
            .await
            .map_err(mirror_err)?;
        if result.rows_affected > 0 {
            return Ok(ArchiveOutcome::Unarchived);
        }
        match self.find(receipt_id).await? {
            Some(_) => Ok(ArchiveOutcome::NotArchived),
            None => Err(not_found(receipt_id)),
        }
    }

    /// Archive every unarchived document created more than `days` ago.
    pub async fn bulk_archive_older_than(
        &self,
        days: i64,
        owner: Option<i64>,
        reason: Option<&str>,
        archived_by: Option<i64>,
    ) -> ResultEngine<u64> {
        if days < MIN_BULK_ARCHIVE_DAYS {
            return Err(EngineError::Validation(format!(
                "bulk archive requires an age of at least {MIN_BULK_ARCHIVE_DAYS} days, got {days}"
            )));
        }
        let now = Utc::now();
        let cutoff = now - Duration::days(days);
        let mut update = document::Entity::update_many()
            .col_expr(document::Column::Archived, Expr::value(true))
            .col_expr(document::Column::ArchivedAt, Expr::value(Some(now)))
            .col_expr(
                document::Column::ArchiveReason,
                Expr::value(reason.map(ToString::to_string)),
            )
            .col_expr(document::Column::ArchivedBy, Expr::value(archived_by))
            .col_expr(document::Column::UpdatedAt, Expr::value(now))
            .filter(document::Column::Archived.eq(false))
            .filter(document::Column::CreatedAt.lt(cutoff));
        if let Some(owner) = owner {
            update = update.filter(document::Column::OwnerId.eq(owner));
        }
        let result = update.exec(&self.database).await.map_err(mirror_err)?;
        tracing::info!(
            archived = result.rows_affected,
            days,
            owner = ?owner,
            "bulk archived mirror documents"
        );
        Ok(result.rows_affected)
    }

    /// Physically remove the document. Never called by lifecycle transitions.
    pub async fn delete_permanently(&self, receipt_id: i64) -> ResultEngine<()> {
        let result = document::Entity::delete_by_id(receipt_id)
            .exec(&self.database)
            .await
            .map_err(mirror_err)?;
        if result.rows_affected == 0 {
            return Err(not_found(receipt_id));
        }
        tracing::warn!(receipt_id, "mirror document permanently deleted");
        Ok(())
    }

    pub async fn document(
        &self,
        receipt_id: i64,
        include_archived: bool,
    ) -> ResultEngine<ReceiptDocument> {
        let model = self
            .find(receipt_id)
            .await?
            .filter(|m| include_archived || !m.archived)
            .ok_or_else(|| not_found(receipt_id))?;
        ReceiptDocument::try_from(model)
    }

    pub async fn documents_for_owner(
        &self,
        owner_id: i64,
        include_archived: bool,
        limit: u64,
        offset: u64,
    ) -> ResultEngine<Vec<ReceiptDocument>> {
        let mut query = document::Entity::find().filter(document::Column::OwnerId.eq(owner_id));
        if !include_archived {
            query = query.filter(document::Column::Archived.eq(false));
        }
        query
            .order_by_desc(document::Column::CreatedAt)
            .order_by_desc(document::Column::ReceiptId)
            .limit(limit)
            .offset(offset)
            .all(&self.database)
            .await
            .map_err(mirror_err)?
            .into_iter()
            .map(ReceiptDocument::try_from)
            .collect()
    }

    /// Case-insensitive match over vendor name, receipt number and tag contents.
    pub async fn search(
        &self,
        text: &str,
        owner: Option<i64>,
        include_archived: bool,
    ) -> ResultEngine<Vec<ReceiptDocument>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::Validation("empty search text".to_string()));
        }
        let mut matches = Condition::any()
            .add(document::Column::VendorName.contains(text))
            .add(document::Column::ReceiptNumber.contains(text));
        // Tags are stored as a JSON array; without its punctuation the text
        // can only match inside a single tag.
        let tag_text: String = text
            .chars()
            .filter(|c| !matches!(c, '[' | ']' | '"' | ',' | '\\'))
            .collect();
        let tag_text = tag_text.trim();
        if !tag_text.is_empty() {
            matches = matches.add(document::Column::Tags.contains(tag_text));
        }
        let mut query = document::Entity::find().filter(matches);
        if let Some(owner) = owner {
            query = query.filter(document::Column::OwnerId.eq(owner));
        }
        if !include_archived {
            query = query.filter(document::Column::Archived.eq(false));
        }
        query
            .order_by_desc(document::Column::CreatedAt)
            .all(&self.database)
            .await
            .map_err(mirror_err)?
            .into_iter()
            .map(ReceiptDocument::try_from)
            .collect()
    }

    /// Archived documents, optionally only those archived more than `days_old` days ago.
    pub async fn archived_documents(
        &self,
        owner: Option<i64>,
        days_old: Option<i64>,
    ) -> ResultEngine<Vec<ReceiptDocument>> {
        let mut query = document::Entity::find().filter(document::Column::Archived.eq(true));
        if let Some(owner) = owner {
            query = query.filter(document::Column::OwnerId.eq(owner));
        }
        if let Some(days) = days_old {
            query = query.filter(document::Column::ArchivedAt.lt(Utc::now() - Duration::days(days)));
        }
        query
            .order_by_desc(document::Column::ArchivedAt)
            .all(&self.database)
            .await
            .map_err(mirror_err)?
            .into_iter()
            .map(ReceiptDocument::try_from)
            .collect()
    }

    pub async fn stats(&self, owner: Option<i64>) -> ResultEngine<MirrorStats> {
        let scoped = || {
            let query = document::Entity::find();
            match owner {
                Some(owner) => query.filter(document::Column::OwnerId.eq(owner)),
                None => query,
            }
        };
        let total = scoped().count(&self.database).await.map_err(mirror_err)?;
        let archived = scoped()
            .filter(document::Column::Archived.eq(true))
            .count(&self.database)
            .await
            .map_err(mirror_err)?;
        let pending = scoped()
            .filter(document::Column::Status.eq(ReceiptStatus::PendingConfirmation.as_str()))
            .count(&self.database)
            .await
            .map_err(mirror_err)?;
        let processed = scoped()
            .filter(document::Column::Status.eq(ReceiptStatus::Processed.as_str()))
            .count(&self.database)
            .await
            .map_err(mirror_err)?;
        Ok(MirrorStats {
            total,
            archived,
            active: total - archived,
            pending,
            processed,
        })
    }
}
