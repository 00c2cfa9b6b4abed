//! Mirror endpoints: archival, search and statistics

use api_types::archive::{
    ArchiveReceipt, ArchiveResponse, ArchivedQuery, BulkArchive, BulkArchiveResponse,
    DocumentListResponse, DocumentView, DocumentsQuery, MirrorStats, SearchQuery,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::{ArchiveOutcome, Principal, ReceiptDocument};

use crate::{ServerError, server::ServerState};

const DEFAULT_PAGE_SIZE: u64 = 50;

fn outcome(outcome: ArchiveOutcome) -> ArchiveResponse {
    let outcome = match outcome {
        ArchiveOutcome::Archived => "archived",
        ArchiveOutcome::AlreadyArchived => "already_archived",
        ArchiveOutcome::Unarchived => "unarchived",
        ArchiveOutcome::NotArchived => "not_archived",
    };
    ArchiveResponse {
        outcome: outcome.to_string(),
    }
}

fn document_view(doc: ReceiptDocument) -> DocumentView {
    DocumentView {
        receipt_id: doc.receipt_id,
        owner_id: doc.owner_id,
        image_url: doc.image_url,
        status: doc.status.as_str().to_string(),
        vendor_name: doc.vendor_name,
        receipt_number: doc.receipt_number,
        total_amount: doc.total_amount,
        currency: doc.currency,
        transaction_date: doc.transaction_date,
        payer_name: doc.payer_name,
        transaction_id: doc.transaction_id,
        tags: doc.tags,
        archived: doc.archived,
        archived_at: doc.archived_at,
        archive_reason: doc.archive_reason,
        created_at: doc.created_at,
        updated_at: doc.updated_at,
    }
}

fn document_list(docs: Vec<ReceiptDocument>) -> Json<DocumentListResponse> {
    Json(DocumentListResponse {
        documents: docs.into_iter().map(document_view).collect(),
    })
}

pub async fn archive(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    payload: Option<Json<ArchiveReceipt>>,
) -> Result<Json<ArchiveResponse>, ServerError> {
    let reason = payload.and_then(|Json(body)| body.reason);
    let result = state
        .engine
        .archive_receipt(&principal, id, reason.as_deref())
        .await?;
    Ok(Json(outcome(result)))
}

pub async fn unarchive(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Json<ArchiveResponse>, ServerError> {
    let result = state.engine.unarchive_receipt(&principal, id).await?;
    Ok(Json(outcome(result)))
}

pub async fn bulk(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Json(payload): Json<BulkArchive>,
) -> Result<Json<BulkArchiveResponse>, ServerError> {
    let archived = state
        .engine
        .bulk_archive(
            &principal,
            payload.days,
            payload.owner_id,
            payload.reason.as_deref(),
        )
        .await?;
    Ok(Json(BulkArchiveResponse { archived }))
}

pub async fn delete_permanently(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_mirror_permanently(&principal, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn documents(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Query(query): Query<DocumentsQuery>,
) -> Result<Json<DocumentListResponse>, ServerError> {
    let docs = state
        .engine
        .receipt_documents(
            &principal,
            query.include_archived,
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            query.offset.unwrap_or(0),
        )
        .await?;
    Ok(document_list(docs))
}

pub async fn search(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<DocumentListResponse>, ServerError> {
    let docs = state
        .engine
        .search_receipts(&principal, &query.q, query.include_archived)
        .await?;
    Ok(document_list(docs))
}

pub async fn archived(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Query(query): Query<ArchivedQuery>,
) -> Result<Json<DocumentListResponse>, ServerError> {
    let docs = state
        .engine
        .archived_receipts(&principal, query.days_old)
        .await?;
    Ok(document_list(docs))
}

pub async fn stats(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
) -> Result<Json<MirrorStats>, ServerError> {
    let stats = state.engine.mirror_stats(&principal).await?;
    Ok(Json(MirrorStats {
        total: stats.total,
        archived: stats.archived,
        active: stats.active,
        pending: stats.pending,
        processed: stats.processed,
    }))
}
