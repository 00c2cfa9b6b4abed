//! Receipt lifecycle endpoints

use api_types::receipt::{
    ConfirmReceipt, ExtractedView, ReceiptDetails, ReceiptView, RejectReceipt, UploadReceipt,
    UploadResponse,
};
use api_types::transaction::{TransactionListResponse, TransactionView};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use engine::{ConversionPolicy, ImageSource, Principal};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};

const DEFAULT_MIME_TYPE: &str = "image/jpeg";

pub(crate) fn receipt_view(receipt: engine::Receipt) -> ReceiptView {
    ReceiptView {
        id: receipt.id,
        uploader_id: receipt.uploader_id,
        image_url: receipt.image_url,
        status: receipt.status.as_str().to_string(),
        raw_ai_data: receipt.raw_payload,
        created_at: receipt.created_at,
        updated_at: receipt.updated_at,
    }
}

pub(crate) fn transaction_view(tx: engine::Transaction) -> TransactionView {
    TransactionView {
        id: tx.id,
        receipt_id: tx.receipt_id,
        vendor_name: tx.vendor_name,
        receipt_number: tx.receipt_number,
        original_amount: tx.original_amount.to_string(),
        original_currency: tx.original_currency.to_string(),
        total_amount: tx.total_amount.to_string(),
        currency: tx.currency.to_string(),
        exchange_rate_used: tx.exchange_rate_used,
        rate_timestamp: tx.rate_timestamp,
        rate_stale: tx.rate_stale,
        normalization: tx.normalization.as_str().to_string(),
        transaction_date: tx.transaction_date,
        payer_id: tx.payer_id,
        payer_name: tx.payer_name,
        description: tx.description,
        created_at: tx.created_at,
    }
}

fn image_source(payload: UploadReceipt) -> Result<ImageSource, ServerError> {
    match (payload.image_url, payload.image_base64) {
        (Some(url), None) => Ok(ImageSource::Url(url)),
        (None, Some(encoded)) => {
            let bytes = STANDARD
                .decode(encoded.trim())
                .map_err(|err| ServerError::Generic(format!("invalid imageBase64: {err}")))?;
            Ok(ImageSource::Inline {
                locator: format!("upload://{}", Uuid::new_v4()),
                mime_type: payload
                    .mime_type
                    .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
                bytes,
            })
        }
        (None, None) => Err(ServerError::Generic(
            "either imageUrl or imageBase64 is required".to_string(),
        )),
        (Some(_), Some(_)) => Err(ServerError::Generic(
            "provide only one of imageUrl or imageBase64".to_string(),
        )),
    }
}

pub async fn upload(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Json(payload): Json<UploadReceipt>,
) -> Result<(StatusCode, Json<UploadResponse>), ServerError> {
    let source = image_source(payload)?;
    let outcome = state.engine.upload_receipt(&principal, source).await?;

    let extracted = outcome.extracted;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            receipt: receipt_view(outcome.receipt),
            extracted: ExtractedView {
                vendor_name: extracted.vendor_name,
                receipt_number: extracted.receipt_number,
                total_amount: extracted.total_amount,
                currency_code: extracted.currency_code,
                transaction_date: extracted.transaction_date,
                payer_name: extracted.payer_name,
            },
        }),
    ))
}

pub async fn confirm(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<ConfirmReceipt>,
) -> Result<(StatusCode, Json<TransactionView>), ServerError> {
    let input = engine::ConfirmReceipt {
        vendor_name: payload.vendor_name,
        receipt_number: payload.receipt_number,
        total_amount: payload.total_amount.map(|amount| amount.to_text()),
        currency_code: payload.currency_code,
        transaction_date: payload.transaction_date,
        payer_name: payload.payer_name,
        description: payload.description,
        conversion: if payload.fallback_to_original {
            ConversionPolicy::FallbackToOriginal
        } else {
            ConversionPolicy::Strict
        },
    };
    let tx = state.engine.confirm_receipt(&principal, id, input).await?;

    Ok((StatusCode::CREATED, Json(transaction_view(tx))))
}

pub async fn cancel(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Json<ReceiptView>, ServerError> {
    let receipt = state.engine.cancel_receipt(&principal, id).await?;
    Ok(Json(receipt_view(receipt)))
}

pub async fn reject(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    payload: Option<Json<RejectReceipt>>,
) -> Result<Json<ReceiptView>, ServerError> {
    let reason = payload.and_then(|Json(body)| body.reason);
    let receipt = state
        .engine
        .reject_receipt(&principal, id, reason.as_deref())
        .await?;
    Ok(Json(receipt_view(receipt)))
}

pub async fn get(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Json<ReceiptDetails>, ServerError> {
    let details = state.engine.receipt(&principal, id).await?;
    Ok(Json(ReceiptDetails {
        receipt: receipt_view(details.receipt),
        transaction: details.transaction.map(transaction_view),
    }))
}

pub async fn transactions(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
) -> Result<Json<TransactionListResponse>, ServerError> {
    let transactions = state
        .engine
        .transactions_for_payer(&principal)
        .await?
        .into_iter()
        .map(transaction_view)
        .collect();
    Ok(Json(TransactionListResponse { transactions }))
}
