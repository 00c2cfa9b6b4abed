use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, QueryFilter, prelude::*, sea_query::Expr};
use serde_json::{Value, json};

use crate::audit::{AuditAction, AuditEvent, AuditSink, TracingAuditSink};
use crate::extraction::Extractor;
use crate::mirror::{DocumentPatch, ReceiptDocument, Synchronizer};
use crate::rates::{RateCache, RateSource};
use crate::{
    CurrencyCode, EngineError, LifecycleSettings, Principal, RateSettings, ReceiptStatus,
    ResultEngine, receipts,
};

mod archive;
mod confirm;
mod queries;
mod rates;
mod upload;
mod withdraw;

pub use archive::DEFAULT_BULK_ARCHIVE_DAYS;
pub use confirm::{ConfirmReceipt, ConversionPolicy};
pub use queries::ReceiptDetails;
pub use upload::UploadOutcome;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Receipt lifecycle engine.
///
/// Every public operation takes the caller's [`Principal`], writes the
/// relational store first, mirrors afterwards and reports exactly one audit
/// event before returning.
pub struct Engine {
    database: DatabaseConnection,
    rates: RateCache,
    mirror: Synchronizer,
    extractor: Arc<dyn Extractor>,
    audit: Arc<dyn AuditSink>,
    settings: LifecycleSettings,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("rates", &self.rates)
            .field("mirror", &self.mirror)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The exchange rate cache backing confirmations.
    pub fn rates(&self) -> &RateCache {
        &self.rates
    }

    /// The document mirror.
    pub fn mirror(&self) -> &Synchronizer {
        &self.mirror
    }

    pub fn base_currency(&self) -> &CurrencyCode {
        self.rates.base_currency()
    }

    async fn require_receipt(&self, receipt_id: i64) -> ResultEngine<receipts::Model> {
        receipts::Entity::find_by_id(receipt_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("receipt {receipt_id}")))
    }

    /// Emit the audit event of one operation attempt.
    async fn audit<T>(
        &self,
        action: AuditAction,
        principal: &Principal,
        resource_id: Option<i64>,
        result: &ResultEngine<T>,
        mut metadata: Value,
    ) {
        let resource_id = match result {
            Err(err) => err.receipt_id().or(resource_id),
            Ok(_) => resource_id,
        };
        if let (Err(err), Value::Object(map)) = (result, &mut metadata) {
            map.insert("error_kind".to_string(), json!(err.kind()));
            map.insert("error".to_string(), json!(err.to_string()));
        }
        let resource_type = match action {
            AuditAction::RefreshExchangeRates => "exchange_rates",
            _ => "receipt",
        };
        self.audit
            .record(AuditEvent {
                action,
                resource_type: resource_type.to_string(),
                resource_id,
                actor_id: Some(principal.id),
                success: result.is_ok(),
                metadata,
            })
            .await;
    }
}

/// Log a failed lifecycle mirror write. The relational write already committed
/// and stays committed.
fn mirror_outcome(receipt_id: i64, operation: &'static str, result: ResultEngine<ReceiptDocument>) {
    if let Err(err) = result {
        tracing::warn!(
            receipt_id,
            operation,
            error = %err,
            "mirror write failed, document store needs reconciliation"
        );
    }
}

impl Engine {
    async fn mirror_status(&self, receipt_id: i64, status: ReceiptStatus, operation: &'static str) {
        let result = self
            .mirror
            .mirror_update(receipt_id, DocumentPatch::status(status))
            .await;
        mirror_outcome(receipt_id, operation, result);
    }
}

/// Move a receipt out of `PENDING_CONFIRMATION`.
///
/// The status check and the write are one conditional `UPDATE`, so of two
/// racing callers only one sees `true`.
async fn transition<C: ConnectionTrait>(
    db: &C,
    receipt_id: i64,
    to: ReceiptStatus,
    raw: Option<Value>,
    now: DateTime<Utc>,
) -> ResultEngine<bool> {
    let mut update = receipts::Entity::update_many()
        .col_expr(receipts::Column::Status, Expr::value(to.as_str()))
        .col_expr(receipts::Column::UpdatedAt, Expr::value(now))
        .filter(receipts::Column::Id.eq(receipt_id))
        .filter(receipts::Column::Status.eq(ReceiptStatus::PendingConfirmation.as_str()));
    if let Some(raw) = raw {
        update = update.col_expr(receipts::Column::RawAiData, Expr::value(raw));
    }
    Ok(update.exec(db).await?.rows_affected == 1)
}

fn not_pending(receipt_id: i64, status: &str) -> EngineError {
    EngineError::InvalidStateTransition(format!(
        "receipt {receipt_id} is {status}, expected {}",
        ReceiptStatus::PendingConfirmation
    ))
}

fn require_pending(model: &receipts::Model) -> ResultEngine<()> {
    if model.status != ReceiptStatus::PendingConfirmation.as_str() {
        return Err(not_pending(model.id, &model.status));
    }
    Ok(())
}

/// Attach `note` under `key` to a stored payload without discarding it.
fn annotate(raw: Option<Value>, key: &str, note: Value) -> Value {
    match raw {
        Some(Value::Object(mut map)) => {
            map.insert(key.to_string(), note);
            Value::Object(map)
        }
        Some(other) => json!({ "extraction": other, key: note }),
        None => json!({ key: note }),
    }
}

fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: Option<DatabaseConnection>,
    mirror_database: Option<DatabaseConnection>,
    extractor: Option<Arc<dyn Extractor>>,
    rate_source: Option<Arc<dyn RateSource>>,
    audit: Option<Arc<dyn AuditSink>>,
    rate_settings: RateSettings,
    lifecycle_settings: LifecycleSettings,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = Some(db);
        self
    }

    /// Pass the required database of the document mirror
    pub fn mirror_database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.mirror_database = Some(db);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> EngineBuilder {
        self.extractor = Some(extractor);
        self
    }

    pub fn rate_source(mut self, source: Arc<dyn RateSource>) -> EngineBuilder {
        self.rate_source = Some(source);
        self
    }

    /// Defaults to [`TracingAuditSink`].
    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> EngineBuilder {
        self.audit = Some(sink);
        self
    }

    pub fn rate_settings(mut self, settings: RateSettings) -> EngineBuilder {
        self.rate_settings = settings;
        self
    }

    pub fn lifecycle_settings(mut self, settings: LifecycleSettings) -> EngineBuilder {
        self.lifecycle_settings = settings;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let database = self
            .database
            .ok_or_else(|| EngineError::Configuration("missing database".to_string()))?;
        let mirror_database = self
            .mirror_database
            .ok_or_else(|| EngineError::Configuration("missing mirror database".to_string()))?;
        let extractor = self
            .extractor
            .ok_or_else(|| EngineError::Configuration("missing extractor".to_string()))?;
        let rate_source = self
            .rate_source
            .ok_or_else(|| EngineError::Configuration("missing rate source".to_string()))?;
        let rates = RateCache::new(database.clone(), rate_source, self.rate_settings)?;
        Ok(Engine {
            database,
            rates,
            mirror: Synchronizer::new(mirror_database),
            extractor,
            audit: self.audit.unwrap_or_else(|| Arc::new(TracingAuditSink)),
            settings: self.lifecycle_settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotate_keeps_existing_payload() {
        let raw = json!({"vendorName": "Cafe X"});
        let annotated = annotate(Some(raw), "rejection", json!({"reason": "duplicate"}));
        assert_eq!(annotated["vendorName"], "Cafe X");
        assert_eq!(annotated["rejection"]["reason"], "duplicate");

        let annotated = annotate(Some(json!("text")), "error", json!(1));
        assert_eq!(annotated["extraction"], "text");
        assert_eq!(annotate(None, "error", json!(1)), json!({"error": 1}));
    }

    #[tokio::test]
    async fn build_requires_both_databases() {
        let source: Arc<dyn RateSource> = Arc::new(crate::FixedRateSource::default());
        let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();

        let err = Engine::builder()
            .database(db.clone())
            .rate_source(source.clone())
            .build()
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::Configuration("missing mirror database".to_string()));

        let err = Engine::builder()
            .mirror_database(db)
            .rate_source(source)
            .build()
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::Configuration("missing database".to_string()));
    }
}
