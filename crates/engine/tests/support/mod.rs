#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use serde_json::{Value, json};

use engine::{
    AuditEvent, AuditSink, Engine, Extraction, ExtractionError, Extractor, FixedRateSource,
    ImageSource, LifecycleSettings, Principal, RateSettings, RateSource, Role, validate_payload,
};
use migration::MigratorTrait;

pub const ADMIN_ID: i64 = 1;
pub const LOGGER_ID: i64 = 42;
pub const BASIC_ID: i64 = 7;
pub const OTHER_LOGGER_ID: i64 = 8;

pub fn admin() -> Principal {
    principal(ADMIN_ID, "Admin", Role::SystemAdmin)
}

pub fn logger() -> Principal {
    principal(LOGGER_ID, "Ada", Role::ReceiptLogger)
}

pub fn other_logger() -> Principal {
    principal(OTHER_LOGGER_ID, "Grace", Role::ReceiptLogger)
}

pub fn basic() -> Principal {
    principal(BASIC_ID, "Bob", Role::BasicUser)
}

fn principal(id: i64, name: &str, role: Role) -> Principal {
    Principal {
        id,
        display_name: name.to_string(),
        role,
        active: true,
    }
}

pub fn cafe_payload() -> Value {
    json!({
        "vendorName": "Cafe X",
        "totalAmount": 12.50,
        "currencyCode": "EUR",
        "transactionDate": "2024-03-01"
    })
}

pub fn image() -> ImageSource {
    ImageSource::Url("https://cdn.example.com/u1.jpg".to_string())
}

/// How the scripted extractor answers.
#[derive(Clone, Debug)]
pub enum Script {
    Payload(Value),
    Fail(ExtractionError),
    Hang,
}

#[derive(Debug)]
pub struct ScriptedExtractor {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn extract(&self, _source: &ImageSource) -> Result<Extraction, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Payload(value) => validate_payload(value.clone()),
            Script::Fail(err) => Err(err.clone()),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ExtractionError::transport("woke up"))
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// A rate source that is always down.
#[derive(Debug, Default)]
pub struct OfflineRateSource;

#[async_trait]
impl RateSource for OfflineRateSource {
    fn name(&self) -> &str {
        "offline"
    }

    async fn fetch(
        &self,
        _base: &engine::CurrencyCode,
    ) -> Result<std::collections::HashMap<String, f64>, engine::RateSourceError> {
        Err(engine::RateSourceError::Transport(
            "connection refused".to_string(),
        ))
    }
}

/// EUR at 1.08 USD, JPY at 150 per USD, GBP at 0.79 per USD.
pub fn market() -> FixedRateSource {
    FixedRateSource::new([("EUR", 1.0 / 1.08), ("JPY", 150.0), ("GBP", 0.79)])
}

pub struct Harness {
    pub engine: Arc<Engine>,
    pub db: DatabaseConnection,
    pub mirror: DatabaseConnection,
    pub audit: Arc<RecordingAuditSink>,
    pub extractor: Arc<ScriptedExtractor>,
}

pub struct Setup {
    script: Script,
    source: Arc<dyn RateSource>,
    mirror: bool,
    rate_settings: RateSettings,
    extraction_timeout_secs: u64,
}

impl Setup {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            source: Arc::new(market()),
            mirror: true,
            rate_settings: RateSettings::default(),
            extraction_timeout_secs: 5,
        }
    }

    pub fn rate_source(mut self, source: Arc<dyn RateSource>) -> Self {
        self.source = source;
        self
    }

    pub fn rate_settings(mut self, settings: RateSettings) -> Self {
        self.rate_settings = settings;
        self
    }

    /// Point the mirror at a database without its schema: every document store call fails.
    pub fn without_mirror(mut self) -> Self {
        self.mirror = false;
        self
    }

    pub fn extraction_timeout(mut self, secs: u64) -> Self {
        self.extraction_timeout_secs = secs;
        self
    }

    pub async fn build(self) -> Harness {
        let db = relational_db().await;
        let mirror = if self.mirror {
            mirror_db().await
        } else {
            broken_mirror_db().await
        };
        let audit = Arc::new(RecordingAuditSink::default());
        let extractor = Arc::new(ScriptedExtractor::new(self.script));
        let engine = Engine::builder()
            .database(db.clone())
            .mirror_database(mirror.clone())
            .extractor(extractor.clone())
            .rate_source(self.source)
            .audit_sink(audit.clone())
            .rate_settings(self.rate_settings)
            .lifecycle_settings(LifecycleSettings {
                extraction_timeout_secs: self.extraction_timeout_secs,
            })
            .build()
            .await
            .unwrap();
        engine.rates().seed_currency_catalog().await.unwrap();
        Harness {
            engine: Arc::new(engine),
            db,
            mirror,
            audit,
            extractor,
        }
    }
}

pub async fn relational_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    for (id, username, role) in [
        (ADMIN_ID, "admin", "system_admin"),
        (LOGGER_ID, "ada", "receipt_logger"),
        (BASIC_ID, "bob", "basic_user"),
        (OTHER_LOGGER_ID, "grace", "receipt_logger"),
    ] {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (id, username, display_name, role, active) VALUES (?, ?, ?, ?, ?)",
            vec![
                id.into(),
                username.into(),
                username.into(),
                role.into(),
                true.into(),
            ],
        ))
        .await
        .unwrap();
    }
    db
}

pub async fn mirror_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::MirrorMigrator::up(&db, None).await.unwrap();
    db
}

/// Reachable, but `receipt_documents` was never created.
pub async fn broken_mirror_db() -> DatabaseConnection {
    Database::connect("sqlite::memory:").await.unwrap()
}

pub async fn count(db: &DatabaseConnection, sql: &str) -> i64 {
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_string(backend, sql.to_string()))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "n").unwrap()
}
