pub use audit::{AuditAction, AuditEvent, AuditSink, TracingAuditSink};
pub use currency::{Currency, CurrencyCode};
pub use error::{EngineError, ExtractionError, ExtractionErrorKind};
pub use exchange_rates::ExchangeRate;
pub use extraction::{
    ExtractedReceipt, Extraction, Extractor, GeminiExtractor, ImageSource, validate_payload,
};
pub use mirror::{
    ArchiveOutcome, DocumentPatch, MIN_BULK_ARCHIVE_DAYS, MirrorStats, ReceiptDocument,
    Synchronizer,
};
pub use money::Money;
pub use ops::{
    ConfirmReceipt, ConversionPolicy, DEFAULT_BULK_ARCHIVE_DAYS, Engine, EngineBuilder,
    ReceiptDetails, UploadOutcome,
};
pub use principal::{Principal, Role};
pub use rates::{
    Conversion, ExchangeRateApi, FixedRateSource, RateCache, RateSource, RateSourceError,
    RefreshReport,
};
pub use receipts::{Receipt, ReceiptStatus};
pub use settings::{ExtractionSettings, LifecycleSettings, RateSettings};
pub use transactions::{Normalization, Transaction};

mod audit;
mod currency;
mod error;
mod exchange_rates;
pub mod extraction;
pub mod mirror;
mod money;
mod ops;
mod principal;
pub mod rates;
mod receipts;
mod settings;
mod transactions;

type ResultEngine<T> = Result<T, EngineError>;
