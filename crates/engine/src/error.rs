//! The module contains the errors the engine can throw.
//!
//! The taxonomy is:
//!
//! - [`Validation`] bad input shape, never retried.
//! - [`NotFound`] unknown receipt, currency or mirror document.
//! - [`Permission`] ownership or role mismatch.
//! - [`InvalidStateTransition`] a lifecycle precondition was violated.
//! - [`Extraction`] the extraction gateway failed (see [`ExtractionErrorKind`]).
//! - [`RateUnavailable`] no usable exchange rate.
//! - [`Storage`] the system-of-record failed; always fatal to the request.
//! - [`MirrorWrite`] the document mirror failed; fatal only to mirror-only operations.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`NotFound`]: EngineError::NotFound
//!  [`Permission`]: EngineError::Permission
//!  [`InvalidStateTransition`]: EngineError::InvalidStateTransition
//!  [`Extraction`]: EngineError::Extraction
//!  [`RateUnavailable`]: EngineError::RateUnavailable
//!  [`Storage`]: EngineError::Storage
//!  [`MirrorWrite`]: EngineError::MirrorWrite
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which external dependency failed during an extraction attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionErrorKind {
    /// Image fetch failed or the call timed out.
    Transport,
    /// The model answered with a non-2xx status or a malformed body.
    Upstream,
    /// The call succeeded but a required field is missing or unusable.
    Semantic,
}

impl ExtractionErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Upstream => "upstream",
            Self::Semantic => "semantic",
        }
    }
}

/// Uniform failure shape returned by every [`Extractor`](crate::extraction::Extractor).
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{} extraction failure: {message}", .kind.as_str())]
pub struct ExtractionError {
    pub kind: ExtractionErrorKind,
    pub message: String,
}

impl ExtractionError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: ExtractionErrorKind::Transport,
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self {
            kind: ExtractionErrorKind::Upstream,
            message: message.into(),
        }
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Self {
            kind: ExtractionErrorKind::Semantic,
            message: message.into(),
        }
    }
}

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    Permission(String),
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
    #[error("Extraction failed for receipt {receipt_id:?}: {source}")]
    Extraction {
        receipt_id: Option<i64>,
        #[source]
        source: ExtractionError,
    },
    #[error("Exchange rate unavailable: {0}")]
    RateUnavailable(String),
    #[error("Mirror store failure: {0}")]
    MirrorWrite(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Storage(#[from] DbErr),
}

impl EngineError {
    /// Machine-readable kind, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Permission(_) => "permission_denied",
            Self::InvalidStateTransition(_) => "invalid_state_transition",
            Self::Extraction { .. } => "extraction_failure",
            Self::RateUnavailable(_) => "rate_unavailable",
            Self::MirrorWrite(_) => "mirror_write_failure",
            Self::Configuration(_) => "configuration_error",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Receipt that was left behind by a failed operation, if any.
    pub fn receipt_id(&self) -> Option<i64> {
        match self {
            Self::Extraction { receipt_id, .. } => *receipt_id,
            _ => None,
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Permission(a), Self::Permission(b)) => a == b,
            (Self::InvalidStateTransition(a), Self::InvalidStateTransition(b)) => a == b,
            (
                Self::Extraction {
                    receipt_id: a,
                    source: sa,
                },
                Self::Extraction {
                    receipt_id: b,
                    source: sb,
                },
            ) => a == b && sa == sb,
            (Self::RateUnavailable(a), Self::RateUnavailable(b)) => a == b,
            (Self::MirrorWrite(a), Self::MirrorWrite(b)) => a == b,
            (Self::Configuration(a), Self::Configuration(b)) => a == b,
            (Self::Storage(a), Self::Storage(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_error_message_names_the_kind() {
        let err = ExtractionError::transport("timed out after 30s");
        assert_eq!(err.to_string(), "transport extraction failure: timed out after 30s");
    }

    #[test]
    fn kind_is_machine_readable() {
        let err = EngineError::Extraction {
            receipt_id: Some(7),
            source: ExtractionError::semantic("missing vendorName"),
        };
        assert_eq!(err.kind(), "extraction_failure");
        assert_eq!(err.receipt_id(), Some(7));
        assert_eq!(
            EngineError::InvalidStateTransition("x".to_string()).kind(),
            "invalid_state_transition"
        );
    }
}
