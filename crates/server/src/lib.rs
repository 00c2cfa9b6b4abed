use api_types::error::ErrorBody;
use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

pub use server::{ServerState, run_with_listener, spawn_with_listener};

mod archive;
mod rates;
mod receipts;
mod server;
mod user;

/// Build the router without binding a listener.
pub fn app(state: ServerState) -> axum::Router {
    server::router(state)
}

#[derive(Debug)]
pub enum ServerError {
    Engine(EngineError),
    /// Malformed request that never reached the engine.
    Generic(String),
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Permission(_) => StatusCode::FORBIDDEN,
        EngineError::InvalidStateTransition(_) => StatusCode::CONFLICT,
        EngineError::Extraction { .. } => StatusCode::BAD_GATEWAY,
        EngineError::RateUnavailable(_) | EngineError::MirrorWrite(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        EngineError::Configuration(_) | EngineError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn message_for_engine_error(err: &EngineError) -> String {
    match err {
        EngineError::Storage(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ServerError::Engine(err) => (
                status_for_engine_error(&err),
                ErrorBody {
                    kind: err.kind().to_string(),
                    message: message_for_engine_error(&err),
                    receipt_id: err.receipt_id(),
                },
            ),
            ServerError::Generic(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    kind: "validation_error".to_string(),
                    message,
                    receipt_id: None,
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::ExtractionError;

    fn status(err: EngineError) -> StatusCode {
        ServerError::from(err).into_response().status()
    }

    #[test]
    fn engine_errors_map_to_statuses() {
        assert_eq!(status(EngineError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(EngineError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(EngineError::Permission("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(
            status(EngineError::InvalidStateTransition("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(EngineError::RateUnavailable("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(EngineError::Configuration("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn extraction_failure_maps_to_502() {
        let err = EngineError::Extraction {
            receipt_id: Some(3),
            source: ExtractionError::transport("timed out"),
        };
        assert_eq!(status(err), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
