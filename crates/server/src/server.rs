use axum::{
    Extension, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use sea_orm::DatabaseConnection;

use std::sync::Arc;

use crate::{archive, rates, receipts, user};
use engine::{Engine, Principal};

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    /// Relational store, used here only to resolve API tokens.
    pub db: DatabaseConnection,
}

/// Resolve the bearer token to a principal and hand it to the handlers.
async fn auth(
    auth_header: Option<TypedHeader<Authorization<Bearer>>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(TypedHeader(Authorization(bearer))) = auth_header else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    if bearer.token().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let user = user::by_token(&state.db, bearer.token())
        .await
        .map_err(|err| {
            tracing::error!("failed to look up api token: {err}");
            StatusCode::UNAUTHORIZED
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let Some(principal) = user.principal() else {
        tracing::warn!(user_id = user.id, role = %user.role, "user has an unknown role");
        return Err(StatusCode::UNAUTHORIZED);
    };

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Role gate for administrative routes. Runs after `auth`.
async fn require_admin(
    Extension(principal): Extension<Principal>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !principal.active || !principal.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(next.run(request).await)
}

pub(crate) fn router(state: ServerState) -> Router {
    let admin = Router::new()
        .route("/rates/refresh", post(rates::refresh))
        .route("/archive/bulk", post(archive::bulk))
        .route("/documents/{id}", delete(archive::delete_permanently))
        .route_layer(middleware::from_fn(require_admin));

    Router::new()
        .route("/receipts", post(receipts::upload))
        .route("/receipts/{id}", get(receipts::get))
        .route("/receipts/{id}/confirm", post(receipts::confirm))
        .route("/receipts/{id}/cancel", post(receipts::cancel))
        .route("/receipts/{id}/reject", post(receipts::reject))
        .route(
            "/receipts/{id}/archive",
            post(archive::archive).delete(archive::unarchive),
        )
        .route("/transactions", get(receipts::transactions))
        .route("/documents", get(archive::documents))
        .route("/documents/search", get(archive::search))
        .route("/documents/archived", get(archive::archived))
        .route("/documents/stats", get(archive::stats))
        .route("/currencies", get(rates::currencies))
        .route("/rates", get(rates::latest))
        .route("/rates/convert", get(rates::convert))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        .with_state(state)
}

pub async fn run_with_listener(
    engine: Arc<Engine>,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState { engine, db };

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    engine: Arc<Engine>,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, db, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
