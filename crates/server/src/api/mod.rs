//! JSON API for the negotiation workflow core.
//!
//! Endpoints:
//! - `POST /api/v1/conversations`                         — open a buyer-seller thread
//! - `GET  /api/v1/conversations/{id}`                    — thread + resolved panel state
//! - `POST /api/v1/conversations/{id}/request-quote`      — buyer adds the quote context
//! - `POST /api/v1/quotes`                                — seller proposes a quote
//! - `POST /api/v1/quotes/{id}/accept`                    — buyer accepts
//! - `POST /api/v1/quotes/{id}/reject`                    — buyer rejects
//! - `POST /api/v1/design-approvals`                      — buyer uploads design files
//! - `POST /api/v1/design-approvals/{id}/approve`         — seller approves
//! - `POST /api/v1/design-approvals/{id}/reject`          — seller rejects
//! - `POST /api/v1/design-approvals/{id}/request-changes` — seller asks for a revision
//! - `POST /api/v1/cart`                                  — bridge: add a cart line

pub mod cart;
pub mod conversations;
pub mod designs;
pub mod quotes;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use haggle_core::audit::AuditEvent;
use haggle_core::errors::{ApplicationError, DomainError, InterfaceError};
use haggle_db::repositories::{AuditEventRepository, RepositoryError, SqlAuditEventRepository};
use haggle_db::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new()
        .route("/api/v1/conversations", post(conversations::create))
        .route("/api/v1/conversations/{id}", get(conversations::get))
        .route("/api/v1/conversations/{id}/request-quote", post(conversations::request_quote))
        .route("/api/v1/quotes", post(quotes::create))
        .route("/api/v1/quotes/{id}/accept", post(quotes::accept))
        .route("/api/v1/quotes/{id}/reject", post(quotes::reject))
        .route("/api/v1/design-approvals", post(designs::create))
        .route("/api/v1/design-approvals/{id}/approve", post(designs::approve))
        .route("/api/v1/design-approvals/{id}/reject", post(designs::reject))
        .route("/api/v1/design-approvals/{id}/request-changes", post(designs::request_changes))
        .route("/api/v1/cart", post(cart::add_line))
        .with_state(AppState { db_pool })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    pub fn from_domain(error: DomainError, correlation_id: &str) -> Self {
        Self(ApplicationError::from(error).into_interface(correlation_id))
    }

    pub fn from_repository(error: RepositoryError, correlation_id: &str) -> Self {
        Self(ApplicationError::Persistence(error.to_string()).into_interface(correlation_id))
    }

    pub fn not_found(entity: &'static str, id: &str, correlation_id: &str) -> Self {
        Self::from_domain(DomainError::NotFound { entity, id: id.to_string() }, correlation_id)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.0.user_message().to_string(),
            message: self.0.to_string(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn new_correlation_id() -> String {
    format!("req-{}", Uuid::new_v4())
}

/// Audit failures never fail the mutation they describe.
pub async fn record_audit(pool: &DbPool, event: AuditEvent) {
    let repo = SqlAuditEventRepository::new(pool.clone());
    if let Err(err) = repo.append(event).await {
        warn!(
            event_name = "system.audit.append_failed",
            correlation_id = "unknown",
            conversation_id = "unknown",
            error = %err,
            "failed to persist audit event"
        );
    }
}
