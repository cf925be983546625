use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use haggle_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use haggle_core::domain::catalog::{PackageId, VariantId};
use haggle_core::domain::conversation::ConversationId;
use haggle_core::domain::design::DesignApprovalId;
use haggle_core::domain::quote::{NewQuote, Quote, QuoteId, QuoteStatus};
use haggle_core::errors::DomainError;
use haggle_db::repositories::{
    ConversationRepository, QuoteRepository, SqlConversationRepository, SqlQuoteRepository,
};

use super::{new_correlation_id, record_audit, ApiError, AppState};

const OPEN_STATUSES: [QuoteStatus; 2] = [QuoteStatus::Pending, QuoteStatus::Sent];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuoteRequest {
    pub conversation_id: String,
    pub quoted_price: Decimal,
    pub quantity: u32,
    pub product_variant_id: Option<String>,
    pub service_package_id: Option<String>,
    pub design_approval_id: Option<String>,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Mark the quote as delivered to the buyer right away.
    #[serde(default)]
    pub send: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RejectQuoteRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub id: String,
    pub conversation_id: String,
    pub quoted_price: Decimal,
    pub quantity: u32,
    pub product_variant_id: Option<String>,
    pub service_package_id: Option<String>,
    pub design_approval_id: Option<String>,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Quote> for QuoteResponse {
    fn from(quote: Quote) -> Self {
        Self {
            id: quote.id.0,
            conversation_id: quote.conversation_id.0,
            quoted_price: quote.quoted_price,
            quantity: quote.quantity,
            product_variant_id: quote.product_variant_id.map(|id| id.0),
            service_package_id: quote.service_package_id.map(|id| id.0),
            design_approval_id: quote.design_approval_id.map(|id| id.0),
            notes: quote.notes,
            expires_at: quote.expires_at,
            status: quote.status,
            created_at: quote.created_at,
            updated_at: quote.updated_at,
        }
    }
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuoteRequest>,
) -> Result<(StatusCode, Json<QuoteResponse>), ApiError> {
    let correlation_id = new_correlation_id();
    let conversations = SqlConversationRepository::new(state.db_pool.clone());
    let quotes = SqlQuoteRepository::new(state.db_pool.clone());

    let conversation_id = ConversationId(payload.conversation_id.clone());
    let conversation = conversations
        .find_by_id(&conversation_id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?
        .ok_or_else(|| {
            ApiError::not_found("conversation", &payload.conversation_id, &correlation_id)
        })?;

    // The prior active quote is superseded by this insert, never rewritten.
    let superseded = quotes
        .latest_for_conversation(&conversation_id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?
        .filter(|prior| prior.status.is_open());

    let now = Utc::now();
    let mut quote = NewQuote {
        conversation_id: conversation.id,
        quoted_price: payload.quoted_price,
        quantity: payload.quantity,
        product_variant_id: payload.product_variant_id.map(VariantId),
        service_package_id: payload.service_package_id.map(PackageId),
        design_approval_id: payload.design_approval_id.map(DesignApprovalId),
        notes: payload.notes,
        expires_at: payload.expires_at,
    }
    .build(QuoteId(format!("quote-{}", Uuid::new_v4())), now)
    .map_err(|e| ApiError::from_domain(e, &correlation_id))?;

    quotes.insert(quote.clone()).await.map_err(|e| ApiError::from_repository(e, &correlation_id))?;

    if payload.send {
        quotes
            .transition_guarded(&quote.id, &[QuoteStatus::Pending], QuoteStatus::Sent, now)
            .await
            .map_err(|e| ApiError::from_repository(e, &correlation_id))?;
        quote.status = QuoteStatus::Sent;
    }

    info!(
        event_name = "quote.created",
        correlation_id = %correlation_id,
        conversation_id = %quote.conversation_id.0,
        quote_id = %quote.id.0,
        superseded_quote_id = superseded.as_ref().map(|q| q.id.0.as_str()).unwrap_or("none"),
        "quote created"
    );
    let mut audit = AuditEvent::new(
        Some(quote.conversation_id.clone()),
        correlation_id,
        "quote.created",
        AuditCategory::Quote,
        "seller",
        AuditOutcome::Success,
    )
    .with_metadata("quote_id", quote.id.0.clone());
    if let Some(prior) = superseded {
        audit = audit.with_metadata("superseded_quote_id", prior.id.0);
    }
    record_audit(&state.db_pool, audit).await;

    Ok((StatusCode::CREATED, Json(quote.into())))
}

pub async fn accept(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<QuoteResponse>), ApiError> {
    decide(state, id, QuoteStatus::Accepted, None, "quote.accepted", "buyer").await
}

pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<RejectQuoteRequest>,
) -> Result<(StatusCode, Json<QuoteResponse>), ApiError> {
    decide(state, id, QuoteStatus::Rejected, payload.reason, "quote.rejected", "buyer").await
}

async fn decide(
    state: AppState,
    id: String,
    next: QuoteStatus,
    reason: Option<String>,
    event_type: &'static str,
    actor: &'static str,
) -> Result<(StatusCode, Json<QuoteResponse>), ApiError> {
    let correlation_id = new_correlation_id();
    let quotes = SqlQuoteRepository::new(state.db_pool.clone());
    let quote_id = QuoteId(id.clone());

    let quote = quotes
        .find_by_id(&quote_id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?
        .ok_or_else(|| ApiError::not_found("quote", &id, &correlation_id))?;

    let now = Utc::now();
    // Expiry is time-based: an open quote past its deadline is recorded as
    // expired before the decision is refused.
    if quote.status.is_open() && quote.is_past_expiry(now) {
        quotes
            .transition_guarded(&quote_id, &OPEN_STATUSES, QuoteStatus::Expired, now)
            .await
            .map_err(|e| ApiError::from_repository(e, &correlation_id))?;
        return Err(ApiError::from_domain(
            DomainError::InvalidState {
                entity: "quote",
                state: "expired".to_string(),
                action: "decide",
            },
            &correlation_id,
        ));
    }

    if !quote.can_transition_to(next) {
        return Err(ApiError::from_domain(
            DomainError::InvalidQuoteTransition { from: quote.status, to: next },
            &correlation_id,
        ));
    }

    let applied = quotes
        .transition_guarded(&quote_id, &OPEN_STATUSES, next, now)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?;
    if !applied {
        // Lost the race against another decision on the same record.
        return Err(ApiError::from_domain(
            DomainError::InvalidState {
                entity: "quote",
                state: "already decided".to_string(),
                action: "decide",
            },
            &correlation_id,
        ));
    }

    let updated = quotes
        .find_by_id(&quote_id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?
        .ok_or_else(|| ApiError::not_found("quote", &id, &correlation_id))?;

    info!(
        event_name = event_type,
        correlation_id = %correlation_id,
        conversation_id = %updated.conversation_id.0,
        quote_id = %updated.id.0,
        "quote decision recorded"
    );
    let mut audit = AuditEvent::new(
        Some(updated.conversation_id.clone()),
        correlation_id,
        event_type,
        AuditCategory::Quote,
        actor,
        AuditOutcome::Success,
    )
    .with_metadata("quote_id", updated.id.0.clone());
    if let Some(reason) = reason {
        audit = audit.with_metadata("reason", reason);
    }
    record_audit(&state.db_pool, audit).await;

    Ok((StatusCode::OK, Json(updated.into())))
}
