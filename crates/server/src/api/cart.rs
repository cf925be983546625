use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use haggle_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use haggle_core::domain::cart::{CartIntent, CartLine, CartLineId};
use haggle_core::domain::catalog::VariantId;
use haggle_core::domain::conversation::BuyerId;
use haggle_core::domain::design::DesignApprovalId;
use haggle_core::domain::quote::QuoteId;
use haggle_core::errors::DomainError;
use haggle_db::repositories::{
    CartRepository, CatalogRepository, QuoteRepository, SqlCartRepository, SqlCatalogRepository,
    SqlQuoteRepository,
};

use super::{new_correlation_id, record_audit, ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartLineRequest {
    pub buyer_id: String,
    pub product_variant_id: Option<String>,
    pub design_approval_id: Option<String>,
    /// When present, the line is sourced from an accepted quote and carries
    /// its locked price/quantity; variant and quantity fields are ignored.
    pub quote_id: Option<String>,
    pub quantity: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineResponse {
    pub id: String,
    pub buyer_id: String,
    pub product_variant_id: String,
    pub design_approval_id: Option<String>,
    pub quote_id: Option<String>,
    pub quantity: u32,
    pub effective_unit_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CartLine> for CartLineResponse {
    fn from(line: CartLine) -> Self {
        Self {
            id: line.id.0,
            buyer_id: line.buyer_id.0,
            product_variant_id: line.product_variant_id.0,
            design_approval_id: line.design_approval_id.map(|id| id.0),
            quote_id: line.quote_id.map(|id| id.0),
            quantity: line.quantity,
            effective_unit_price: line.effective_unit_price,
            created_at: line.created_at,
            updated_at: line.updated_at,
        }
    }
}

pub async fn add_line(
    State(state): State<AppState>,
    Json(payload): Json<AddCartLineRequest>,
) -> Result<(StatusCode, Json<CartLineResponse>), ApiError> {
    let correlation_id = new_correlation_id();
    let cart = SqlCartRepository::new(state.db_pool.clone());
    let buyer_id = BuyerId(payload.buyer_id.clone());

    let mut intent = if let Some(quote_id) = &payload.quote_id {
        let quotes = SqlQuoteRepository::new(state.db_pool.clone());
        let quote = quotes
            .find_by_id(&QuoteId(quote_id.clone()))
            .await
            .map_err(|e| ApiError::from_repository(e, &correlation_id))?
            .ok_or_else(|| ApiError::not_found("quote", quote_id, &correlation_id))?;

        CartIntent::from_accepted_quote(&quote, buyer_id)
            .map_err(|e| ApiError::from_domain(e, &correlation_id))?
    } else {
        let variant_id = payload.product_variant_id.clone().ok_or_else(|| {
            ApiError::from_domain(
                DomainError::Validation {
                    field: "product_variant_id",
                    message: "required unless the line is quote-sourced".to_string(),
                },
                &correlation_id,
            )
        })?;
        let catalog = SqlCatalogRepository::new(state.db_pool.clone());
        let variant = catalog
            .find_variant(&VariantId(variant_id.clone()))
            .await
            .map_err(|e| ApiError::from_repository(e, &correlation_id))?
            .ok_or_else(|| ApiError::not_found("variant", &variant_id, &correlation_id))?;

        CartIntent::from_variant(&variant, buyer_id, payload.quantity.unwrap_or(0), None)
            .map_err(|e| ApiError::from_domain(e, &correlation_id))?
    };

    if let Some(design_approval_id) = payload.design_approval_id {
        intent.design_approval_id = Some(DesignApprovalId(design_approval_id));
    }

    let line = cart
        .upsert_line(intent, CartLineId(format!("line-{}", Uuid::new_v4())), Utc::now())
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?;

    info!(
        event_name = "cart.line_added",
        correlation_id = %correlation_id,
        conversation_id = "unknown",
        cart_line_id = %line.id.0,
        variant_id = %line.product_variant_id.0,
        quote_id = line.quote_id.as_ref().map(|id| id.0.as_str()).unwrap_or("none"),
        "cart line added"
    );
    let mut audit = AuditEvent::new(
        None,
        correlation_id,
        "cart.line_added",
        AuditCategory::Cart,
        "buyer",
        AuditOutcome::Success,
    )
    .with_metadata("cart_line_id", line.id.0.clone())
    .with_metadata("effective_unit_price", line.effective_unit_price.to_string());
    if let Some(quote_id) = &line.quote_id {
        audit = audit.with_metadata("quote_id", quote_id.0.clone());
    }
    record_audit(&state.db_pool, audit).await;

    Ok((StatusCode::CREATED, Json(line.into())))
}
