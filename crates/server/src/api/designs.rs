use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use haggle_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use haggle_core::domain::catalog::{PackageId, ProductId, ServiceId, VariantId};
use haggle_core::domain::conversation::ConversationId;
use haggle_core::domain::design::{
    sole_variant_binding, DesignApproval, DesignApprovalId, DesignContext, DesignFile,
    DesignStatus, NewDesignApproval,
};
use haggle_core::errors::DomainError;
use haggle_db::repositories::{
    CatalogRepository, ConversationRepository, DesignApprovalRepository, SqlCatalogRepository,
    SqlConversationRepository, SqlDesignApprovalRepository,
};

use super::{new_correlation_id, record_audit, ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignFilePayload {
    pub url: String,
    pub filename: String,
    pub size_bytes: u64,
    pub mime_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDesignRequest {
    pub conversation_id: String,
    pub context: DesignContext,
    pub product_id: Option<String>,
    pub service_id: Option<String>,
    pub variant_id: Option<String>,
    pub package_id: Option<String>,
    pub design_files: Vec<DesignFilePayload>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RejectDesignRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestChangesRequest {
    pub notes: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignFileResponse {
    pub url: String,
    pub filename: String,
    pub size_bytes: u64,
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignResponse {
    pub id: String,
    pub conversation_id: String,
    pub product_id: Option<String>,
    pub service_id: Option<String>,
    pub buyer_id: String,
    pub variant_id: Option<String>,
    pub package_id: Option<String>,
    pub context: DesignContext,
    pub status: DesignStatus,
    pub design_files: Vec<DesignFileResponse>,
    pub seller_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DesignApproval> for DesignResponse {
    fn from(design: DesignApproval) -> Self {
        Self {
            id: design.id.0,
            conversation_id: design.conversation_id.0,
            product_id: design.product_id.map(|id| id.0),
            service_id: design.service_id.map(|id| id.0),
            buyer_id: design.buyer_id.0,
            variant_id: design.variant_id.map(|id| id.0),
            package_id: design.package_id.map(|id| id.0),
            context: design.context,
            status: design.status,
            design_files: design
                .files
                .into_iter()
                .map(|file| DesignFileResponse {
                    url: file.url,
                    filename: file.filename,
                    size_bytes: file.size_bytes,
                    mime_type: file.mime_type,
                })
                .collect(),
            seller_notes: design.seller_notes,
            created_at: design.created_at,
            updated_at: design.updated_at,
        }
    }
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateDesignRequest>,
) -> Result<(StatusCode, Json<DesignResponse>), ApiError> {
    let correlation_id = new_correlation_id();
    let conversations = SqlConversationRepository::new(state.db_pool.clone());
    let catalog = SqlCatalogRepository::new(state.db_pool.clone());
    let designs = SqlDesignApprovalRepository::new(state.db_pool.clone());

    let conversation = conversations
        .find_by_id(&ConversationId(payload.conversation_id.clone()))
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?
        .ok_or_else(|| {
            ApiError::not_found("conversation", &payload.conversation_id, &correlation_id)
        })?;

    let product_id = payload.product_id.map(ProductId).or(conversation.product_id);
    let service_id = payload.service_id.map(ServiceId).or(conversation.service_id);

    // How many options the buyer could have bound; uploads stay unbound only
    // when there is no real choice to make.
    let binding_options = if let Some(product) = &product_id {
        catalog
            .list_variants(product)
            .await
            .map_err(|e| ApiError::from_repository(e, &correlation_id))?
            .iter()
            .filter(|variant| variant.active)
            .count()
    } else if let Some(service) = &service_id {
        catalog
            .list_packages(service)
            .await
            .map_err(|e| ApiError::from_repository(e, &correlation_id))?
            .iter()
            .filter(|package| package.active)
            .count()
    } else {
        0
    };

    let design = NewDesignApproval {
        conversation_id: conversation.id,
        product_id,
        service_id,
        buyer_id: conversation.buyer_id,
        variant_id: payload.variant_id.map(VariantId),
        package_id: payload.package_id.map(PackageId),
        context: payload.context,
        files: payload
            .design_files
            .into_iter()
            .map(|file| DesignFile {
                url: file.url,
                filename: file.filename,
                size_bytes: file.size_bytes,
                mime_type: file.mime_type,
            })
            .collect(),
    }
    .build(DesignApprovalId(format!("design-{}", Uuid::new_v4())), binding_options, Utc::now())
    .map_err(|e| ApiError::from_domain(e, &correlation_id))?;

    designs.insert(design.clone()).await.map_err(|e| ApiError::from_repository(e, &correlation_id))?;

    info!(
        event_name = "design.uploaded",
        correlation_id = %correlation_id,
        conversation_id = %design.conversation_id.0,
        design_id = %design.id.0,
        file_count = design.files.len(),
        "design approval created"
    );
    record_audit(
        &state.db_pool,
        AuditEvent::new(
            Some(design.conversation_id.clone()),
            correlation_id,
            "design.uploaded",
            AuditCategory::Design,
            "buyer",
            AuditOutcome::Success,
        )
        .with_metadata("design_id", design.id.0.clone()),
    )
    .await;

    Ok((StatusCode::CREATED, Json(design.into())))
}

pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<DesignResponse>), ApiError> {
    let correlation_id = new_correlation_id();
    let designs = SqlDesignApprovalRepository::new(state.db_pool.clone());
    let catalog = SqlCatalogRepository::new(state.db_pool.clone());
    let design_id = DesignApprovalId(id.clone());

    let design = designs
        .find_by_id(&design_id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?
        .ok_or_else(|| ApiError::not_found("design approval", &id, &correlation_id))?;

    let mut decided = design.clone();
    decided.approve().map_err(|e| ApiError::from_domain(e, &correlation_id))?;

    apply_guarded(&designs, &design_id, DesignStatus::Approved, None, &correlation_id).await?;

    // Sole-variant fallback: an approval without a binding resolves to the
    // product's only active variant. Flagged loudly; never silent.
    let mut auto_bound: Option<VariantId> = None;
    if design.variant_id.is_none() {
        if let Some(product_id) = &design.product_id {
            let variants = catalog
                .list_variants(product_id)
                .await
                .map_err(|e| ApiError::from_repository(e, &correlation_id))?;
            if let Some(variant_id) = sole_variant_binding(&design, &variants) {
                designs
                    .bind_variant(&design_id, &variant_id, Utc::now())
                    .await
                    .map_err(|e| ApiError::from_repository(e, &correlation_id))?;
                warn!(
                    event_name = "design.sole_variant_bound",
                    correlation_id = %correlation_id,
                    conversation_id = %design.conversation_id.0,
                    design_id = %design.id.0,
                    variant_id = %variant_id.0,
                    "approved design had no variant binding; bound the sole active variant"
                );
                auto_bound = Some(variant_id);
            }
        }
    }

    let updated = designs
        .find_by_id(&design_id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?
        .ok_or_else(|| ApiError::not_found("design approval", &id, &correlation_id))?;

    info!(
        event_name = "design.approved",
        correlation_id = %correlation_id,
        conversation_id = %updated.conversation_id.0,
        design_id = %updated.id.0,
        "design approved; purchase path unlocked"
    );
    let mut audit = AuditEvent::new(
        Some(updated.conversation_id.clone()),
        correlation_id,
        "design.approved",
        AuditCategory::Design,
        "seller",
        AuditOutcome::Success,
    )
    .with_metadata("design_id", updated.id.0.clone());
    if let Some(variant_id) = auto_bound {
        audit = audit.with_metadata("auto_bound_variant_id", variant_id.0);
    }
    record_audit(&state.db_pool, audit).await;

    Ok((StatusCode::OK, Json(updated.into())))
}

pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<RejectDesignRequest>,
) -> Result<(StatusCode, Json<DesignResponse>), ApiError> {
    let correlation_id = new_correlation_id();
    let designs = SqlDesignApprovalRepository::new(state.db_pool.clone());
    let design_id = DesignApprovalId(id.clone());
    let reason = payload.reason;

    let design = designs
        .find_by_id(&design_id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?
        .ok_or_else(|| ApiError::not_found("design approval", &id, &correlation_id))?;

    let mut decided = design.clone();
    decided.reject(reason.clone()).map_err(|e| ApiError::from_domain(e, &correlation_id))?;

    apply_guarded(&designs, &design_id, DesignStatus::Rejected, reason.clone(), &correlation_id)
        .await?;

    let updated = designs
        .find_by_id(&design_id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?
        .ok_or_else(|| ApiError::not_found("design approval", &id, &correlation_id))?;

    info!(
        event_name = "design.rejected",
        correlation_id = %correlation_id,
        conversation_id = %updated.conversation_id.0,
        design_id = %updated.id.0,
        "design rejected"
    );
    let mut audit = AuditEvent::new(
        Some(updated.conversation_id.clone()),
        correlation_id,
        "design.rejected",
        AuditCategory::Design,
        "seller",
        AuditOutcome::Success,
    )
    .with_metadata("design_id", updated.id.0.clone());
    if let Some(reason) = reason {
        audit = audit.with_metadata("reason", reason);
    }
    record_audit(&state.db_pool, audit).await;

    Ok((StatusCode::OK, Json(updated.into())))
}

pub async fn request_changes(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<RequestChangesRequest>,
) -> Result<(StatusCode, Json<DesignResponse>), ApiError> {
    let correlation_id = new_correlation_id();
    let designs = SqlDesignApprovalRepository::new(state.db_pool.clone());
    let design_id = DesignApprovalId(id.clone());

    let design = designs
        .find_by_id(&design_id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?
        .ok_or_else(|| ApiError::not_found("design approval", &id, &correlation_id))?;

    let mut decided = design.clone();
    decided
        .request_changes(&payload.notes)
        .map_err(|e| ApiError::from_domain(e, &correlation_id))?;

    apply_guarded(
        &designs,
        &design_id,
        DesignStatus::ChangesRequested,
        Some(payload.notes.clone()),
        &correlation_id,
    )
    .await?;

    let updated = designs
        .find_by_id(&design_id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?
        .ok_or_else(|| ApiError::not_found("design approval", &id, &correlation_id))?;

    info!(
        event_name = "design.changes_requested",
        correlation_id = %correlation_id,
        conversation_id = %updated.conversation_id.0,
        design_id = %updated.id.0,
        "change request recorded; buyer may re-upload"
    );
    record_audit(
        &state.db_pool,
        AuditEvent::new(
            Some(updated.conversation_id.clone()),
            correlation_id,
            "design.changes_requested",
            AuditCategory::Design,
            "seller",
            AuditOutcome::Success,
        )
        .with_metadata("design_id", updated.id.0.clone()),
    )
    .await;

    Ok((StatusCode::OK, Json(updated.into())))
}

async fn apply_guarded(
    designs: &SqlDesignApprovalRepository,
    design_id: &DesignApprovalId,
    next: DesignStatus,
    seller_notes: Option<String>,
    correlation_id: &str,
) -> Result<(), ApiError> {
    let applied = designs
        .transition_guarded(design_id, next, seller_notes, Utc::now())
        .await
        .map_err(|e| ApiError::from_repository(e, correlation_id))?;
    if applied {
        return Ok(());
    }
    // Lost the race against another staff decision on the same record.
    Err(ApiError::from_domain(
        DomainError::InvalidState {
            entity: "design approval",
            state: "already decided".to_string(),
            action: "decide",
        },
        correlation_id,
    ))
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::Json;
    use chrono::Utc;
    use rust_decimal::Decimal;

    use haggle_core::domain::catalog::{Product, ProductId, ProductVariant, VariantId};
    use haggle_core::domain::conversation::{
        BuyerId, Conversation, ConversationId, SellerId, WorkflowContext,
    };
    use haggle_core::domain::design::{DesignContext, DesignStatus};
    use haggle_core::errors::InterfaceError;
    use haggle_db::repositories::{
        CatalogRepository, ConversationRepository, SqlCatalogRepository,
        SqlConversationRepository,
    };
    use haggle_db::{connect_with_settings, migrations};

    use super::{
        approve, create, reject, request_changes, CreateDesignRequest, DesignFilePayload,
        RejectDesignRequest, RequestChangesRequest,
    };
    use crate::api::AppState;

    async fn setup(variant_count: usize) -> AppState {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let now = Utc::now();
        let catalog = SqlCatalogRepository::new(pool.clone());
        catalog
            .save_product(Product {
                id: ProductId("prod-1".to_string()),
                seller_id: "seller-1".to_string(),
                name: "Custom Skate Deck".to_string(),
                requires_quote: false,
                requires_design_approval: true,
                active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("seed product");
        for index in 0..variant_count {
            catalog
                .save_variant(ProductVariant {
                    id: VariantId(format!("variant-{index}")),
                    product_id: ProductId("prod-1".to_string()),
                    label: format!("8.{index}\" deck"),
                    unit_price: Decimal::new(6500, 2),
                    active: true,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .expect("seed variant");
        }

        SqlConversationRepository::new(pool.clone())
            .save(Conversation {
                id: ConversationId("conv-1".to_string()),
                buyer_id: BuyerId("buyer-1".to_string()),
                seller_id: SellerId("seller-1".to_string()),
                product_id: Some(ProductId("prod-1".to_string())),
                service_id: None,
                contexts: vec![WorkflowContext::Product],
                created_at: now,
            })
            .await
            .expect("seed conversation");

        AppState { db_pool: pool }
    }

    fn upload(size_bytes: u64, variant_id: Option<&str>) -> CreateDesignRequest {
        CreateDesignRequest {
            conversation_id: "conv-1".to_string(),
            context: DesignContext::Product,
            product_id: None,
            service_id: None,
            variant_id: variant_id.map(ToString::to_string),
            package_id: None,
            design_files: vec![DesignFilePayload {
                url: "https://cdn.example.com/deck-art.png".to_string(),
                filename: "deck-art.png".to_string(),
                size_bytes,
                mime_type: "image/png".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let state = setup(1).await;

        let error = create(State(state), Json(upload(15 * 1024 * 1024, None)))
            .await
            .expect_err("15MB upload must fail");
        assert!(matches!(error.0, InterfaceError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn unbound_upload_with_several_variants_is_rejected() {
        let state = setup(3).await;

        let error = create(State(state.clone()), Json(upload(2048, None)))
            .await
            .expect_err("binding required");
        assert!(matches!(error.0, InterfaceError::BadRequest { .. }));

        let (status, _) = create(State(state), Json(upload(2048, Some("variant-0"))))
            .await
            .expect("bound upload succeeds");
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn approving_an_unbound_design_binds_the_sole_variant() {
        let state = setup(1).await;

        let (_, Json(design)) = create(State(state.clone()), Json(upload(2048, None)))
            .await
            .expect("upload succeeds");
        assert_eq!(design.variant_id, None);

        let (status, Json(approved)) =
            approve(State(state), Path(design.id)).await.expect("approve succeeds");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(approved.status, DesignStatus::Approved);
        assert_eq!(approved.variant_id.as_deref(), Some("variant-0"));
    }

    #[tokio::test]
    async fn approve_then_reject_conflicts_and_keeps_the_approval() {
        let state = setup(1).await;

        let (_, Json(design)) = create(State(state.clone()), Json(upload(2048, None)))
            .await
            .expect("upload succeeds");

        approve(State(state.clone()), Path(design.id.clone())).await.expect("approve");
        let error = reject(
            State(state.clone()),
            Path(design.id.clone()),
            Json(RejectDesignRequest::default()),
        )
        .await
        .expect_err("second decision conflicts");
        assert!(matches!(error.0, InterfaceError::Conflict { .. }));
    }

    #[tokio::test]
    async fn change_requests_demand_feedback_text() {
        let state = setup(1).await;

        let (_, Json(design)) = create(State(state.clone()), Json(upload(2048, None)))
            .await
            .expect("upload succeeds");

        let error = request_changes(
            State(state.clone()),
            Path(design.id.clone()),
            Json(RequestChangesRequest { notes: "  ".to_string() }),
        )
        .await
        .expect_err("empty notes must fail");
        assert!(matches!(error.0, InterfaceError::BadRequest { .. }));

        let (_, Json(updated)) = request_changes(
            State(state),
            Path(design.id),
            Json(RequestChangesRequest { notes: "shrink the logo".to_string() }),
        )
        .await
        .expect("real feedback succeeds");
        assert_eq!(updated.status, DesignStatus::ChangesRequested);
        assert_eq!(updated.seller_notes.as_deref(), Some("shrink the logo"));
    }
}
