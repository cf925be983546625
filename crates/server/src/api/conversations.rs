use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use haggle_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use haggle_core::domain::catalog::{ProductId, ServiceId};
use haggle_core::domain::conversation::{
    BuyerId, Conversation, ConversationId, SellerId, WorkflowContext,
};
use haggle_core::workflow::resolver::{design_badge, quote_badge, resolve, PanelKind, ResolveInput};
use haggle_db::repositories::{
    CatalogRepository, ConversationRepository, DesignApprovalRepository, QuoteRepository,
    SqlCatalogRepository, SqlConversationRepository, SqlDesignApprovalRepository,
    SqlQuoteRepository,
};

use super::{new_correlation_id, record_audit, ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub buyer_id: String,
    pub seller_id: String,
    pub product_id: Option<String>,
    pub service_id: Option<String>,
    #[serde(default)]
    pub workflow_contexts: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelStateResponse {
    pub show_quote_panel: bool,
    pub show_design_panel: bool,
    pub steps: Vec<PanelKind>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgesResponse {
    pub quote: String,
    pub design: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub product_id: Option<String>,
    pub service_id: Option<String>,
    pub workflow_contexts: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationWorkflowResponse {
    #[serde(flatten)]
    pub conversation: ConversationResponse,
    pub panels: PanelStateResponse,
    pub badges: BadgesResponse,
    pub latest_quote_id: Option<String>,
    pub pending_design_count: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestQuoteResponse {
    pub workflow_contexts: Vec<String>,
    pub changed: bool,
}

impl From<Conversation> for ConversationResponse {
    fn from(conversation: Conversation) -> Self {
        Self {
            id: conversation.id.0,
            buyer_id: conversation.buyer_id.0,
            seller_id: conversation.seller_id.0,
            product_id: conversation.product_id.map(|id| id.0),
            service_id: conversation.service_id.map(|id| id.0),
            workflow_contexts: conversation
                .contexts
                .iter()
                .map(|context| context.as_str().to_string())
                .collect(),
            created_at: conversation.created_at,
        }
    }
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationResponse>), ApiError> {
    let correlation_id = new_correlation_id();
    let conversations = SqlConversationRepository::new(state.db_pool.clone());

    let contexts = payload
        .workflow_contexts
        .iter()
        .map(|raw| raw.parse::<WorkflowContext>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::from_domain(e, &correlation_id))?;

    let conversation = Conversation {
        id: ConversationId(format!("conv-{}", Uuid::new_v4())),
        buyer_id: BuyerId(payload.buyer_id),
        seller_id: SellerId(payload.seller_id),
        product_id: payload.product_id.map(ProductId),
        service_id: payload.service_id.map(ServiceId),
        contexts,
        created_at: Utc::now(),
    };

    conversations
        .save(conversation.clone())
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?;

    info!(
        event_name = "conversation.created",
        correlation_id = %correlation_id,
        conversation_id = %conversation.id.0,
        "conversation created"
    );
    record_audit(
        &state.db_pool,
        AuditEvent::new(
            Some(conversation.id.clone()),
            correlation_id,
            "conversation.created",
            AuditCategory::Ingress,
            "buyer",
            AuditOutcome::Success,
        ),
    )
    .await;

    Ok((StatusCode::CREATED, Json(conversation.into())))
}

/// Conversation read: contexts plus the freshly-resolved panel state. The
/// resolver runs on every read; nothing here is cached.
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ConversationWorkflowResponse>), ApiError> {
    let correlation_id = new_correlation_id();
    let conversations = SqlConversationRepository::new(state.db_pool.clone());
    let catalog = SqlCatalogRepository::new(state.db_pool.clone());
    let quotes = SqlQuoteRepository::new(state.db_pool.clone());
    let designs = SqlDesignApprovalRepository::new(state.db_pool.clone());

    let conversation = conversations
        .find_by_id(&ConversationId(id.clone()))
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?
        .ok_or_else(|| ApiError::not_found("conversation", &id, &correlation_id))?;

    // Requirement flags come from the product/service the thread is scoped
    // to, not from the conversation itself.
    let (requires_quote, requires_design_approval) =
        if let Some(product_id) = &conversation.product_id {
            catalog
                .find_product(product_id)
                .await
                .map_err(|e| ApiError::from_repository(e, &correlation_id))?
                .map(|product| (product.requires_quote, product.requires_design_approval))
                .unwrap_or((false, false))
        } else if let Some(service_id) = &conversation.service_id {
            catalog
                .find_service(service_id)
                .await
                .map_err(|e| ApiError::from_repository(e, &correlation_id))?
                .map(|service| (service.requires_quote, service.requires_design_approval))
                .unwrap_or((false, false))
        } else {
            (false, false)
        };

    let latest_quote = quotes
        .latest_for_conversation(&conversation.id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?;
    let approved_design = designs
        .approved_for_conversation(&conversation.id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?;
    let pending_design_count = designs
        .pending_count_for_conversation(&conversation.id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?;

    let latest_quote_status = latest_quote.as_ref().map(|quote| quote.status);
    let resolved = resolve(&ResolveInput {
        contexts: conversation.contexts.clone(),
        requires_quote,
        requires_design_approval,
        latest_quote_status,
        has_approved_design: approved_design.is_some(),
        pending_design_count,
    });

    let response = ConversationWorkflowResponse {
        panels: PanelStateResponse {
            show_quote_panel: resolved.show_quote,
            show_design_panel: resolved.show_design,
            steps: resolved.steps,
        },
        badges: BadgesResponse {
            quote: quote_badge(latest_quote_status).label(),
            design: design_badge(approved_design.is_some(), pending_design_count).label(),
        },
        latest_quote_id: latest_quote.map(|quote| quote.id.0),
        pending_design_count,
        conversation: conversation.into(),
    };

    Ok((StatusCode::OK, Json(response)))
}

/// Buyer initiates a quote request: the one legal context mutation.
pub async fn request_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<RequestQuoteResponse>), ApiError> {
    let correlation_id = new_correlation_id();
    let conversations = SqlConversationRepository::new(state.db_pool.clone());
    let conversation_id = ConversationId(id.clone());

    conversations
        .find_by_id(&conversation_id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?
        .ok_or_else(|| ApiError::not_found("conversation", &id, &correlation_id))?;

    let changed = conversations
        .enable_quote_context(&conversation_id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?;

    let updated = conversations
        .find_by_id(&conversation_id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?
        .ok_or_else(|| ApiError::not_found("conversation", &id, &correlation_id))?;

    if changed {
        info!(
            event_name = "conversation.quote_context_enabled",
            correlation_id = %correlation_id,
            conversation_id = %conversation_id.0,
            "quote context added by buyer request"
        );
        record_audit(
            &state.db_pool,
            AuditEvent::new(
                Some(conversation_id),
                correlation_id,
                "conversation.quote_context_enabled",
                AuditCategory::Ingress,
                "buyer",
                AuditOutcome::Success,
            ),
        )
        .await;
    }

    Ok((
        StatusCode::OK,
        Json(RequestQuoteResponse {
            workflow_contexts: updated
                .contexts
                .iter()
                .map(|context| context.as_str().to_string())
                .collect(),
            changed,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, State};
    use axum::Json;
    use chrono::Utc;
    use rust_decimal::Decimal;

    use haggle_core::domain::catalog::{Service, ServiceId};
    use haggle_core::domain::conversation::{
        BuyerId, Conversation, ConversationId, SellerId, WorkflowContext,
    };
    use haggle_db::repositories::{
        CatalogRepository, ConversationRepository, SqlCatalogRepository,
        SqlConversationRepository,
    };
    use haggle_db::{connect_with_settings, migrations};

    use super::{get, request_quote};
    use crate::api::quotes::{accept, create as create_quote, CreateQuoteRequest};
    use crate::api::AppState;

    async fn setup() -> AppState {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let now = Utc::now();
        SqlCatalogRepository::new(pool.clone())
            .save_service(Service {
                id: ServiceId("svc-1".to_string()),
                seller_id: "seller-1".to_string(),
                name: "Bespoke Engraving".to_string(),
                requires_quote: true,
                requires_design_approval: true,
                active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("seed service");

        SqlConversationRepository::new(pool.clone())
            .save(Conversation {
                id: ConversationId("conv-1".to_string()),
                buyer_id: BuyerId("buyer-1".to_string()),
                seller_id: SellerId("seller-1".to_string()),
                product_id: None,
                service_id: Some(ServiceId("svc-1".to_string())),
                contexts: vec![WorkflowContext::Quote],
                created_at: now,
            })
            .await
            .expect("seed conversation");

        AppState { db_pool: pool }
    }

    #[tokio::test]
    async fn design_panel_stays_hidden_until_the_quote_is_accepted() {
        let state = setup().await;

        let (_, Json(before)) =
            get(State(state.clone()), Path("conv-1".to_string())).await.expect("get");
        assert!(before.panels.show_quote_panel);
        assert!(!before.panels.show_design_panel);
        assert_eq!(before.badges.quote, "No Quote");
        assert_eq!(before.badges.design, "No Design");

        let (_, Json(quote)) = create_quote(
            State(state.clone()),
            Json(CreateQuoteRequest {
                conversation_id: "conv-1".to_string(),
                quoted_price: Decimal::new(18000, 2),
                quantity: 1,
                product_variant_id: None,
                service_package_id: None,
                design_approval_id: None,
                notes: None,
                expires_at: None,
                send: true,
            }),
        )
        .await
        .expect("create quote");

        let (_, Json(with_open_quote)) =
            get(State(state.clone()), Path("conv-1".to_string())).await.expect("get");
        assert!(!with_open_quote.panels.show_design_panel, "open quote keeps the panel shut");
        assert_eq!(with_open_quote.badges.quote, "Quote sent");

        accept(State(state.clone()), Path(quote.id)).await.expect("accept quote");

        let (_, Json(after)) =
            get(State(state), Path("conv-1".to_string())).await.expect("get");
        assert!(after.panels.show_design_panel, "acceptance opens the design step");
        assert_eq!(after.badges.quote, "Quote Accepted");
        assert_eq!(after.panels.steps.len(), 2);
    }

    #[tokio::test]
    async fn request_quote_adds_the_context_exactly_once() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlConversationRepository::new(pool.clone())
            .save(Conversation {
                id: ConversationId("conv-2".to_string()),
                buyer_id: BuyerId("buyer-1".to_string()),
                seller_id: SellerId("seller-1".to_string()),
                product_id: None,
                service_id: None,
                contexts: vec![WorkflowContext::Product],
                created_at: Utc::now(),
            })
            .await
            .expect("seed conversation");
        let state = AppState { db_pool: pool };

        let (_, Json(first)) = request_quote(State(state.clone()), Path("conv-2".to_string()))
            .await
            .expect("first request");
        assert!(first.changed);
        assert!(first.workflow_contexts.contains(&"quote".to_string()));

        let (_, Json(second)) = request_quote(State(state), Path("conv-2".to_string()))
            .await
            .expect("second request");
        assert!(!second.changed, "the flag is added at most once");
    }
}
