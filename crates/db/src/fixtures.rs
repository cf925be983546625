//! Deterministic demo fixtures for local development and smoke checks.

use chrono::Utc;
use rust_decimal::Decimal;

use haggle_core::domain::catalog::{
    PackageId, Product, ProductId, ProductVariant, Service, ServiceId, ServicePackage, VariantId,
};
use haggle_core::domain::conversation::{
    BuyerId, Conversation, ConversationId, SellerId, WorkflowContext,
};

use crate::repositories::{
    CatalogRepository, ConversationRepository, RepositoryError, SqlCatalogRepository,
    SqlConversationRepository,
};
use crate::DbPool;

pub const SEED_SELLER_ID: &str = "seller-atelier-001";
pub const SEED_BUYER_ID: &str = "buyer-demo-001";

/// Custom product with two variants: declares design approval, not quotes.
pub const SEED_PRODUCT_ID: &str = "prod-custom-jersey";
pub const SEED_VARIANT_IDS: [&str; 2] = ["variant-jersey-home", "variant-jersey-away"];

/// Made-to-order service: declares both quote and design approval.
pub const SEED_SERVICE_ID: &str = "svc-engraving";
pub const SEED_PACKAGE_ID: &str = "pkg-engraving-standard";

pub const SEED_PRODUCT_CONVERSATION_ID: &str = "conv-demo-product";
pub const SEED_QUOTE_CONVERSATION_ID: &str = "conv-demo-quote";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedSummary {
    pub products: usize,
    pub variants: usize,
    pub services: usize,
    pub packages: usize,
    pub conversations: usize,
}

pub async fn seed_demo(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
    let now = Utc::now();
    let catalog = SqlCatalogRepository::new(pool.clone());
    let conversations = SqlConversationRepository::new(pool.clone());

    catalog
        .save_product(Product {
            id: ProductId(SEED_PRODUCT_ID.to_string()),
            seller_id: SEED_SELLER_ID.to_string(),
            name: "Custom Team Jersey".to_string(),
            requires_quote: false,
            requires_design_approval: true,
            active: true,
            created_at: now,
            updated_at: now,
        })
        .await?;

    for (index, variant_id) in SEED_VARIANT_IDS.iter().enumerate() {
        catalog
            .save_variant(ProductVariant {
                id: VariantId(variant_id.to_string()),
                product_id: ProductId(SEED_PRODUCT_ID.to_string()),
                label: if index == 0 { "Home colors" } else { "Away colors" }.to_string(),
                unit_price: Decimal::new(4500 + index as i64 * 500, 2),
                active: true,
                created_at: now,
                updated_at: now,
            })
            .await?;
    }

    catalog
        .save_service(Service {
            id: ServiceId(SEED_SERVICE_ID.to_string()),
            seller_id: SEED_SELLER_ID.to_string(),
            name: "Bespoke Engraving".to_string(),
            requires_quote: true,
            requires_design_approval: true,
            active: true,
            created_at: now,
            updated_at: now,
        })
        .await?;

    catalog
        .save_package(ServicePackage {
            id: PackageId(SEED_PACKAGE_ID.to_string()),
            service_id: ServiceId(SEED_SERVICE_ID.to_string()),
            label: "Standard plaque".to_string(),
            price: Decimal::new(12000, 2),
            active: true,
            created_at: now,
            updated_at: now,
        })
        .await?;

    conversations
        .save(Conversation {
            id: ConversationId(SEED_PRODUCT_CONVERSATION_ID.to_string()),
            buyer_id: BuyerId(SEED_BUYER_ID.to_string()),
            seller_id: SellerId(SEED_SELLER_ID.to_string()),
            product_id: Some(ProductId(SEED_PRODUCT_ID.to_string())),
            service_id: None,
            contexts: vec![WorkflowContext::Product],
            created_at: now,
        })
        .await?;

    conversations
        .save(Conversation {
            id: ConversationId(SEED_QUOTE_CONVERSATION_ID.to_string()),
            buyer_id: BuyerId(SEED_BUYER_ID.to_string()),
            seller_id: SellerId(SEED_SELLER_ID.to_string()),
            product_id: None,
            service_id: Some(ServiceId(SEED_SERVICE_ID.to_string())),
            contexts: vec![WorkflowContext::Service, WorkflowContext::Quote],
            created_at: now,
        })
        .await?;

    Ok(SeedSummary {
        products: 1,
        variants: SEED_VARIANT_IDS.len(),
        services: 1,
        packages: 1,
        conversations: 2,
    })
}

#[cfg(test)]
mod tests {
    use haggle_core::domain::catalog::ProductId;
    use haggle_core::domain::conversation::{ConversationId, WorkflowContext};

    use super::{
        seed_demo, SEED_PRODUCT_ID, SEED_QUOTE_CONVERSATION_ID, SEED_VARIANT_IDS,
    };
    use crate::repositories::{
        CatalogRepository, ConversationRepository, SqlCatalogRepository,
        SqlConversationRepository,
    };
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn seed_is_idempotent_and_matches_its_contract() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let first = seed_demo(&pool).await.expect("first seed");
        let second = seed_demo(&pool).await.expect("reseeding is safe");
        assert_eq!(first, second);

        let catalog = SqlCatalogRepository::new(pool.clone());
        let variants = catalog
            .list_variants(&ProductId(SEED_PRODUCT_ID.to_string()))
            .await
            .expect("variants");
        assert_eq!(variants.len(), SEED_VARIANT_IDS.len());

        let conversations = SqlConversationRepository::new(pool);
        let quote_conversation = conversations
            .find_by_id(&ConversationId(SEED_QUOTE_CONVERSATION_ID.to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert!(quote_conversation.has_context(WorkflowContext::Quote));
        assert!(quote_conversation.has_context(WorkflowContext::Service));
    }
}
