use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use haggle_core::audit::AuditEvent;
use haggle_core::domain::cart::{CartIntent, CartLine, CartLineId};
use haggle_core::domain::catalog::{
    PackageId, Product, ProductId, ProductVariant, Service, ServiceId, ServicePackage, VariantId,
};
use haggle_core::domain::conversation::{BuyerId, Conversation, ConversationId};
use haggle_core::domain::design::{DesignApproval, DesignApprovalId, DesignStatus};
use haggle_core::domain::quote::{Quote, QuoteId, QuoteStatus};

pub mod audit;
pub mod cart;
pub mod catalog;
pub mod conversation;
pub mod design;
pub mod memory;
pub mod quote;

pub use audit::SqlAuditEventRepository;
pub use cart::SqlCartRepository;
pub use catalog::SqlCatalogRepository;
pub use conversation::SqlConversationRepository;
pub use design::SqlDesignApprovalRepository;
pub use memory::{InMemoryConversationRepository, InMemoryDesignApprovalRepository, InMemoryQuoteRepository};
pub use quote::SqlQuoteRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError>;
    async fn save(&self, conversation: Conversation) -> Result<(), RepositoryError>;
    /// Adds the `quote` context flag if absent. Returns whether the set
    /// changed.
    async fn enable_quote_context(&self, id: &ConversationId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn save_product(&self, product: Product) -> Result<(), RepositoryError>;
    async fn find_variant(&self, id: &VariantId) -> Result<Option<ProductVariant>, RepositoryError>;
    async fn save_variant(&self, variant: ProductVariant) -> Result<(), RepositoryError>;
    async fn list_variants(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<ProductVariant>, RepositoryError>;
    async fn find_service(&self, id: &ServiceId) -> Result<Option<Service>, RepositoryError>;
    async fn save_service(&self, service: Service) -> Result<(), RepositoryError>;
    async fn find_package(&self, id: &PackageId)
        -> Result<Option<ServicePackage>, RepositoryError>;
    async fn save_package(&self, package: ServicePackage) -> Result<(), RepositoryError>;
    async fn list_packages(
        &self,
        service_id: &ServiceId,
    ) -> Result<Vec<ServicePackage>, RepositoryError>;
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
    /// Quotes are append-only: inserting a new row supersedes the prior
    /// active quote for its conversation without touching it.
    async fn insert(&self, quote: Quote) -> Result<(), RepositoryError>;
    /// Newest first.
    async fn list_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Quote>, RepositoryError>;
    /// The computed "active" pointer: newest row by creation time.
    async fn latest_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Quote>, RepositoryError>;
    /// Status-guarded conditional update. Returns false (and leaves the row
    /// untouched) when the current status is not in `allowed_from` — the
    /// optimistic check that protects against racing staff actions.
    async fn transition_guarded(
        &self,
        id: &QuoteId,
        allowed_from: &[QuoteStatus],
        next: QuoteStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait DesignApprovalRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &DesignApprovalId,
    ) -> Result<Option<DesignApproval>, RepositoryError>;
    /// Design approvals are append-only; re-uploads create fresh rows.
    async fn insert(&self, design: DesignApproval) -> Result<(), RepositoryError>;
    /// Newest first, files included.
    async fn list_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<DesignApproval>, RepositoryError>;
    /// The active record for a (conversation, variant-or-package) slot:
    /// newest pending-or-approved row.
    async fn active_for_slot(
        &self,
        conversation_id: &ConversationId,
        variant_id: Option<&VariantId>,
        package_id: Option<&PackageId>,
    ) -> Result<Option<DesignApproval>, RepositoryError>;
    async fn approved_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<DesignApproval>, RepositoryError>;
    async fn pending_count_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<u32, RepositoryError>;
    /// Status-guarded transition out of `pending`. Returns false when the
    /// record already left `pending`; the stored row is untouched.
    async fn transition_guarded(
        &self,
        id: &DesignApprovalId,
        next: DesignStatus,
        seller_notes: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
    /// Persist a variant binding (sole-variant fallback or explicit pick).
    async fn bind_variant(
        &self,
        id: &DesignApprovalId,
        variant_id: &VariantId,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Dedupe by (buyer, variant, quote stamp): an existing line gains
    /// quantity, otherwise a new row is inserted with the intent's price.
    async fn upsert_line(
        &self,
        intent: CartIntent,
        new_line_id: CartLineId,
        now: DateTime<Utc>,
    ) -> Result<CartLine, RepositoryError>;
    async fn find_line(
        &self,
        buyer_id: &BuyerId,
        variant_id: &VariantId,
        quote_id: Option<&QuoteId>,
    ) -> Result<Option<CartLine>, RepositoryError>;
    async fn list_for_buyer(&self, buyer_id: &BuyerId) -> Result<Vec<CartLine>, RepositoryError>;
}

#[async_trait]
pub trait AuditEventRepository: Send + Sync {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError>;
    async fn list_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<AuditEvent>, RepositoryError>;
}
