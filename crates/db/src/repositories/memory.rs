use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use haggle_core::domain::catalog::{PackageId, VariantId};
use haggle_core::domain::conversation::{Conversation, ConversationId};
use haggle_core::domain::design::{DesignApproval, DesignApprovalId, DesignStatus};
use haggle_core::domain::quote::{Quote, QuoteId, QuoteStatus};

use super::{
    ConversationRepository, DesignApprovalRepository, QuoteRepository, RepositoryError,
};

#[derive(Default)]
pub struct InMemoryConversationRepository {
    conversations: RwLock<HashMap<String, Conversation>>,
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(&id.0).cloned())
    }

    async fn save(&self, conversation: Conversation) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        conversations.insert(conversation.id.0.clone(), conversation);
        Ok(())
    }

    async fn enable_quote_context(&self, id: &ConversationId) -> Result<bool, RepositoryError> {
        let mut conversations = self.conversations.write().await;
        Ok(conversations
            .get_mut(&id.0)
            .map(Conversation::enable_quote_context)
            .unwrap_or(false))
    }
}

#[derive(Default)]
pub struct InMemoryQuoteRepository {
    quotes: RwLock<HashMap<String, Quote>>,
}

#[async_trait::async_trait]
impl QuoteRepository for InMemoryQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(quotes.get(&id.0).cloned())
    }

    async fn insert(&self, quote: Quote) -> Result<(), RepositoryError> {
        let mut quotes = self.quotes.write().await;
        quotes.insert(quote.id.0.clone(), quote);
        Ok(())
    }

    async fn list_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        let mut matching: Vec<Quote> = quotes
            .values()
            .filter(|quote| quote.conversation_id == *conversation_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.0.cmp(&a.id.0)));
        Ok(matching)
    }

    async fn latest_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Quote>, RepositoryError> {
        Ok(self.list_for_conversation(conversation_id).await?.into_iter().next())
    }

    async fn transition_guarded(
        &self,
        id: &QuoteId,
        allowed_from: &[QuoteStatus],
        next: QuoteStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut quotes = self.quotes.write().await;
        match quotes.get_mut(&id.0) {
            Some(quote) if allowed_from.contains(&quote.status) => {
                quote.status = next;
                quote.updated_at = updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryDesignApprovalRepository {
    designs: RwLock<HashMap<String, DesignApproval>>,
}

#[async_trait::async_trait]
impl DesignApprovalRepository for InMemoryDesignApprovalRepository {
    async fn find_by_id(
        &self,
        id: &DesignApprovalId,
    ) -> Result<Option<DesignApproval>, RepositoryError> {
        let designs = self.designs.read().await;
        Ok(designs.get(&id.0).cloned())
    }

    async fn insert(&self, design: DesignApproval) -> Result<(), RepositoryError> {
        let mut designs = self.designs.write().await;
        designs.insert(design.id.0.clone(), design);
        Ok(())
    }

    async fn list_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<DesignApproval>, RepositoryError> {
        let designs = self.designs.read().await;
        let mut matching: Vec<DesignApproval> = designs
            .values()
            .filter(|design| design.conversation_id == *conversation_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.0.cmp(&a.id.0)));
        Ok(matching)
    }

    async fn active_for_slot(
        &self,
        conversation_id: &ConversationId,
        variant_id: Option<&VariantId>,
        package_id: Option<&PackageId>,
    ) -> Result<Option<DesignApproval>, RepositoryError> {
        Ok(self
            .list_for_conversation(conversation_id)
            .await?
            .into_iter()
            .find(|design| {
                design.status.is_active()
                    && design.variant_id.as_ref() == variant_id
                    && design.package_id.as_ref() == package_id
            }))
    }

    async fn approved_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<DesignApproval>, RepositoryError> {
        Ok(self
            .list_for_conversation(conversation_id)
            .await?
            .into_iter()
            .find(|design| design.status == DesignStatus::Approved))
    }

    async fn pending_count_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<u32, RepositoryError> {
        Ok(self
            .list_for_conversation(conversation_id)
            .await?
            .iter()
            .filter(|design| design.status == DesignStatus::Pending)
            .count() as u32)
    }

    async fn transition_guarded(
        &self,
        id: &DesignApprovalId,
        next: DesignStatus,
        seller_notes: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut designs = self.designs.write().await;
        match designs.get_mut(&id.0) {
            Some(design) if design.status == DesignStatus::Pending => {
                design.status = next;
                if seller_notes.is_some() {
                    design.seller_notes = seller_notes;
                }
                design.updated_at = updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn bind_variant(
        &self,
        id: &DesignApprovalId,
        variant_id: &VariantId,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut designs = self.designs.write().await;
        if let Some(design) = designs.get_mut(&id.0) {
            design.variant_id = Some(variant_id.clone());
            design.updated_at = updated_at;
        }
        Ok(())
    }
}
