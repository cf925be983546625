use chrono::{DateTime, Utc};
use sqlx::Row;

use haggle_core::domain::catalog::{ProductId, ServiceId};
use haggle_core::domain::conversation::{
    BuyerId, Conversation, ConversationId, SellerId, WorkflowContext,
};

use super::{ConversationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn contexts_to_json(contexts: &[WorkflowContext]) -> Result<String, RepositoryError> {
    serde_json::to_string(contexts).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn contexts_from_json(raw: &str) -> Result<Vec<WorkflowContext>, RepositoryError> {
    serde_json::from_str(raw).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<Conversation, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let buyer_id: String =
        row.try_get("buyer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let seller_id: String =
        row.try_get("seller_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let product_id: Option<String> =
        row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let service_id: Option<String> =
        row.try_get("service_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let contexts_raw: String =
        row.try_get("workflow_contexts").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(Conversation {
        id: ConversationId(id),
        buyer_id: BuyerId(buyer_id),
        seller_id: SellerId(seller_id),
        product_id: product_id.map(ProductId),
        service_id: service_id.map(ServiceId),
        contexts: contexts_from_json(&contexts_raw)?,
        created_at,
    })
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, buyer_id, seller_id, product_id, service_id, workflow_contexts, created_at
             FROM conversation WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_conversation(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, conversation: Conversation) -> Result<(), RepositoryError> {
        let contexts_json = contexts_to_json(&conversation.contexts)?;

        sqlx::query(
            "INSERT INTO conversation (id, buyer_id, seller_id, product_id, service_id,
                                       workflow_contexts, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 workflow_contexts = excluded.workflow_contexts",
        )
        .bind(&conversation.id.0)
        .bind(&conversation.buyer_id.0)
        .bind(&conversation.seller_id.0)
        .bind(conversation.product_id.as_ref().map(|id| id.0.as_str()))
        .bind(conversation.service_id.as_ref().map(|id| id.0.as_str()))
        .bind(contexts_json)
        .bind(conversation.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn enable_quote_context(&self, id: &ConversationId) -> Result<bool, RepositoryError> {
        let Some(mut conversation) = self.find_by_id(id).await? else {
            return Ok(false);
        };
        if !conversation.enable_quote_context() {
            return Ok(false);
        }

        let contexts_json = contexts_to_json(&conversation.contexts)?;
        sqlx::query("UPDATE conversation SET workflow_contexts = ? WHERE id = ?")
            .bind(contexts_json)
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(true)
    }
}
