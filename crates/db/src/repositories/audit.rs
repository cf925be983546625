use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::Row;

use haggle_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use haggle_core::domain::conversation::ConversationId;

use super::{AuditEventRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAuditEventRepository {
    pool: DbPool,
}

impl SqlAuditEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn category_as_str(category: &AuditCategory) -> &'static str {
    match category {
        AuditCategory::Ingress => "ingress",
        AuditCategory::Quote => "quote",
        AuditCategory::Design => "design",
        AuditCategory::Cart => "cart",
        AuditCategory::Persistence => "persistence",
        AuditCategory::System => "system",
    }
}

fn parse_category(s: &str) -> AuditCategory {
    match s {
        "ingress" => AuditCategory::Ingress,
        "quote" => AuditCategory::Quote,
        "design" => AuditCategory::Design,
        "cart" => AuditCategory::Cart,
        "persistence" => AuditCategory::Persistence,
        _ => AuditCategory::System,
    }
}

fn outcome_as_str(outcome: &AuditOutcome) -> &'static str {
    match outcome {
        AuditOutcome::Success => "success",
        AuditOutcome::Rejected => "rejected",
        AuditOutcome::Failed => "failed",
    }
}

fn parse_outcome(s: &str) -> AuditOutcome {
    match s {
        "rejected" => AuditOutcome::Rejected,
        "failed" => AuditOutcome::Failed,
        _ => AuditOutcome::Success,
    }
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<AuditEvent, RepositoryError> {
    let event_id: String =
        row.try_get("event_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let conversation_id: Option<String> =
        row.try_get("conversation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let correlation_id: String =
        row.try_get("correlation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let event_type: String =
        row.try_get("event_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category_str: String =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let actor: String = row.try_get("actor").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let outcome_str: String =
        row.try_get("outcome").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let metadata_raw: String =
        row.try_get("metadata").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let occurred_at_str: String =
        row.try_get("occurred_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let metadata: BTreeMap<String, String> =
        serde_json::from_str(&metadata_raw).map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let occurred_at = DateTime::parse_from_rfc3339(&occurred_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(AuditEvent {
        event_id,
        conversation_id: conversation_id.map(ConversationId),
        correlation_id,
        event_type,
        category: parse_category(&category_str),
        actor,
        outcome: parse_outcome(&outcome_str),
        metadata,
        occurred_at,
    })
}

#[async_trait::async_trait]
impl AuditEventRepository for SqlAuditEventRepository {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError> {
        let metadata_json = serde_json::to_string(&event.metadata)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO audit_event (event_id, conversation_id, correlation_id, event_type,
                                      category, actor, outcome, metadata, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.event_id)
        .bind(event.conversation_id.as_ref().map(|id| id.0.as_str()))
        .bind(&event.correlation_id)
        .bind(&event.event_type)
        .bind(category_as_str(&event.category))
        .bind(&event.actor)
        .bind(outcome_as_str(&event.outcome))
        .bind(metadata_json)
        .bind(event.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<AuditEvent>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT event_id, conversation_id, correlation_id, event_type, category, actor,
                    outcome, metadata, occurred_at
             FROM audit_event WHERE conversation_id = ? ORDER BY occurred_at ASC",
        )
        .bind(&conversation_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect::<Result<Vec<_>, _>>()
    }
}
