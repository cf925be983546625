use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use haggle_core::domain::catalog::{PackageId, VariantId};
use haggle_core::domain::conversation::ConversationId;
use haggle_core::domain::design::DesignApprovalId;
use haggle_core::domain::quote::{Quote, QuoteId, QuoteStatus};

use super::{QuoteRepository, RepositoryError};
use crate::DbPool;

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub fn quote_status_as_str(status: &QuoteStatus) -> &'static str {
    match status {
        QuoteStatus::Pending => "pending",
        QuoteStatus::Sent => "sent",
        QuoteStatus::Accepted => "accepted",
        QuoteStatus::Rejected => "rejected",
        QuoteStatus::Expired => "expired",
    }
}

fn parse_status(s: &str) -> QuoteStatus {
    match s {
        "sent" => QuoteStatus::Sent,
        "accepted" => QuoteStatus::Accepted,
        "rejected" => QuoteStatus::Rejected,
        "expired" => QuoteStatus::Expired,
        _ => QuoteStatus::Pending,
    }
}

const QUOTE_COLUMNS: &str = "id, conversation_id, quoted_price, quantity, product_variant_id,
                             service_package_id, design_approval_id, notes, expires_at, status,
                             created_at, updated_at";

fn row_to_quote(row: &sqlx::sqlite::SqliteRow) -> Result<Quote, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let conversation_id: String =
        row.try_get("conversation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quoted_price_text: String =
        row.try_get("quoted_price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: i64 =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let product_variant_id: Option<String> =
        row.try_get("product_variant_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let service_package_id: Option<String> =
        row.try_get("service_package_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let design_approval_id: Option<String> =
        row.try_get("design_approval_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let notes: Option<String> =
        row.try_get("notes").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let expires_at_str: Option<String> =
        row.try_get("expires_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let quoted_price = Decimal::from_str(&quoted_price_text)
        .map_err(|e| RepositoryError::Decode(format!("quoted_price `{quoted_price_text}`: {e}")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let expires_at = expires_at_str
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(Quote {
        id: QuoteId(id),
        conversation_id: ConversationId(conversation_id),
        quoted_price,
        quantity: quantity.max(0) as u32,
        product_variant_id: product_variant_id.map(VariantId),
        service_package_id: service_package_id.map(PackageId),
        design_approval_id: design_approval_id.map(DesignApprovalId),
        notes,
        expires_at,
        status: parse_status(&status_str),
        created_at,
        updated_at,
    })
}

#[async_trait::async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quote WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_quote(r)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, quote: Quote) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO quote (id, conversation_id, quoted_price, quantity, product_variant_id,
                                service_package_id, design_approval_id, notes, expires_at, status,
                                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&quote.id.0)
        .bind(&quote.conversation_id.0)
        .bind(quote.quoted_price.to_string())
        .bind(quote.quantity as i64)
        .bind(quote.product_variant_id.as_ref().map(|id| id.0.as_str()))
        .bind(quote.service_package_id.as_ref().map(|id| id.0.as_str()))
        .bind(quote.design_approval_id.as_ref().map(|id| id.0.as_str()))
        .bind(&quote.notes)
        .bind(quote.expires_at.map(|dt| dt.to_rfc3339()))
        .bind(quote_status_as_str(&quote.status))
        .bind(quote.created_at.to_rfc3339())
        .bind(quote.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Quote>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quote
             WHERE conversation_id = ?
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(&conversation_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_quote).collect::<Result<Vec<_>, _>>()
    }

    async fn latest_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quote
             WHERE conversation_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT 1"
        ))
        .bind(&conversation_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_quote(r)?)),
            None => Ok(None),
        }
    }

    async fn transition_guarded(
        &self,
        id: &QuoteId,
        allowed_from: &[QuoteStatus],
        next: QuoteStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        if allowed_from.is_empty() {
            return Ok(false);
        }

        let mut builder: sqlx::QueryBuilder<sqlx::Sqlite> =
            sqlx::QueryBuilder::new("UPDATE quote SET status = ");
        builder.push_bind(quote_status_as_str(&next));
        builder.push(", updated_at = ");
        builder.push_bind(updated_at.to_rfc3339());
        builder.push(" WHERE id = ");
        builder.push_bind(&id.0);
        builder.push(" AND status IN (");
        let mut statuses = builder.separated(", ");
        for status in allowed_from {
            statuses.push_bind(quote_status_as_str(status));
        }
        builder.push(")");

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }
}
