use chrono::{DateTime, Utc};
use sqlx::Row;

use haggle_core::domain::catalog::{PackageId, ProductId, ServiceId, VariantId};
use haggle_core::domain::conversation::{BuyerId, ConversationId};
use haggle_core::domain::design::{
    DesignApproval, DesignApprovalId, DesignContext, DesignFile, DesignStatus,
};

use super::{DesignApprovalRepository, RepositoryError};
use crate::DbPool;

pub struct SqlDesignApprovalRepository {
    pool: DbPool,
}

impl SqlDesignApprovalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub fn design_status_as_str(status: &DesignStatus) -> &'static str {
    match status {
        DesignStatus::Pending => "pending",
        DesignStatus::Approved => "approved",
        DesignStatus::Rejected => "rejected",
        DesignStatus::ChangesRequested => "changes_requested",
    }
}

fn parse_status(s: &str) -> DesignStatus {
    match s {
        "approved" => DesignStatus::Approved,
        "rejected" => DesignStatus::Rejected,
        "changes_requested" => DesignStatus::ChangesRequested,
        _ => DesignStatus::Pending,
    }
}

fn context_as_str(context: &DesignContext) -> &'static str {
    match context {
        DesignContext::Product => "product",
        DesignContext::Quote => "quote",
    }
}

fn parse_context(s: &str) -> DesignContext {
    match s {
        "quote" => DesignContext::Quote,
        _ => DesignContext::Product,
    }
}

const DESIGN_COLUMNS: &str = "id, conversation_id, product_id, service_id, buyer_id, variant_id,
                              package_id, context, status, seller_notes, created_at, updated_at";

fn row_to_design(row: &sqlx::sqlite::SqliteRow) -> Result<DesignApproval, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let conversation_id: String =
        row.try_get("conversation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let product_id: Option<String> =
        row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let service_id: Option<String> =
        row.try_get("service_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let buyer_id: String =
        row.try_get("buyer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let variant_id: Option<String> =
        row.try_get("variant_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let package_id: Option<String> =
        row.try_get("package_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let context_str: String =
        row.try_get("context").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let seller_notes: Option<String> =
        row.try_get("seller_notes").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(DesignApproval {
        id: DesignApprovalId(id),
        conversation_id: ConversationId(conversation_id),
        product_id: product_id.map(ProductId),
        service_id: service_id.map(ServiceId),
        buyer_id: BuyerId(buyer_id),
        variant_id: variant_id.map(VariantId),
        package_id: package_id.map(PackageId),
        context: parse_context(&context_str),
        status: parse_status(&status_str),
        files: Vec::new(),
        seller_notes,
        created_at,
        updated_at,
    })
}

fn row_to_file(row: &sqlx::sqlite::SqliteRow) -> Result<DesignFile, RepositoryError> {
    let url: String = row.try_get("url").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let filename: String =
        row.try_get("filename").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let size_bytes: i64 =
        row.try_get("size_bytes").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let mime_type: String =
        row.try_get("mime_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(DesignFile { url, filename, size_bytes: size_bytes.max(0) as u64, mime_type })
}

impl SqlDesignApprovalRepository {
    async fn load_files(&self, design_id: &str) -> Result<Vec<DesignFile>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT url, filename, size_bytes, mime_type
             FROM design_file WHERE design_approval_id = ? ORDER BY position ASC",
        )
        .bind(design_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_file).collect::<Result<Vec<_>, _>>()
    }

    /// Rows are decoded before the file lookups so no row handles are held
    /// across awaits.
    async fn hydrate(&self, mut design: DesignApproval) -> Result<DesignApproval, RepositoryError> {
        design.files = self.load_files(&design.id.0).await?;
        Ok(design)
    }
}

#[async_trait::async_trait]
impl DesignApprovalRepository for SqlDesignApprovalRepository {
    async fn find_by_id(
        &self,
        id: &DesignApprovalId,
    ) -> Result<Option<DesignApproval>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {DESIGN_COLUMNS} FROM design_approval WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row.as_ref().map(row_to_design).transpose()? {
            Some(design) => Ok(Some(self.hydrate(design).await?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, design: DesignApproval) -> Result<(), RepositoryError> {
        // Parent row and files land together or not at all; a failed upload
        // must never leave a dangling record.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO design_approval (id, conversation_id, product_id, service_id, buyer_id,
                                          variant_id, package_id, context, status, seller_notes,
                                          created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&design.id.0)
        .bind(&design.conversation_id.0)
        .bind(design.product_id.as_ref().map(|id| id.0.as_str()))
        .bind(design.service_id.as_ref().map(|id| id.0.as_str()))
        .bind(&design.buyer_id.0)
        .bind(design.variant_id.as_ref().map(|id| id.0.as_str()))
        .bind(design.package_id.as_ref().map(|id| id.0.as_str()))
        .bind(context_as_str(&design.context))
        .bind(design_status_as_str(&design.status))
        .bind(&design.seller_notes)
        .bind(design.created_at.to_rfc3339())
        .bind(design.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for (position, file) in design.files.iter().enumerate() {
            sqlx::query(
                "INSERT INTO design_file (id, design_approval_id, position, url, filename,
                                          size_bytes, mime_type)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(format!("{}:{}", design.id.0, position))
            .bind(&design.id.0)
            .bind(position as i64)
            .bind(&file.url)
            .bind(&file.filename)
            .bind(file.size_bytes as i64)
            .bind(&file.mime_type)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<DesignApproval>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {DESIGN_COLUMNS} FROM design_approval
             WHERE conversation_id = ?
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(&conversation_id.0)
        .fetch_all(&self.pool)
        .await?;

        let decoded = rows.iter().map(row_to_design).collect::<Result<Vec<_>, _>>()?;
        let mut designs = Vec::with_capacity(decoded.len());
        for design in decoded {
            designs.push(self.hydrate(design).await?);
        }
        Ok(designs)
    }

    async fn active_for_slot(
        &self,
        conversation_id: &ConversationId,
        variant_id: Option<&VariantId>,
        package_id: Option<&PackageId>,
    ) -> Result<Option<DesignApproval>, RepositoryError> {
        let row = if let Some(variant) = variant_id {
            sqlx::query(&format!(
                "SELECT {DESIGN_COLUMNS} FROM design_approval
                 WHERE conversation_id = ? AND variant_id = ?
                   AND status IN ('pending', 'approved')
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1"
            ))
            .bind(&conversation_id.0)
            .bind(&variant.0)
            .fetch_optional(&self.pool)
            .await?
        } else if let Some(package) = package_id {
            sqlx::query(&format!(
                "SELECT {DESIGN_COLUMNS} FROM design_approval
                 WHERE conversation_id = ? AND package_id = ?
                   AND status IN ('pending', 'approved')
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1"
            ))
            .bind(&conversation_id.0)
            .bind(&package.0)
            .fetch_optional(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {DESIGN_COLUMNS} FROM design_approval
                 WHERE conversation_id = ? AND variant_id IS NULL AND package_id IS NULL
                   AND status IN ('pending', 'approved')
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1"
            ))
            .bind(&conversation_id.0)
            .fetch_optional(&self.pool)
            .await?
        };

        match row.as_ref().map(row_to_design).transpose()? {
            Some(design) => Ok(Some(self.hydrate(design).await?)),
            None => Ok(None),
        }
    }

    async fn approved_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<DesignApproval>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {DESIGN_COLUMNS} FROM design_approval
             WHERE conversation_id = ? AND status = 'approved'
             ORDER BY created_at DESC, id DESC
             LIMIT 1"
        ))
        .bind(&conversation_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row.as_ref().map(row_to_design).transpose()? {
            Some(design) => Ok(Some(self.hydrate(design).await?)),
            None => Ok(None),
        }
    }

    async fn pending_count_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<u32, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM design_approval
             WHERE conversation_id = ? AND status = 'pending'",
        )
        .bind(&conversation_id.0)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u32)
    }

    async fn transition_guarded(
        &self,
        id: &DesignApprovalId,
        next: DesignStatus,
        seller_notes: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE design_approval
             SET status = ?, seller_notes = COALESCE(?, seller_notes), updated_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(design_status_as_str(&next))
        .bind(seller_notes)
        .bind(updated_at.to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn bind_variant(
        &self,
        id: &DesignApprovalId,
        variant_id: &VariantId,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE design_approval SET variant_id = ?, updated_at = ? WHERE id = ?")
            .bind(&variant_id.0)
            .bind(updated_at.to_rfc3339())
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
