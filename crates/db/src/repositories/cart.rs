use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use haggle_core::domain::cart::{CartIntent, CartLine, CartLineId};
use haggle_core::domain::catalog::VariantId;
use haggle_core::domain::conversation::BuyerId;
use haggle_core::domain::design::DesignApprovalId;
use haggle_core::domain::quote::QuoteId;

use super::{CartRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCartRepository {
    pool: DbPool,
}

impl SqlCartRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const CART_COLUMNS: &str = "id, buyer_id, product_variant_id, design_approval_id, quote_id,
                            quantity, effective_unit_price, created_at, updated_at";

fn row_to_line(row: &sqlx::sqlite::SqliteRow) -> Result<CartLine, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let buyer_id: String =
        row.try_get("buyer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let product_variant_id: String =
        row.try_get("product_variant_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let design_approval_id: Option<String> =
        row.try_get("design_approval_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quote_id: Option<String> =
        row.try_get("quote_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: i64 =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_text: String = row
        .try_get("effective_unit_price")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let effective_unit_price = Decimal::from_str(&price_text)
        .map_err(|e| RepositoryError::Decode(format!("effective_unit_price `{price_text}`: {e}")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(CartLine {
        id: CartLineId(id),
        buyer_id: BuyerId(buyer_id),
        product_variant_id: VariantId(product_variant_id),
        design_approval_id: design_approval_id.map(DesignApprovalId),
        quote_id: quote_id.map(QuoteId),
        quantity: quantity.max(0) as u32,
        effective_unit_price,
        created_at,
        updated_at,
    })
}

#[async_trait::async_trait]
impl CartRepository for SqlCartRepository {
    async fn upsert_line(
        &self,
        intent: CartIntent,
        new_line_id: CartLineId,
        now: DateTime<Utc>,
    ) -> Result<CartLine, RepositoryError> {
        let existing = self
            .find_line(&intent.buyer_id, &intent.product_variant_id, intent.quote_id.as_ref())
            .await?;

        if let Some(line) = existing {
            // Same (buyer, variant, quote stamp): increment quantity, keep
            // the stamped price.
            sqlx::query("UPDATE cart_line SET quantity = quantity + ?, updated_at = ? WHERE id = ?")
                .bind(intent.quantity as i64)
                .bind(now.to_rfc3339())
                .bind(&line.id.0)
                .execute(&self.pool)
                .await?;

            let mut updated = line;
            updated.quantity += intent.quantity;
            updated.updated_at = now;
            return Ok(updated);
        }

        let line = CartLine {
            id: new_line_id,
            buyer_id: intent.buyer_id,
            product_variant_id: intent.product_variant_id,
            design_approval_id: intent.design_approval_id,
            quote_id: intent.quote_id,
            quantity: intent.quantity,
            effective_unit_price: intent.effective_unit_price,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO cart_line (id, buyer_id, product_variant_id, design_approval_id,
                                    quote_id, quantity, effective_unit_price, created_at,
                                    updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&line.id.0)
        .bind(&line.buyer_id.0)
        .bind(&line.product_variant_id.0)
        .bind(line.design_approval_id.as_ref().map(|id| id.0.as_str()))
        .bind(line.quote_id.as_ref().map(|id| id.0.as_str()))
        .bind(line.quantity as i64)
        .bind(line.effective_unit_price.to_string())
        .bind(line.created_at.to_rfc3339())
        .bind(line.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(line)
    }

    async fn find_line(
        &self,
        buyer_id: &BuyerId,
        variant_id: &VariantId,
        quote_id: Option<&QuoteId>,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CART_COLUMNS} FROM cart_line
             WHERE buyer_id = ? AND product_variant_id = ?
               AND COALESCE(quote_id, '') = COALESCE(?, '')"
        ))
        .bind(&buyer_id.0)
        .bind(&variant_id.0)
        .bind(quote_id.map(|id| id.0.as_str()))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_line(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_buyer(&self, buyer_id: &BuyerId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {CART_COLUMNS} FROM cart_line
             WHERE buyer_id = ? ORDER BY created_at ASC"
        ))
        .bind(&buyer_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_line).collect::<Result<Vec<_>, _>>()
    }
}
