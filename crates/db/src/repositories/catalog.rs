use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use haggle_core::domain::catalog::{
    PackageId, Product, ProductId, ProductVariant, Service, ServiceId, ServicePackage, VariantId,
};

use super::{CatalogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_price(raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw).map_err(|e| RepositoryError::Decode(format!("price `{raw}`: {e}")))
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let seller_id: String =
        row.try_get("seller_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requires_quote: i64 =
        row.try_get("requires_quote").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requires_design: i64 = row
        .try_get("requires_design_approval")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let active: i64 = row.try_get("active").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Product {
        id: ProductId(id),
        seller_id,
        name,
        requires_quote: requires_quote != 0,
        requires_design_approval: requires_design != 0,
        active: active != 0,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn row_to_variant(row: &sqlx::sqlite::SqliteRow) -> Result<ProductVariant, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let product_id: String =
        row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let label: String = row.try_get("label").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let unit_price: String =
        row.try_get("unit_price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let active: i64 = row.try_get("active").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(ProductVariant {
        id: VariantId(id),
        product_id: ProductId(product_id),
        label,
        unit_price: parse_price(&unit_price)?,
        active: active != 0,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn row_to_service(row: &sqlx::sqlite::SqliteRow) -> Result<Service, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let seller_id: String =
        row.try_get("seller_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requires_quote: i64 =
        row.try_get("requires_quote").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requires_design: i64 = row
        .try_get("requires_design_approval")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let active: i64 = row.try_get("active").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Service {
        id: ServiceId(id),
        seller_id,
        name,
        requires_quote: requires_quote != 0,
        requires_design_approval: requires_design != 0,
        active: active != 0,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn row_to_package(row: &sqlx::sqlite::SqliteRow) -> Result<ServicePackage, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let service_id: String =
        row.try_get("service_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let label: String = row.try_get("label").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price: String = row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let active: i64 = row.try_get("active").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(ServicePackage {
        id: PackageId(id),
        service_id: ServiceId(service_id),
        label,
        price: parse_price(&price)?,
        active: active != 0,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, seller_id, name, requires_quote, requires_design_approval, active,
                    created_at, updated_at
             FROM product WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_product(r)?)),
            None => Ok(None),
        }
    }

    async fn save_product(&self, product: Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO product (id, seller_id, name, requires_quote, requires_design_approval,
                                  active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 requires_quote = excluded.requires_quote,
                 requires_design_approval = excluded.requires_design_approval,
                 active = excluded.active,
                 updated_at = excluded.updated_at",
        )
        .bind(&product.id.0)
        .bind(&product.seller_id)
        .bind(&product.name)
        .bind(product.requires_quote as i64)
        .bind(product.requires_design_approval as i64)
        .bind(product.active as i64)
        .bind(product.created_at.to_rfc3339())
        .bind(product.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_variant(
        &self,
        id: &VariantId,
    ) -> Result<Option<ProductVariant>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, product_id, label, unit_price, active, created_at, updated_at
             FROM product_variant WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_variant(r)?)),
            None => Ok(None),
        }
    }

    async fn save_variant(&self, variant: ProductVariant) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO product_variant (id, product_id, label, unit_price, active,
                                          created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 label = excluded.label,
                 unit_price = excluded.unit_price,
                 active = excluded.active,
                 updated_at = excluded.updated_at",
        )
        .bind(&variant.id.0)
        .bind(&variant.product_id.0)
        .bind(&variant.label)
        .bind(variant.unit_price.to_string())
        .bind(variant.active as i64)
        .bind(variant.created_at.to_rfc3339())
        .bind(variant.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_variants(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<ProductVariant>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, product_id, label, unit_price, active, created_at, updated_at
             FROM product_variant WHERE product_id = ? ORDER BY created_at ASC",
        )
        .bind(&product_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_variant).collect::<Result<Vec<_>, _>>()
    }

    async fn find_service(&self, id: &ServiceId) -> Result<Option<Service>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, seller_id, name, requires_quote, requires_design_approval, active,
                    created_at, updated_at
             FROM service WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_service(r)?)),
            None => Ok(None),
        }
    }

    async fn save_service(&self, service: Service) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO service (id, seller_id, name, requires_quote, requires_design_approval,
                                  active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 requires_quote = excluded.requires_quote,
                 requires_design_approval = excluded.requires_design_approval,
                 active = excluded.active,
                 updated_at = excluded.updated_at",
        )
        .bind(&service.id.0)
        .bind(&service.seller_id)
        .bind(&service.name)
        .bind(service.requires_quote as i64)
        .bind(service.requires_design_approval as i64)
        .bind(service.active as i64)
        .bind(service.created_at.to_rfc3339())
        .bind(service.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_package(
        &self,
        id: &PackageId,
    ) -> Result<Option<ServicePackage>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, service_id, label, price, active, created_at, updated_at
             FROM service_package WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_package(r)?)),
            None => Ok(None),
        }
    }

    async fn save_package(&self, package: ServicePackage) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO service_package (id, service_id, label, price, active,
                                          created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 label = excluded.label,
                 price = excluded.price,
                 active = excluded.active,
                 updated_at = excluded.updated_at",
        )
        .bind(&package.id.0)
        .bind(&package.service_id.0)
        .bind(&package.label)
        .bind(package.price.to_string())
        .bind(package.active as i64)
        .bind(package.created_at.to_rfc3339())
        .bind(package.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_packages(
        &self,
        service_id: &ServiceId,
    ) -> Result<Vec<ServicePackage>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, service_id, label, price, active, created_at, updated_at
             FROM service_package WHERE service_id = ? ORDER BY created_at ASC",
        )
        .bind(&service_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_package).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use haggle_core::domain::catalog::{Product, ProductId, ProductVariant, VariantId};

    use super::SqlCatalogRepository;
    use crate::repositories::CatalogRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn product(id: &str) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId(id.to_string()),
            seller_id: "seller-1".to_string(),
            name: "Custom Tote Bag".to_string(),
            requires_quote: false,
            requires_design_approval: true,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn variant(id: &str, product_id: &str, cents: i64) -> ProductVariant {
        let now = Utc::now();
        ProductVariant {
            id: VariantId(id.to_string()),
            product_id: ProductId(product_id.to_string()),
            label: id.to_string(),
            unit_price: Decimal::new(cents, 2),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn product_round_trip_preserves_requirement_flags() {
        let pool = setup().await;
        let repo = SqlCatalogRepository::new(pool);

        repo.save_product(product("prod-1")).await.expect("save");
        let found = repo
            .find_product(&ProductId("prod-1".to_string()))
            .await
            .expect("find")
            .expect("exists");

        assert!(found.requires_design_approval);
        assert!(!found.requires_quote);
    }

    #[tokio::test]
    async fn variant_prices_survive_the_text_column() {
        let pool = setup().await;
        let repo = SqlCatalogRepository::new(pool);

        repo.save_product(product("prod-1")).await.expect("save product");
        repo.save_variant(variant("variant-1", "prod-1", 1999)).await.expect("save variant");

        let found = repo
            .find_variant(&VariantId("variant-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(found.unit_price, Decimal::new(1999, 2));
    }

    #[tokio::test]
    async fn list_variants_scopes_to_the_product() {
        let pool = setup().await;
        let repo = SqlCatalogRepository::new(pool);

        repo.save_product(product("prod-1")).await.expect("save product 1");
        repo.save_product(product("prod-2")).await.expect("save product 2");
        repo.save_variant(variant("variant-1", "prod-1", 1000)).await.expect("v1");
        repo.save_variant(variant("variant-2", "prod-1", 1200)).await.expect("v2");
        repo.save_variant(variant("variant-3", "prod-2", 900)).await.expect("v3");

        let variants =
            repo.list_variants(&ProductId("prod-1".to_string())).await.expect("list");
        assert_eq!(variants.len(), 2);
    }
}
