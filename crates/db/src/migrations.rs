use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "product",
        "product_variant",
        "service",
        "service_package",
        "conversation",
        "quote",
        "design_approval",
        "design_file",
        "cart_line",
        "audit_event",
        "idx_product_variant_product_id",
        "idx_service_package_service_id",
        "idx_conversation_buyer_id",
        "idx_conversation_seller_id",
        "idx_quote_conversation_created",
        "idx_quote_status",
        "idx_design_approval_conversation_created",
        "idx_design_approval_status",
        "idx_design_file_approval_position",
        "idx_cart_line_buyer_variant_quote",
        "idx_audit_event_conversation",
        "idx_audit_event_type",
    ];

    #[tokio::test]
    async fn migrations_create_the_managed_schema() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for object in MANAGED_SCHEMA_OBJECTS {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master
                 WHERE type IN ('table', 'index') AND name = ?",
            )
            .bind(object)
            .fetch_one(&pool)
            .await
            .expect("query sqlite_master")
            .get::<i64, _>("count");

            assert_eq!(count, 1, "schema object `{object}` should exist after migrations");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent_on_rerun() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run is a no-op");
    }
}
