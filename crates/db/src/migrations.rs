use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{run_pending, MIGRATOR};
    use crate::connect_with_settings;

    const MANAGED_TABLES: &[&str] = &[
        "users",
        "products",
        "transactions",
        "bids",
        "shortlists",
        "product_views",
        "matches",
        "predictions",
        "propensity_scores",
        "seller_scores",
        "churn_signals",
    ];

    async fn table_names(pool: &sqlx::SqlitePool) -> Vec<String> {
        sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(pool)
            .await
            .expect("load tables")
            .into_iter()
            .map(|row| row.get::<String, _>("name"))
            .collect()
    }

    #[tokio::test]
    async fn migrations_create_every_intelligence_table() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let names = table_names(&pool).await;
        for table in MANAGED_TABLES {
            assert!(names.iter().any(|name| name == table), "missing table {table}");
        }
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let names = table_names(&pool).await;
        for table in MANAGED_TABLES {
            assert!(!names.iter().any(|name| name == table), "table {table} survived undo");
        }

        // Up again restores the full schema.
        run_pending(&pool).await.expect("re-run migrations");
        let names = table_names(&pool).await;
        for table in MANAGED_TABLES {
            assert!(names.iter().any(|name| name == table), "missing table {table} after re-up");
        }
    }
}
