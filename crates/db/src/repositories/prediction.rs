use dealsense_core::chrono::{DateTime, Duration, Utc};
use dealsense_core::domain::prediction::ReorderPrediction;
use dealsense_core::domain::transaction::TransactionId;
use dealsense_core::domain::user::UserId;
use sqlx::{sqlite::SqliteRow, Row};

use super::{parse_optional_rfc3339, parse_rfc3339, RepositoryError};
use crate::DbPool;

pub struct SqlPredictionRepository {
    pool: DbPool,
}

impl SqlPredictionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Upsert keyed by (buyer, category). The notified-marker only survives
    /// when the predicted date did not move, so a shifted prediction can
    /// alert again.
    pub async fn upsert(&self, prediction: &ReorderPrediction) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO predictions (
                id, buyer_id, category, predicted_at, confidence,
                sample_size, avg_interval_days, last_transaction_id,
                notified_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(buyer_id, category) DO UPDATE SET
                predicted_at = excluded.predicted_at,
                confidence = excluded.confidence,
                sample_size = excluded.sample_size,
                avg_interval_days = excluded.avg_interval_days,
                last_transaction_id = excluded.last_transaction_id,
                updated_at = excluded.updated_at,
                notified_at = CASE
                    WHEN predictions.predicted_at = excluded.predicted_at
                        THEN predictions.notified_at
                    ELSE NULL
                END
            "#,
        )
        .bind(&prediction.id)
        .bind(&prediction.buyer_id.0)
        .bind(&prediction.category)
        .bind(prediction.predicted_at.to_rfc3339())
        .bind(prediction.confidence)
        .bind(prediction.sample_size)
        .bind(prediction.avg_interval_days)
        .bind(&prediction.last_transaction_id.0)
        .bind(prediction.notified_at.map(|ts| ts.to_rfc3339()))
        .bind(prediction.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find(
        &self,
        buyer_id: &UserId,
        category: &str,
    ) -> Result<Option<ReorderPrediction>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM predictions WHERE buyer_id = ? AND category = ?")
            .bind(&buyer_id.0)
            .bind(category)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| prediction_from_row(&row)).transpose()
    }

    pub async fn list_for_buyer(
        &self,
        buyer_id: &UserId,
    ) -> Result<Vec<ReorderPrediction>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM predictions WHERE buyer_id = ? ORDER BY category ASC")
            .bind(&buyer_id.0)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(prediction_from_row).collect()
    }

    pub async fn list_all(&self) -> Result<Vec<ReorderPrediction>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM predictions ORDER BY buyer_id ASC, category ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(prediction_from_row).collect()
    }

    /// Predictions due within the window (overdue included) that have not
    /// been notified yet.
    pub async fn list_due_unnotified(
        &self,
        now: DateTime<Utc>,
        window_days: i64,
    ) -> Result<Vec<ReorderPrediction>, RepositoryError> {
        let horizon = (now + Duration::days(window_days)).to_rfc3339();
        let rows = sqlx::query(
            "SELECT * FROM predictions
             WHERE notified_at IS NULL AND predicted_at <= ?
             ORDER BY predicted_at ASC",
        )
        .bind(&horizon)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(prediction_from_row).collect()
    }

    pub async fn mark_notified(
        &self,
        id: &str,
        notified_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE predictions SET notified_at = ? WHERE id = ?")
            .bind(notified_at.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Removes the prediction for a buyer-category that fell below the
    /// minimum sample size.
    pub async fn delete(&self, buyer_id: &UserId, category: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM predictions WHERE buyer_id = ? AND category = ?")
            .bind(&buyer_id.0)
            .bind(category)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn prediction_from_row(row: &SqliteRow) -> Result<ReorderPrediction, RepositoryError> {
    Ok(ReorderPrediction {
        id: row.try_get("id")?,
        buyer_id: UserId(row.try_get("buyer_id")?),
        category: row.try_get("category")?,
        predicted_at: parse_rfc3339(
            "prediction predicted_at",
            &row.try_get::<String, _>("predicted_at")?,
        )?,
        confidence: row.try_get("confidence")?,
        sample_size: row.try_get("sample_size")?,
        avg_interval_days: row.try_get("avg_interval_days")?,
        last_transaction_id: TransactionId(row.try_get("last_transaction_id")?),
        notified_at: parse_optional_rfc3339(
            "prediction notified_at",
            row.try_get::<Option<String>, _>("notified_at")?.as_deref(),
        )?,
        updated_at: parse_rfc3339(
            "prediction updated_at",
            &row.try_get::<String, _>("updated_at")?,
        )?,
    })
}

#[cfg(test)]
mod tests {
    use dealsense_core::chrono::{DateTime, Duration, TimeZone, Utc};
    use dealsense_core::domain::prediction::ReorderPrediction;
    use dealsense_core::domain::transaction::TransactionId;
    use dealsense_core::domain::user::UserId;

    use super::SqlPredictionRepository;
    use crate::repositories::test_support::{insert_product, insert_user, setup_pool, tx_at};
    use crate::repositories::SqlTransactionRepository;

    fn prediction(id: &str, predicted_at: DateTime<Utc>) -> ReorderPrediction {
        ReorderPrediction {
            id: id.to_owned(),
            buyer_id: UserId("buyer-1".to_owned()),
            category: "Flower".to_owned(),
            predicted_at,
            confidence: 96.0,
            sample_size: 4,
            avg_interval_days: 10.0,
            last_transaction_id: TransactionId("tx-1".to_owned()),
            notified_at: None,
            updated_at: predicted_at - Duration::days(10),
        }
    }

    async fn seed(pool: &crate::DbPool) {
        insert_user(pool, "buyer-1", "buyer").await;
        insert_user(pool, "seller-1", "seller").await;
        insert_product(pool, "prod-1", "seller-1", "Flower", 4.0).await;
        let txns = SqlTransactionRepository::new(pool.clone());
        let at = Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap();
        txns.insert(&tx_at("tx-1", "buyer-1", "seller-1", "prod-1", "Flower", at))
            .await
            .expect("insert tx");
    }

    #[tokio::test]
    async fn upsert_replaces_per_buyer_category() {
        let pool = setup_pool().await;
        seed(&pool).await;

        let repo = SqlPredictionRepository::new(pool.clone());
        let due = Utc.with_ymd_and_hms(2026, 4, 11, 9, 0, 0).unwrap();
        repo.upsert(&prediction("pred-1", due)).await.expect("first");
        repo.upsert(&prediction("pred-2", due + Duration::days(2))).await.expect("second");

        let buyer = UserId("buyer-1".to_owned());
        let found = repo.find(&buyer, "Flower").await.expect("find").expect("exists");
        assert_eq!(found.id, "pred-1", "row id survives the upsert");
        assert_eq!(found.predicted_at, due + Duration::days(2));
        assert_eq!(repo.list_all().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn notified_marker_clears_only_when_the_date_moves() {
        let pool = setup_pool().await;
        seed(&pool).await;

        let repo = SqlPredictionRepository::new(pool.clone());
        let due = Utc.with_ymd_and_hms(2026, 4, 11, 9, 0, 0).unwrap();
        repo.upsert(&prediction("pred-1", due)).await.expect("insert");
        repo.mark_notified("pred-1", due - Duration::days(3)).await.expect("mark");

        // Same date: the marker survives, no duplicate alert.
        repo.upsert(&prediction("pred-1b", due)).await.expect("same date");
        let buyer = UserId("buyer-1".to_owned());
        let found = repo.find(&buyer, "Flower").await.expect("find").expect("exists");
        assert!(found.notified_at.is_some());

        // Moved date: the marker clears so the sweep can alert again.
        repo.upsert(&prediction("pred-1c", due + Duration::days(9))).await.expect("moved date");
        let found = repo.find(&buyer, "Flower").await.expect("find").expect("exists");
        assert!(found.notified_at.is_none());
    }

    #[tokio::test]
    async fn due_listing_honors_window_and_marker() {
        let pool = setup_pool().await;
        seed(&pool).await;

        let repo = SqlPredictionRepository::new(pool.clone());
        let now = Utc.with_ymd_and_hms(2026, 4, 10, 9, 0, 0).unwrap();
        repo.upsert(&prediction("pred-1", now + Duration::days(3))).await.expect("due soon");

        let due = repo.list_due_unnotified(now, 7).await.expect("due");
        assert_eq!(due.len(), 1);

        repo.mark_notified("pred-1", now).await.expect("mark");
        assert!(repo.list_due_unnotified(now, 7).await.expect("due").is_empty());
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_was_removed() {
        let pool = setup_pool().await;
        seed(&pool).await;

        let repo = SqlPredictionRepository::new(pool.clone());
        let due = Utc.with_ymd_and_hms(2026, 4, 11, 9, 0, 0).unwrap();
        repo.upsert(&prediction("pred-1", due)).await.expect("insert");

        let buyer = UserId("buyer-1".to_owned());
        assert!(repo.delete(&buyer, "Flower").await.expect("delete"));
        assert!(!repo.delete(&buyer, "Flower").await.expect("delete again"));
    }
}
