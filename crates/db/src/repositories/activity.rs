use dealsense_core::chrono::{DateTime, Utc};
use dealsense_core::domain::product::ProductId;
use dealsense_core::domain::user::UserId;

use super::RepositoryError;
use crate::DbPool;

/// Shortlist and view rows: the weakest engagement signals feeding the
/// category-affinity tiers.
pub struct SqlActivityRepository {
    pool: DbPool,
}

impl SqlActivityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn add_shortlist(
        &self,
        buyer_id: &UserId,
        product_id: &ProductId,
        category: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO shortlists (buyer_id, product_id, category, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(buyer_id, product_id) DO NOTHING",
        )
        .bind(&buyer_id.0)
        .bind(&product_id.0)
        .bind(category)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn add_view(
        &self,
        id: &str,
        buyer_id: &UserId,
        product_id: &ProductId,
        category: &str,
        viewed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO product_views (id, buyer_id, product_id, category, viewed_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(&buyer_id.0)
        .bind(&product_id.0)
        .bind(category)
        .bind(viewed_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn shortlist_count(
        &self,
        buyer_id: &UserId,
        category: &str,
    ) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shortlists WHERE buyer_id = ? AND category = ?",
        )
        .bind(&buyer_id.0)
        .bind(category)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn view_count(
        &self,
        buyer_id: &UserId,
        category: &str,
    ) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM product_views WHERE buyer_id = ? AND category = ?",
        )
        .bind(&buyer_id.0)
        .bind(category)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use dealsense_core::chrono::{TimeZone, Utc};
    use dealsense_core::domain::product::ProductId;
    use dealsense_core::domain::user::UserId;

    use super::SqlActivityRepository;
    use crate::repositories::test_support::{insert_product, insert_user, setup_pool};

    #[tokio::test]
    async fn shortlists_dedupe_and_views_accumulate() {
        let pool = setup_pool().await;
        insert_user(&pool, "buyer-1", "buyer").await;
        insert_user(&pool, "seller-1", "seller").await;
        insert_product(&pool, "prod-1", "seller-1", "Flower", 4.0).await;

        let repo = SqlActivityRepository::new(pool.clone());
        let buyer = UserId("buyer-1".to_owned());
        let product = ProductId("prod-1".to_owned());
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap();

        repo.add_shortlist(&buyer, &product, "Flower", at).await.expect("shortlist");
        repo.add_shortlist(&buyer, &product, "Flower", at).await.expect("shortlist again");
        assert_eq!(repo.shortlist_count(&buyer, "Flower").await.expect("count"), 1);

        repo.add_view("view-1", &buyer, &product, "Flower", at).await.expect("view");
        repo.add_view("view-2", &buyer, &product, "Flower", at).await.expect("view");
        assert_eq!(repo.view_count(&buyer, "Flower").await.expect("count"), 2);
    }
}
