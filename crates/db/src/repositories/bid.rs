use dealsense_core::domain::bid::{Bid, BidId, BidStatus};
use dealsense_core::domain::product::ProductId;
use dealsense_core::domain::user::UserId;
use sqlx::{sqlite::SqliteRow, Row};

use super::{parse_rfc3339, RepositoryError};
use crate::DbPool;

pub struct SqlBidRepository {
    pool: DbPool,
}

impl SqlBidRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, bid: &Bid) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO bids (
                id, buyer_id, product_id, category,
                unit_price, quantity, ask_price, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&bid.id.0)
        .bind(&bid.buyer_id.0)
        .bind(&bid.product_id.0)
        .bind(&bid.category)
        .bind(bid.unit_price)
        .bind(bid.quantity)
        .bind(bid.ask_price)
        .bind(bid.status.as_str())
        .bind(bid.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count_for_buyer_category(
        &self,
        buyer_id: &UserId,
        category: &str,
    ) -> Result<i64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM bids WHERE buyer_id = ? AND category = ?")
                .bind(&buyer_id.0)
                .bind(category)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Historical bid/ask ratios for elasticity estimation; rows without a
    /// positive ask snapshot are excluded.
    pub async fn bid_ask_ratios(&self, buyer_id: &UserId) -> Result<Vec<f64>, RepositoryError> {
        let ratios: Vec<f64> = sqlx::query_scalar(
            "SELECT unit_price / ask_price FROM bids
             WHERE buyer_id = ? AND ask_price IS NOT NULL AND ask_price > 0
             ORDER BY created_at ASC",
        )
        .bind(&buyer_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(ratios)
    }

    /// Bids placed in a category since the cutoff; the market context's
    /// demand signal.
    pub async fn count_recent_in_category(
        &self,
        category: &str,
        since: dealsense_core::chrono::DateTime<dealsense_core::chrono::Utc>,
    ) -> Result<i64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM bids WHERE category = ? AND created_at >= ?")
                .bind(category)
                .bind(since.to_rfc3339())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn list_for_buyer(&self, buyer_id: &UserId) -> Result<Vec<Bid>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM bids WHERE buyer_id = ? ORDER BY created_at ASC")
            .bind(&buyer_id.0)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(bid_from_row).collect()
    }
}

fn bid_from_row(row: &SqliteRow) -> Result<Bid, RepositoryError> {
    let status_raw: String = row.try_get("status")?;
    let status = BidStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("invalid bid status: {status_raw}")))?;

    Ok(Bid {
        id: BidId(row.try_get("id")?),
        buyer_id: UserId(row.try_get("buyer_id")?),
        product_id: ProductId(row.try_get("product_id")?),
        category: row.try_get("category")?,
        unit_price: row.try_get("unit_price")?,
        quantity: row.try_get("quantity")?,
        ask_price: row.try_get("ask_price")?,
        status,
        created_at: parse_rfc3339("bid created_at", &row.try_get::<String, _>("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use dealsense_core::chrono::{TimeZone, Utc};
    use dealsense_core::domain::bid::{Bid, BidId, BidStatus};
    use dealsense_core::domain::product::ProductId;
    use dealsense_core::domain::user::UserId;

    use super::SqlBidRepository;
    use crate::repositories::test_support::{insert_product, insert_user, setup_pool};

    fn bid(id: &str, unit_price: f64, ask_price: Option<f64>) -> Bid {
        Bid {
            id: BidId(id.to_owned()),
            buyer_id: UserId("buyer-1".to_owned()),
            product_id: ProductId("prod-1".to_owned()),
            category: "Flower".to_owned(),
            unit_price,
            quantity: 5.0,
            ask_price,
            status: BidStatus::Submitted,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn ratios_skip_bids_without_an_ask_snapshot() {
        let pool = setup_pool().await;
        insert_user(&pool, "buyer-1", "buyer").await;
        insert_user(&pool, "seller-1", "seller").await;
        insert_product(&pool, "prod-1", "seller-1", "Flower", 4.0).await;

        let repo = SqlBidRepository::new(pool.clone());
        repo.insert(&bid("bid-1", 3.2, Some(4.0))).await.expect("insert");
        repo.insert(&bid("bid-2", 4.0, Some(4.0))).await.expect("insert");
        repo.insert(&bid("bid-3", 3.0, None)).await.expect("insert");

        let ratios = repo.bid_ask_ratios(&UserId("buyer-1".to_owned())).await.expect("ratios");
        assert_eq!(ratios.len(), 2);
        assert!((ratios[0] - 0.8).abs() < 1e-9);
        assert!((ratios[1] - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn category_counts_and_round_trip() {
        let pool = setup_pool().await;
        insert_user(&pool, "buyer-1", "buyer").await;
        insert_user(&pool, "seller-1", "seller").await;
        insert_product(&pool, "prod-1", "seller-1", "Flower", 4.0).await;

        let repo = SqlBidRepository::new(pool.clone());
        repo.insert(&bid("bid-1", 3.5, Some(4.0))).await.expect("insert");

        let count = repo
            .count_for_buyer_category(&UserId("buyer-1".to_owned()), "Flower")
            .await
            .expect("count");
        assert_eq!(count, 1);

        let bids = repo.list_for_buyer(&UserId("buyer-1".to_owned())).await.expect("list");
        assert_eq!(bids.len(), 1);
        assert_eq!(bids[0].status, BidStatus::Submitted);
        assert_eq!(bids[0].bid_ask_ratio(), Some(0.875));
    }
}
