use dealsense_core::chrono::{DateTime, Utc};
use dealsense_core::domain::user::{User, UserId, UserRole};
use sqlx::{sqlite::SqliteRow, Row};

use super::{parse_optional_rfc3339, parse_rfc3339, RepositoryError};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, display_name, role, location, approved,
                transaction_count, total_value, last_transaction_at,
                avg_fulfillment_score, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id.0)
        .bind(&user.display_name)
        .bind(user.role.as_str())
        .bind(user.location.as_deref())
        .bind(user.approved)
        .bind(user.transaction_count)
        .bind(user.total_value)
        .bind(user.last_transaction_at.map(|ts| ts.to_rfc3339()))
        .bind(user.avg_fulfillment_score)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| user_from_row(&row)).transpose()
    }

    /// Buyers eligible for matching.
    pub async fn list_approved_buyers(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM users WHERE role = 'buyer' AND approved = 1 ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(user_from_row).collect()
    }

    pub async fn list_sellers(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM users WHERE role = 'seller' ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(user_from_row).collect()
    }

    /// Denormalized seller reliability shown on the seller's profile.
    pub async fn set_avg_fulfillment_score(
        &self,
        id: &UserId,
        score: Option<f64>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET avg_fulfillment_score = ? WHERE id = ?")
            .bind(score)
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Refreshes the aggregate counters from the transactions table.
    pub async fn refresh_transaction_rollup(&self, id: &UserId) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE users SET
                transaction_count = (
                    SELECT COUNT(*) FROM transactions WHERE buyer_id = users.id
                ),
                total_value = (
                    SELECT COALESCE(SUM(total_value), 0.0) FROM transactions WHERE buyer_id = users.id
                ),
                last_transaction_at = (
                    SELECT MAX(transacted_at) FROM transactions WHERE buyer_id = users.id
                )
            WHERE id = ?
            "#,
        )
        .bind(&id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn user_from_row(row: &SqliteRow) -> Result<User, RepositoryError> {
    let role_raw: String = row.try_get("role")?;
    let role = UserRole::parse(&role_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("invalid user role: {role_raw}")))?;

    let last_transaction_at: Option<DateTime<Utc>> = parse_optional_rfc3339(
        "user last_transaction_at",
        row.try_get::<Option<String>, _>("last_transaction_at")?.as_deref(),
    )?;

    Ok(User {
        id: UserId(row.try_get("id")?),
        display_name: row.try_get("display_name")?,
        role,
        location: row.try_get("location")?,
        approved: row.try_get("approved")?,
        transaction_count: row.try_get("transaction_count")?,
        total_value: row.try_get("total_value")?,
        last_transaction_at,
        avg_fulfillment_score: row.try_get("avg_fulfillment_score")?,
        created_at: parse_rfc3339("user created_at", &row.try_get::<String, _>("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use dealsense_core::chrono::{TimeZone, Utc};
    use dealsense_core::domain::user::UserId;

    use super::SqlUserRepository;
    use crate::repositories::test_support::{
        insert_product, insert_user, insert_user_with, setup_pool, tx_at,
    };
    use crate::repositories::SqlTransactionRepository;

    #[tokio::test]
    async fn approved_buyers_exclude_sellers_and_unapproved_accounts() {
        let pool = setup_pool().await;
        insert_user(&pool, "buyer-1", "buyer").await;
        insert_user_with(&pool, "buyer-2", "buyer", None, false).await;
        insert_user(&pool, "seller-1", "seller").await;

        let repo = SqlUserRepository::new(pool.clone());
        let buyers = repo.list_approved_buyers().await.expect("list");
        assert_eq!(buyers.len(), 1);
        assert_eq!(buyers[0].id.0, "buyer-1");
    }

    #[tokio::test]
    async fn fulfillment_score_round_trips_including_clearing() {
        let pool = setup_pool().await;
        insert_user(&pool, "seller-1", "seller").await;

        let repo = SqlUserRepository::new(pool.clone());
        let id = UserId("seller-1".to_owned());
        repo.set_avg_fulfillment_score(&id, Some(82.5)).await.expect("set");
        let user = repo.find_by_id(&id).await.expect("find").expect("exists");
        assert_eq!(user.avg_fulfillment_score, Some(82.5));

        repo.set_avg_fulfillment_score(&id, None).await.expect("clear");
        let user = repo.find_by_id(&id).await.expect("find").expect("exists");
        assert_eq!(user.avg_fulfillment_score, None);
    }

    #[tokio::test]
    async fn rollup_refresh_counts_the_buyer_side() {
        let pool = setup_pool().await;
        insert_user(&pool, "buyer-1", "buyer").await;
        insert_user(&pool, "seller-1", "seller").await;
        insert_product(&pool, "prod-1", "seller-1", "Flower", 4.0).await;

        let txns = SqlTransactionRepository::new(pool.clone());
        let now = Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap();
        txns.insert(&tx_at("tx-1", "buyer-1", "seller-1", "prod-1", "Flower", now))
            .await
            .expect("insert");

        let repo = SqlUserRepository::new(pool.clone());
        let id = UserId("buyer-1".to_owned());
        repo.refresh_transaction_rollup(&id).await.expect("refresh");

        let user = repo.find_by_id(&id).await.expect("find").expect("exists");
        assert_eq!(user.transaction_count, 1);
        assert!((user.total_value - 40.0).abs() < 1e-9);
        assert_eq!(user.last_transaction_at, Some(now));
    }
}
