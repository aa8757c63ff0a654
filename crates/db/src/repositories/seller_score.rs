use dealsense_core::domain::seller::SellerScore;
use dealsense_core::domain::user::UserId;
use sqlx::{sqlite::SqliteRow, Row};

use super::{parse_rfc3339, RepositoryError};
use crate::DbPool;

pub struct SqlSellerScoreRepository {
    pool: DbPool,
}

impl SqlSellerScoreRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, score: &SellerScore) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO seller_scores (
                seller_id, fill_rate, quality, delivery, pricing,
                overall, transactions_scored, computed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(seller_id) DO UPDATE SET
                fill_rate = excluded.fill_rate,
                quality = excluded.quality,
                delivery = excluded.delivery,
                pricing = excluded.pricing,
                overall = excluded.overall,
                transactions_scored = excluded.transactions_scored,
                computed_at = excluded.computed_at
            "#,
        )
        .bind(&score.seller_id.0)
        .bind(score.fill_rate)
        .bind(score.quality)
        .bind(score.delivery)
        .bind(score.pricing)
        .bind(score.overall)
        .bind(score.transactions_scored)
        .bind(score.computed_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find(&self, seller_id: &UserId) -> Result<Option<SellerScore>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM seller_scores WHERE seller_id = ?")
            .bind(&seller_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| seller_score_from_row(&row)).transpose()
    }
}

fn seller_score_from_row(row: &SqliteRow) -> Result<SellerScore, RepositoryError> {
    Ok(SellerScore {
        seller_id: UserId(row.try_get("seller_id")?),
        fill_rate: row.try_get("fill_rate")?,
        quality: row.try_get("quality")?,
        delivery: row.try_get("delivery")?,
        pricing: row.try_get("pricing")?,
        overall: row.try_get("overall")?,
        transactions_scored: row.try_get("transactions_scored")?,
        computed_at: parse_rfc3339(
            "seller score computed_at",
            &row.try_get::<String, _>("computed_at")?,
        )?,
    })
}
