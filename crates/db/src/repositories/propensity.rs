use dealsense_core::domain::propensity::{
    PropensityFeatures, PropensityScore, PropensitySubScores, ALL_CATEGORIES,
};
use dealsense_core::domain::user::UserId;
use sqlx::{sqlite::SqliteRow, Row};

use super::{parse_rfc3339, RepositoryError};
use crate::DbPool;

pub struct SqlPropensityRepository {
    pool: DbPool,
}

impl SqlPropensityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, score: &PropensityScore) -> Result<(), RepositoryError> {
        let features_json = serde_json::to_string(&score.features)
            .map_err(|err| RepositoryError::Decode(format!("encode propensity features: {err}")))?;

        sqlx::query(
            r#"
            INSERT INTO propensity_scores (
                id, buyer_id, category, overall,
                recency, frequency, monetary, category_affinity, engagement,
                features_json, computed_at, expires_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(buyer_id, category) DO UPDATE SET
                overall = excluded.overall,
                recency = excluded.recency,
                frequency = excluded.frequency,
                monetary = excluded.monetary,
                category_affinity = excluded.category_affinity,
                engagement = excluded.engagement,
                features_json = excluded.features_json,
                computed_at = excluded.computed_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(&score.id)
        .bind(&score.buyer_id.0)
        .bind(score.category_key())
        .bind(score.overall)
        .bind(score.sub_scores.recency)
        .bind(score.sub_scores.frequency)
        .bind(score.sub_scores.monetary)
        .bind(score.sub_scores.category_affinity)
        .bind(score.sub_scores.engagement)
        .bind(&features_json)
        .bind(score.computed_at.to_rfc3339())
        .bind(score.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find(
        &self,
        buyer_id: &UserId,
        category: Option<&str>,
    ) -> Result<Option<PropensityScore>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM propensity_scores WHERE buyer_id = ? AND category = ?")
            .bind(&buyer_id.0)
            .bind(category.unwrap_or(ALL_CATEGORIES))
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| propensity_from_row(&row)).transpose()
    }

    /// Drops every cached score for the buyer; the next read recomputes.
    pub async fn invalidate(&self, buyer_id: &UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM propensity_scores WHERE buyer_id = ?")
            .bind(&buyer_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn propensity_from_row(row: &SqliteRow) -> Result<PropensityScore, RepositoryError> {
    let category: String = row.try_get("category")?;
    let features: PropensityFeatures =
        serde_json::from_str(&row.try_get::<String, _>("features_json")?)
            .map_err(|err| RepositoryError::Decode(format!("decode propensity features: {err}")))?;

    Ok(PropensityScore {
        id: row.try_get("id")?,
        buyer_id: UserId(row.try_get("buyer_id")?),
        category: if category == ALL_CATEGORIES { None } else { Some(category) },
        overall: row.try_get("overall")?,
        sub_scores: PropensitySubScores {
            recency: row.try_get("recency")?,
            frequency: row.try_get("frequency")?,
            monetary: row.try_get("monetary")?,
            category_affinity: row.try_get("category_affinity")?,
            engagement: row.try_get("engagement")?,
        },
        features,
        computed_at: parse_rfc3339(
            "propensity computed_at",
            &row.try_get::<String, _>("computed_at")?,
        )?,
        expires_at: parse_rfc3339(
            "propensity expires_at",
            &row.try_get::<String, _>("expires_at")?,
        )?,
    })
}
