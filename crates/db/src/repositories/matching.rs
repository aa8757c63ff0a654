use dealsense_core::chrono::{DateTime, Utc};
use dealsense_core::domain::matching::{Insight, Match, MatchId, MatchStatus};
use dealsense_core::domain::product::ProductId;
use dealsense_core::domain::user::UserId;
use dealsense_core::score::matching::MatchBreakdown;
use sqlx::{sqlite::SqliteRow, Row};

use super::{parse_optional_rfc3339, parse_rfc3339, RepositoryError};
use crate::DbPool;

/// A buyer's match-engagement aggregates, optionally scoped to a product
/// category. Feeds propensity feature extraction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MatchEngagement {
    pub reviewed: i64,
    pub converted: i64,
    pub pending: i64,
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

pub struct SqlMatchRepository {
    pool: DbPool,
}

impl SqlMatchRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Idempotent upsert keyed by (buyer, product). Re-scoring refreshes
    /// score, breakdown and insights; a pending/viewed match resets to
    /// pending while converted/rejected matches keep their status. The
    /// original row id, created_at and reviewed_at survive the update.
    pub async fn upsert_scored(&self, scored: &Match) -> Result<(), RepositoryError> {
        let breakdown_json = serde_json::to_string(&scored.breakdown)
            .map_err(|err| RepositoryError::Decode(format!("encode match breakdown: {err}")))?;
        let insights_json = serde_json::to_string(&scored.insights)
            .map_err(|err| RepositoryError::Decode(format!("encode match insights: {err}")))?;

        sqlx::query(
            r#"
            INSERT INTO matches (
                id, buyer_id, product_id, score, breakdown_json, insights_json,
                status, weights_version, reviewed_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(buyer_id, product_id) DO UPDATE SET
                score = excluded.score,
                breakdown_json = excluded.breakdown_json,
                insights_json = excluded.insights_json,
                weights_version = excluded.weights_version,
                updated_at = excluded.updated_at,
                status = CASE
                    WHEN matches.status IN ('converted', 'rejected') THEN matches.status
                    ELSE 'pending'
                END
            "#,
        )
        .bind(&scored.id.0)
        .bind(&scored.buyer_id.0)
        .bind(&scored.product_id.0)
        .bind(scored.score)
        .bind(&breakdown_json)
        .bind(&insights_json)
        .bind(scored.status.as_str())
        .bind(&scored.weights_version)
        .bind(scored.reviewed_at.map(|ts| ts.to_rfc3339()))
        .bind(scored.created_at.to_rfc3339())
        .bind(scored.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_pair(
        &self,
        buyer_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Option<Match>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM matches WHERE buyer_id = ? AND product_id = ?")
            .bind(&buyer_id.0)
            .bind(&product_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| match_from_row(&row)).transpose()
    }

    pub async fn list_for_buyer(&self, buyer_id: &UserId) -> Result<Vec<Match>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM matches WHERE buyer_id = ? ORDER BY score DESC, product_id ASC",
        )
        .bind(&buyer_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(match_from_row).collect()
    }

    pub async fn count_for_buyer(&self, buyer_id: &UserId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM matches WHERE buyer_id = ?")
            .bind(&buyer_id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Writes a status decided by the domain state machine; the repository
    /// does not re-validate the transition.
    pub async fn set_status(
        &self,
        id: &MatchId,
        status: MatchStatus,
        reviewed_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE matches SET status = ?, reviewed_at = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(reviewed_at.map(|ts| ts.to_rfc3339()))
            .bind(Utc::now().to_rfc3339())
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn engagement_stats(
        &self,
        buyer_id: &UserId,
        category: Option<&str>,
    ) -> Result<MatchEngagement, RepositoryError> {
        let base = r#"
            SELECT
                COALESCE(SUM(CASE WHEN m.status IN ('viewed', 'converted', 'rejected') THEN 1 ELSE 0 END), 0) AS reviewed,
                COALESCE(SUM(CASE WHEN m.status = 'converted' THEN 1 ELSE 0 END), 0) AS converted,
                COALESCE(SUM(CASE WHEN m.status = 'pending' THEN 1 ELSE 0 END), 0) AS pending,
                MAX(m.reviewed_at) AS last_reviewed_at
            FROM matches m
            JOIN products p ON p.id = m.product_id
            WHERE m.buyer_id = ?
        "#;

        let row = match category {
            Some(category) => {
                sqlx::query(&format!("{base} AND p.category = ?"))
                    .bind(&buyer_id.0)
                    .bind(category)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => sqlx::query(base).bind(&buyer_id.0).fetch_one(&self.pool).await?,
        };

        Ok(MatchEngagement {
            reviewed: row.get("reviewed"),
            converted: row.get("converted"),
            pending: row.get("pending"),
            last_reviewed_at: parse_optional_rfc3339(
                "match last_reviewed_at",
                row.try_get::<Option<String>, _>("last_reviewed_at")?.as_deref(),
            )?,
        })
    }
}

fn match_from_row(row: &SqliteRow) -> Result<Match, RepositoryError> {
    let status_raw: String = row.try_get("status")?;
    let status = MatchStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("invalid match status: {status_raw}")))?;

    let breakdown: MatchBreakdown =
        serde_json::from_str(&row.try_get::<String, _>("breakdown_json")?)
            .map_err(|err| RepositoryError::Decode(format!("decode match breakdown: {err}")))?;
    let insights: Vec<Insight> = serde_json::from_str(&row.try_get::<String, _>("insights_json")?)
        .map_err(|err| RepositoryError::Decode(format!("decode match insights: {err}")))?;

    Ok(Match {
        id: MatchId(row.try_get("id")?),
        buyer_id: UserId(row.try_get("buyer_id")?),
        product_id: ProductId(row.try_get("product_id")?),
        score: row.try_get("score")?,
        breakdown,
        insights,
        status,
        weights_version: row.try_get("weights_version")?,
        reviewed_at: parse_optional_rfc3339(
            "match reviewed_at",
            row.try_get::<Option<String>, _>("reviewed_at")?.as_deref(),
        )?,
        created_at: parse_rfc3339("match created_at", &row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_rfc3339("match updated_at", &row.try_get::<String, _>("updated_at")?)?,
    })
}
