use dealsense_core::chrono::{DateTime, Utc};
use dealsense_core::domain::churn::{ChurnRiskLevel, ChurnSignal, ChurnStats};
use dealsense_core::domain::user::UserId;
use sqlx::{sqlite::SqliteRow, Row};

use super::{parse_optional_rfc3339, parse_rfc3339, RepositoryError};
use crate::DbPool;

pub struct SqlChurnRepository {
    pool: DbPool,
}

impl SqlChurnRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Raises or refreshes the signal for a buyer-category. A signal that
    /// was already active keeps its original detection time; a previously
    /// resolved one re-activates with the new detection time.
    pub async fn raise(&self, signal: &ChurnSignal) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO churn_signals (
                id, buyer_id, category, risk_score, risk_level,
                is_active, detected_at, resolved_at
            ) VALUES (?, ?, ?, ?, ?, 1, ?, NULL)
            ON CONFLICT(buyer_id, category) DO UPDATE SET
                risk_score = excluded.risk_score,
                risk_level = excluded.risk_level,
                detected_at = CASE
                    WHEN churn_signals.is_active = 1 THEN churn_signals.detected_at
                    ELSE excluded.detected_at
                END,
                is_active = 1,
                resolved_at = NULL
            "#,
        )
        .bind(&signal.id)
        .bind(&signal.buyer_id.0)
        .bind(&signal.category)
        .bind(signal.risk_score)
        .bind(signal.risk_level.as_str())
        .bind(signal.detected_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deactivates the signal after a new purchase in the category; the
    /// row is kept for history. Returns whether an active signal existed.
    pub async fn resolve(
        &self,
        buyer_id: &UserId,
        category: &str,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE churn_signals SET is_active = 0, resolved_at = ?
             WHERE buyer_id = ? AND category = ? AND is_active = 1",
        )
        .bind(resolved_at.to_rfc3339())
        .bind(&buyer_id.0)
        .bind(category)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find(
        &self,
        buyer_id: &UserId,
        category: &str,
    ) -> Result<Option<ChurnSignal>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM churn_signals WHERE buyer_id = ? AND category = ?")
            .bind(&buyer_id.0)
            .bind(category)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| signal_from_row(&row)).transpose()
    }

    /// Highest active risk for the buyer, optionally scoped to a category.
    /// The cross-category propensity dampener uses the worst signal.
    pub async fn active_risk_score(
        &self,
        buyer_id: &UserId,
        category: Option<&str>,
    ) -> Result<Option<f64>, RepositoryError> {
        let score: Option<f64> = match category {
            Some(category) => {
                sqlx::query_scalar(
                    "SELECT MAX(risk_score) FROM churn_signals
                     WHERE buyer_id = ? AND category = ? AND is_active = 1",
                )
                .bind(&buyer_id.0)
                .bind(category)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar(
                    "SELECT MAX(risk_score) FROM churn_signals
                     WHERE buyer_id = ? AND is_active = 1",
                )
                .bind(&buyer_id.0)
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(score)
    }

    /// Active signals at or above the level, riskiest first.
    pub async fn list_active(
        &self,
        min_level: ChurnRiskLevel,
        limit: i64,
    ) -> Result<Vec<ChurnSignal>, RepositoryError> {
        let min_score = match min_level {
            ChurnRiskLevel::Low => 0.0,
            ChurnRiskLevel::Medium => 25.0,
            ChurnRiskLevel::High => 50.0,
            ChurnRiskLevel::Critical => 75.0,
        };

        let rows = sqlx::query(
            "SELECT * FROM churn_signals
             WHERE is_active = 1 AND risk_score >= ?
             ORDER BY risk_score DESC, buyer_id ASC, category ASC
             LIMIT ?",
        )
        .bind(min_score)
        .bind(limit.clamp(1, 500))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(signal_from_row).collect()
    }

    pub async fn stats(&self) -> Result<ChurnStats, RepositoryError> {
        let rows = sqlx::query(
            "SELECT risk_level, COUNT(*) AS count FROM churn_signals
             WHERE is_active = 1 GROUP BY risk_level",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = ChurnStats::default();
        for row in rows {
            let level_raw: String = row.get("risk_level");
            let count: i64 = row.get("count");
            match ChurnRiskLevel::parse(&level_raw) {
                Some(ChurnRiskLevel::Critical) => stats.critical = count,
                Some(ChurnRiskLevel::High) => stats.high = count,
                Some(ChurnRiskLevel::Medium) => stats.medium = count,
                Some(ChurnRiskLevel::Low) => stats.low = count,
                None => {
                    return Err(RepositoryError::Decode(format!(
                        "invalid churn risk level: {level_raw}"
                    )))
                }
            }
        }
        Ok(stats)
    }
}

fn signal_from_row(row: &SqliteRow) -> Result<ChurnSignal, RepositoryError> {
    let level_raw: String = row.try_get("risk_level")?;
    let risk_level = ChurnRiskLevel::parse(&level_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("invalid churn risk level: {level_raw}")))?;

    Ok(ChurnSignal {
        id: row.try_get("id")?,
        buyer_id: UserId(row.try_get("buyer_id")?),
        category: row.try_get("category")?,
        risk_score: row.try_get("risk_score")?,
        risk_level,
        is_active: row.try_get("is_active")?,
        detected_at: parse_rfc3339(
            "churn signal detected_at",
            &row.try_get::<String, _>("detected_at")?,
        )?,
        resolved_at: parse_optional_rfc3339(
            "churn signal resolved_at",
            row.try_get::<Option<String>, _>("resolved_at")?.as_deref(),
        )?,
    })
}

#[cfg(test)]
mod tests {
    use dealsense_core::chrono::{DateTime, Duration, TimeZone, Utc};
    use dealsense_core::domain::churn::{ChurnRiskLevel, ChurnSignal};
    use dealsense_core::domain::user::UserId;

    use super::SqlChurnRepository;
    use crate::repositories::test_support::{insert_user, setup_pool};

    fn signal(id: &str, buyer: &str, category: &str, risk_score: f64) -> ChurnSignal {
        ChurnSignal {
            id: id.to_owned(),
            buyer_id: UserId(buyer.to_owned()),
            category: category.to_owned(),
            risk_score,
            risk_level: ChurnRiskLevel::from_score(risk_score),
            is_active: true,
            detected_at: Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap(),
            resolved_at: None,
        }
    }

    #[tokio::test]
    async fn resolve_deactivates_without_deleting_history() {
        let pool = setup_pool().await;
        insert_user(&pool, "buyer-1", "buyer").await;

        let repo = SqlChurnRepository::new(pool.clone());
        repo.raise(&signal("churn-1", "buyer-1", "Flower", 60.0)).await.expect("raise");

        let buyer = UserId("buyer-1".to_owned());
        let resolved_at: DateTime<Utc> = Utc.with_ymd_and_hms(2026, 5, 3, 8, 0, 0).unwrap();
        assert!(repo.resolve(&buyer, "Flower", resolved_at).await.expect("resolve"));
        assert!(!repo.resolve(&buyer, "Flower", resolved_at).await.expect("resolve again"));

        let found = repo.find(&buyer, "Flower").await.expect("find").expect("history kept");
        assert!(!found.is_active);
        assert_eq!(found.resolved_at, Some(resolved_at));
        assert_eq!(repo.active_risk_score(&buyer, Some("Flower")).await.expect("risk"), None);
    }

    #[tokio::test]
    async fn reraising_an_active_signal_keeps_the_original_detection_time() {
        let pool = setup_pool().await;
        insert_user(&pool, "buyer-1", "buyer").await;

        let repo = SqlChurnRepository::new(pool.clone());
        let first = signal("churn-1", "buyer-1", "Flower", 30.0);
        repo.raise(&first).await.expect("raise");

        let mut escalated = signal("churn-2", "buyer-1", "Flower", 80.0);
        escalated.detected_at = first.detected_at + Duration::days(5);
        repo.raise(&escalated).await.expect("escalate");

        let buyer = UserId("buyer-1".to_owned());
        let found = repo.find(&buyer, "Flower").await.expect("find").expect("exists");
        assert_eq!(found.detected_at, first.detected_at);
        assert_eq!(found.risk_level, ChurnRiskLevel::Critical);
        assert!((found.risk_score - 80.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn stats_and_at_risk_listing_cover_active_signals_only() {
        let pool = setup_pool().await;
        for buyer in ["buyer-1", "buyer-2", "buyer-3"] {
            insert_user(&pool, buyer, "buyer").await;
        }

        let repo = SqlChurnRepository::new(pool.clone());
        repo.raise(&signal("churn-1", "buyer-1", "Flower", 90.0)).await.expect("raise");
        repo.raise(&signal("churn-2", "buyer-2", "Flower", 55.0)).await.expect("raise");
        repo.raise(&signal("churn-3", "buyer-3", "Flower", 30.0)).await.expect("raise");
        repo.resolve(
            &UserId("buyer-3".to_owned()),
            "Flower",
            Utc.with_ymd_and_hms(2026, 5, 2, 0, 0, 0).unwrap(),
        )
        .await
        .expect("resolve");

        let stats = repo.stats().await.expect("stats");
        assert_eq!(stats.critical, 1);
        assert_eq!(stats.high, 1);
        assert_eq!(stats.medium, 0);
        assert_eq!(stats.total(), 2);

        let at_risk = repo.list_active(ChurnRiskLevel::High, 10).await.expect("list");
        assert_eq!(at_risk.len(), 2);
        assert_eq!(at_risk[0].buyer_id.0, "buyer-1", "riskiest first");

        let critical_only = repo.list_active(ChurnRiskLevel::Critical, 10).await.expect("list");
        assert_eq!(critical_only.len(), 1);
    }
}
