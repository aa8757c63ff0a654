//! Propensity service: feature extraction plus the 24-hour read-through
//! cache. A read inside the TTL returns the stored row untouched; an
//! expired or missing row is recomputed and overwritten.

use dealsense_core::chrono::{DateTime, Duration, Utc};
use dealsense_core::domain::propensity::{PropensityFeatures, PropensityScore};
use dealsense_core::domain::user::UserId;
use dealsense_core::score::propensity as propensity_math;
use dealsense_core::score::reorder as reorder_math;
use dealsense_core::score::weights::PropensityWeights;
use dealsense_db::repositories::{
    SqlChurnRepository, SqlMatchRepository, SqlPredictionRepository, SqlPropensityRepository,
    SqlTransactionRepository,
};
use dealsense_db::DbPool;

use crate::{new_id, store_error, EngineResult};

pub struct PropensityService {
    transactions: SqlTransactionRepository,
    matches: SqlMatchRepository,
    predictions: SqlPredictionRepository,
    churn: SqlChurnRepository,
    cache: SqlPropensityRepository,
    weights: PropensityWeights,
    ttl_hours: i64,
}

impl PropensityService {
    pub fn new(pool: DbPool, weights: PropensityWeights, ttl_hours: i64) -> Self {
        Self {
            transactions: SqlTransactionRepository::new(pool.clone()),
            matches: SqlMatchRepository::new(pool.clone()),
            predictions: SqlPredictionRepository::new(pool.clone()),
            churn: SqlChurnRepository::new(pool.clone()),
            cache: SqlPropensityRepository::new(pool),
            weights,
            ttl_hours,
        }
    }

    /// Cache-or-compute read. Staleness is bounded by the TTL; there is no
    /// push invalidation on new transactions (see `invalidate`).
    pub async fn get_propensity(
        &self,
        buyer_id: &UserId,
        category: Option<&str>,
    ) -> EngineResult<PropensityScore> {
        let now = Utc::now();

        if let Some(cached) = self.cache.find(buyer_id, category).await.map_err(store_error)? {
            if !cached.is_expired(now) {
                tracing::debug!(
                    event_name = "intelligence.propensity.cache_hit",
                    buyer_id = %buyer_id,
                    category = cached.category_key(),
                    "propensity served from cache"
                );
                return Ok(cached);
            }
        }

        let features = self.extract_features(buyer_id, category, now).await?;
        let (sub_scores, overall) = propensity_math::score_features(&self.weights, &features);

        let score = PropensityScore {
            id: new_id("prop"),
            buyer_id: buyer_id.clone(),
            category: category.map(str::to_owned),
            overall,
            sub_scores,
            features,
            computed_at: now,
            expires_at: now + Duration::hours(self.ttl_hours),
        };
        self.cache.upsert(&score).await.map_err(store_error)?;

        tracing::debug!(
            event_name = "intelligence.propensity.computed",
            buyer_id = %buyer_id,
            category = score.category_key(),
            overall = score.overall,
            "propensity recomputed"
        );
        Ok(score)
    }

    /// Explicit invalidation hook for transaction/bid writes.
    pub async fn invalidate(&self, buyer_id: &UserId) -> EngineResult<u64> {
        self.cache.invalidate(buyer_id).await.map_err(store_error)
    }

    async fn extract_features(
        &self,
        buyer_id: &UserId,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> EngineResult<PropensityFeatures> {
        let summary =
            self.transactions.spend_summary(buyer_id, category, now).await.map_err(store_error)?;

        let last_purchase = self
            .transactions
            .last_transacted_at(buyer_id, category)
            .await
            .map_err(store_error)?;
        let days_since_purchase =
            last_purchase.map(|last| (now - last).num_seconds() as f64 / 86_400.0);

        let purchases =
            self.transactions.list_for_buyer(buyer_id, category).await.map_err(store_error)?;
        let dates: Vec<_> = purchases.iter().map(|tx| tx.transacted_at).collect();
        let avg_interval_days =
            reorder_math::interval_model(&dates).map(|model| model.avg_interval_days);

        let category_counts =
            self.transactions.category_counts(buyer_id).await.map_err(store_error)?;
        let distinct_categories = category_counts.len() as i64;
        let top_category_count =
            category_counts.first().map(|count| count.transactions).unwrap_or(0);

        let engagement =
            self.matches.engagement_stats(buyer_id, category).await.map_err(store_error)?;
        let conversion_rate = if engagement.reviewed > 0 {
            engagement.converted as f64 / engagement.reviewed as f64
        } else {
            0.0
        };
        let days_since_reviewed_match = engagement
            .last_reviewed_at
            .map(|last| (now - last).num_seconds() as f64 / 86_400.0);

        let churn_risk_score = self
            .churn
            .active_risk_score(buyer_id, category)
            .await
            .map_err(store_error)?
            .unwrap_or(0.0);

        let overdue_days = self.overdue_days(buyer_id, category, now).await?;

        Ok(PropensityFeatures {
            days_since_purchase,
            days_since_reviewed_match,
            transactions_total: summary.transactions_total,
            transactions_30d: summary.transactions_30d,
            transactions_90d: summary.transactions_90d,
            avg_interval_days,
            total_spend: summary.total_spend,
            spend_30d: summary.spend_30d,
            spend_90d: summary.spend_90d,
            avg_order_value: summary.avg_order_value,
            distinct_categories,
            top_category_count,
            matches_reviewed: engagement.reviewed,
            conversion_rate,
            matches_pending: engagement.pending,
            churn_risk_score,
            overdue_days,
        })
    }

    /// Days past the current prediction; 0 when none exists or the buyer is
    /// not overdue. Cross-category reads take the worst overdue prediction.
    async fn overdue_days(
        &self,
        buyer_id: &UserId,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> EngineResult<f64> {
        let predictions = match category {
            Some(category) => self
                .predictions
                .find(buyer_id, category)
                .await
                .map_err(store_error)?
                .into_iter()
                .collect(),
            None => self.predictions.list_for_buyer(buyer_id).await.map_err(store_error)?,
        };

        Ok(predictions
            .iter()
            .map(|prediction| -prediction.days_until(now))
            .fold(0.0, f64::max))
    }
}
