//! Churn detection service: walks every stored reorder pattern and raises
//! or resolves the per-buyer-category signals.

use dealsense_core::chrono::Utc;
use dealsense_core::domain::churn::{ChurnRiskLevel, ChurnSignal, ChurnStats};
use dealsense_core::domain::user::UserId;
use dealsense_core::score::churn as churn_math;
use dealsense_db::repositories::{
    SqlChurnRepository, SqlPredictionRepository, SqlTransactionRepository,
};
use dealsense_db::DbPool;

use crate::{new_id, store_error, EngineResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ChurnSweep {
    pub signals_raised: usize,
    pub signals_resolved: usize,
}

pub struct ChurnService {
    transactions: SqlTransactionRepository,
    predictions: SqlPredictionRepository,
    signals: SqlChurnRepository,
}

impl ChurnService {
    pub fn new(pool: DbPool) -> Self {
        Self {
            transactions: SqlTransactionRepository::new(pool.clone()),
            predictions: SqlPredictionRepository::new(pool.clone()),
            signals: SqlChurnRepository::new(pool),
        }
    }

    /// Compares days-since-last-purchase against the predicted interval for
    /// every buyer-category with a reorder pattern. Buyers past the trigger
    /// get an active signal; buyers back inside their pattern have the
    /// signal resolved, keeping the row for history.
    pub async fn detect_all_churn_signals(&self) -> EngineResult<ChurnSweep> {
        let now = Utc::now();
        let mut sweep = ChurnSweep::default();

        for prediction in self.predictions.list_all().await.map_err(store_error)? {
            let last = match self
                .transactions
                .last_transacted_at(&prediction.buyer_id, Some(&prediction.category))
                .await
            {
                Ok(Some(last)) => last,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(
                        event_name = "intelligence.churn.buyer_failed",
                        buyer_id = %prediction.buyer_id,
                        category = %prediction.category,
                        error = %err,
                        "buyer-category skipped during churn sweep"
                    );
                    continue;
                }
            };

            let days_since = (now - last).num_seconds() as f64 / 86_400.0;
            match churn_math::evaluate(days_since, prediction.avg_interval_days) {
                Some((risk_score, risk_level)) => {
                    let signal = ChurnSignal {
                        id: new_id("churn"),
                        buyer_id: prediction.buyer_id.clone(),
                        category: prediction.category.clone(),
                        risk_score,
                        risk_level,
                        is_active: true,
                        detected_at: now,
                        resolved_at: None,
                    };
                    self.signals.raise(&signal).await.map_err(store_error)?;
                    sweep.signals_raised += 1;
                }
                None => {
                    if self
                        .signals
                        .resolve(&prediction.buyer_id, &prediction.category, now)
                        .await
                        .map_err(store_error)?
                    {
                        sweep.signals_resolved += 1;
                    }
                }
            }
        }

        tracing::info!(
            event_name = "intelligence.churn.sweep_finished",
            signals_raised = sweep.signals_raised,
            signals_resolved = sweep.signals_resolved,
            "churn sweep finished"
        );
        Ok(sweep)
    }

    /// Deactivates the signal after a purchase in the category, preserving
    /// history. Intended to be called from the transaction write path.
    pub async fn resolve_on_purchase(
        &self,
        buyer_id: &UserId,
        category: &str,
    ) -> EngineResult<bool> {
        self.signals.resolve(buyer_id, category, Utc::now()).await.map_err(store_error)
    }

    pub async fn get_at_risk_buyers(
        &self,
        min_risk_level: ChurnRiskLevel,
        limit: i64,
    ) -> EngineResult<Vec<ChurnSignal>> {
        self.signals.list_active(min_risk_level, limit).await.map_err(store_error)
    }

    pub async fn get_churn_stats(&self) -> EngineResult<ChurnStats> {
        self.signals.stats().await.map_err(store_error)
    }
}
