//! Reorder prediction service: fits interval models per buyer-category,
//! maintains the prediction rows and emits due-soon notifications.

use std::collections::BTreeMap;
use std::sync::Arc;

use dealsense_core::chrono::Utc;
use dealsense_core::domain::prediction::ReorderPrediction;
use dealsense_core::domain::transaction::Transaction;
use dealsense_core::domain::user::UserId;
use dealsense_core::score::reorder as reorder_math;
use dealsense_core::score::MIN_PREDICTION_SAMPLE;
use dealsense_db::repositories::{SqlPredictionRepository, SqlTransactionRepository};
use dealsense_db::DbPool;

use crate::notify::Notifier;
use crate::{new_id, store_error, EngineResult};

/// Days before the predicted date the due-soon notification may fire.
pub const DUE_SOON_WINDOW_DAYS: i64 = 7;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct PredictionSweep {
    pub buyers_processed: usize,
    pub predictions_created: usize,
    pub predictions_removed: usize,
    pub notifications_sent: usize,
}

pub struct ReorderService {
    transactions: SqlTransactionRepository,
    predictions: SqlPredictionRepository,
    notifier: Arc<dyn Notifier>,
}

impl ReorderService {
    pub fn new(pool: DbPool, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            transactions: SqlTransactionRepository::new(pool.clone()),
            predictions: SqlPredictionRepository::new(pool),
            notifier,
        }
    }

    /// Fits one interval model per category the buyer purchases in and
    /// upserts the resulting predictions. Categories below the minimum
    /// sample, or whose gaps are all noise, produce nothing.
    pub async fn generate_predictions_for_buyer(
        &self,
        buyer_id: &UserId,
    ) -> EngineResult<usize> {
        let transactions =
            self.transactions.list_for_buyer(buyer_id, None).await.map_err(store_error)?;

        let mut by_category: BTreeMap<&str, Vec<&Transaction>> = BTreeMap::new();
        for tx in &transactions {
            by_category.entry(tx.category.as_str()).or_default().push(tx);
        }

        let mut created = 0;
        for (category, rows) in by_category {
            if (rows.len() as i64) < MIN_PREDICTION_SAMPLE {
                continue;
            }

            let dates: Vec<_> = rows.iter().map(|tx| tx.transacted_at).collect();
            let Some(model) = reorder_math::interval_model(&dates) else {
                tracing::debug!(
                    event_name = "intelligence.reorder.all_gaps_noise",
                    buyer_id = %buyer_id,
                    category,
                    "no usable purchase gaps, prediction skipped"
                );
                continue;
            };

            let Some(last) = rows.last() else {
                continue;
            };
            let prediction = ReorderPrediction {
                id: new_id("pred"),
                buyer_id: buyer_id.clone(),
                category: category.to_owned(),
                predicted_at: reorder_math::predicted_date(
                    last.transacted_at,
                    model.avg_interval_days,
                ),
                confidence: reorder_math::confidence(model.stddev_days, rows.len() as i64),
                sample_size: rows.len() as i64,
                avg_interval_days: model.avg_interval_days,
                last_transaction_id: last.id.clone(),
                notified_at: None,
                updated_at: Utc::now(),
            };
            self.predictions.upsert(&prediction).await.map_err(store_error)?;
            created += 1;
        }

        Ok(created)
    }

    /// The scheduled sweep: regenerate predictions for every qualifying
    /// buyer, prune predictions whose buyer dropped below the minimum
    /// sample, and send each due-soon notification exactly once.
    pub async fn generate_predictions(&self) -> EngineResult<PredictionSweep> {
        let pairs = self
            .transactions
            .buyer_categories_with_min_transactions(MIN_PREDICTION_SAMPLE)
            .await
            .map_err(store_error)?;

        let mut buyers: Vec<UserId> = Vec::new();
        for (buyer_id, _, _) in pairs {
            if buyers.last() != Some(&buyer_id) {
                buyers.push(buyer_id);
            }
        }

        let mut sweep = PredictionSweep::default();
        for buyer_id in &buyers {
            match self.generate_predictions_for_buyer(buyer_id).await {
                Ok(created) => {
                    sweep.buyers_processed += 1;
                    sweep.predictions_created += created;
                }
                Err(err) => {
                    tracing::warn!(
                        event_name = "intelligence.reorder.buyer_failed",
                        buyer_id = %buyer_id,
                        error = %err,
                        "buyer skipped during prediction sweep"
                    );
                }
            }
        }

        sweep.predictions_removed = self.prune_below_minimum().await?;
        sweep.notifications_sent = self.notify_due_soon().await?;

        tracing::info!(
            event_name = "intelligence.reorder.sweep_finished",
            buyers_processed = sweep.buyers_processed,
            predictions_created = sweep.predictions_created,
            predictions_removed = sweep.predictions_removed,
            notifications_sent = sweep.notifications_sent,
            "prediction sweep finished"
        );
        Ok(sweep)
    }

    async fn prune_below_minimum(&self) -> EngineResult<usize> {
        let mut removed = 0;
        for prediction in self.predictions.list_all().await.map_err(store_error)? {
            let count = self
                .transactions
                .count_for_buyer_category(&prediction.buyer_id, &prediction.category)
                .await
                .map_err(store_error)?;
            if count < MIN_PREDICTION_SAMPLE
                && self
                    .predictions
                    .delete(&prediction.buyer_id, &prediction.category)
                    .await
                    .map_err(store_error)?
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn notify_due_soon(&self) -> EngineResult<usize> {
        let now = Utc::now();
        let due = self
            .predictions
            .list_due_unnotified(now, DUE_SOON_WINDOW_DAYS)
            .await
            .map_err(store_error)?;

        let mut sent = 0;
        for prediction in due {
            let days_until = prediction.days_until(now);
            let body = if days_until < 0.0 {
                format!(
                    "Your usual {} reorder looks overdue. Browse current listings?",
                    prediction.category
                )
            } else {
                format!(
                    "Based on your purchase pattern you usually reorder {} around now.",
                    prediction.category
                )
            };
            self.notifier
                .notify(
                    &prediction.buyer_id,
                    "reorder.due_soon",
                    "Time to restock?",
                    &body,
                    serde_json::json!({
                        "category": prediction.category,
                        "predicted_at": prediction.predicted_at.to_rfc3339(),
                        "confidence": prediction.confidence,
                    }),
                )
                .await;
            self.predictions.mark_notified(&prediction.id, now).await.map_err(store_error)?;
            sent += 1;
        }
        Ok(sent)
    }
}
