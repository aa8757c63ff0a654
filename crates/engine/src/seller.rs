//! Seller reliability service: scores one seller from their outcome-recorded
//! transactions and sweeps the full seller book.

use dealsense_core::chrono::Utc;
use dealsense_core::domain::seller::SellerScore;
use dealsense_core::domain::user::UserId;
use dealsense_core::score::seller as seller_math;
use dealsense_core::score::weights::SellerScoreWeights;
use dealsense_db::repositories::{
    SqlSellerScoreRepository, SqlTransactionRepository, SqlUserRepository,
};
use dealsense_db::DbPool;

use crate::{store_error, EngineResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct SellerSweep {
    pub sellers_updated: usize,
    pub sellers_failed: usize,
}

pub struct SellerScoreService {
    transactions: SqlTransactionRepository,
    scores: SqlSellerScoreRepository,
    users: SqlUserRepository,
    weights: SellerScoreWeights,
}

impl SellerScoreService {
    pub fn new(pool: DbPool, weights: SellerScoreWeights) -> Self {
        Self {
            transactions: SqlTransactionRepository::new(pool.clone()),
            scores: SqlSellerScoreRepository::new(pool.clone()),
            users: SqlUserRepository::new(pool),
            weights,
        }
    }

    /// Scores the seller, persists the score row and refreshes the
    /// denormalized fulfillment score on the user record. A seller with no
    /// outcome-recorded transactions gets the distinct no-data row
    /// (`transactions_scored = 0`) rather than a low score.
    pub async fn calculate_seller_scores(&self, seller_id: &UserId) -> EngineResult<SellerScore> {
        let outcomes =
            self.transactions.list_outcomes_for_seller(seller_id).await.map_err(store_error)?;

        let score = if outcomes.is_empty() {
            SellerScore {
                seller_id: seller_id.clone(),
                fill_rate: 0.0,
                quality: 0.0,
                delivery: 0.0,
                pricing: 0.0,
                overall: 0.0,
                transactions_scored: 0,
                computed_at: Utc::now(),
            }
        } else {
            let fill_rate = seller_math::fill_rate(&outcomes);
            let quality = seller_math::quality_score(&outcomes);
            let delivery = seller_math::delivery_score(&outcomes);
            let categories =
                self.transactions.seller_category_sales(seller_id).await.map_err(store_error)?;
            let pricing = seller_math::pricing_score(&categories);

            SellerScore {
                seller_id: seller_id.clone(),
                fill_rate,
                quality,
                delivery,
                pricing,
                overall: seller_math::overall(&self.weights, fill_rate, quality, delivery, pricing),
                transactions_scored: outcomes.len() as i64,
                computed_at: Utc::now(),
            }
        };

        self.scores.upsert(&score).await.map_err(store_error)?;
        let fulfillment = score.has_data().then_some(score.overall);
        self.users.set_avg_fulfillment_score(seller_id, fulfillment).await.map_err(store_error)?;

        tracing::info!(
            event_name = "intelligence.seller.scored",
            seller_id = %seller_id,
            overall = score.overall,
            transactions_scored = score.transactions_scored,
            "seller reliability scored"
        );

        Ok(score)
    }

    /// Recalculates every seller; one failing seller is logged and skipped.
    pub async fn recalculate_all_seller_scores(&self) -> EngineResult<SellerSweep> {
        let sellers = self.users.list_sellers().await.map_err(store_error)?;

        let mut sweep = SellerSweep::default();
        for seller in sellers {
            match self.calculate_seller_scores(&seller.id).await {
                Ok(_) => sweep.sellers_updated += 1,
                Err(err) => {
                    sweep.sellers_failed += 1;
                    tracing::warn!(
                        event_name = "intelligence.seller.score_failed",
                        seller_id = %seller.id,
                        error = %err,
                        "seller skipped during reliability sweep"
                    );
                }
            }
        }

        tracing::info!(
            event_name = "intelligence.seller.sweep_finished",
            sellers_updated = sweep.sellers_updated,
            sellers_failed = sweep.sellers_failed,
            "seller reliability sweep finished"
        );
        Ok(sweep)
    }
}
