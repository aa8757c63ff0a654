//! Matching engine: scores (buyer, product) pairs across ten factors and
//! runs the per-product and full-catalog batches.
//!
//! Factor data access is deliberately forgiving: a failed lookup degrades
//! that one factor to NoSignal and the pair still scores. Only unknown
//! entities and write failures surface to the caller.

use std::sync::Arc;
use std::time::Duration;

use dealsense_core::chrono::Utc;
use dealsense_core::domain::matching::{Match, MatchId, MatchStatus};
use dealsense_core::domain::product::{Product, ProductId};
use dealsense_core::domain::user::{User, UserId};
use dealsense_core::errors::{ApplicationError, DomainError};
use dealsense_core::score::insights::generate_insights;
use dealsense_core::score::matching as matching_math;
use dealsense_core::score::matching::{CategoryActivity, MatchBreakdown};
use dealsense_core::score::weights::MatchWeights;
use dealsense_core::score::FactorScore;
use dealsense_db::repositories::{
    SqlActivityRepository, SqlBidRepository, SqlMatchRepository, SqlPredictionRepository,
    SqlProductRepository, SqlSellerScoreRepository, SqlTransactionRepository, SqlUserRepository,
};
use dealsense_db::DbPool;

use crate::market::MarketContext;
use crate::notify::Notifier;
use crate::propensity::PropensityService;
use crate::{new_id, store_error, EngineResult};

#[derive(Clone, Copy, Debug)]
pub struct MatchingOptions {
    pub match_threshold: f64,
    pub notify_threshold: f64,
    pub batch_concurrency: usize,
    pub item_timeout_secs: u64,
}

impl Default for MatchingOptions {
    fn default() -> Self {
        Self {
            match_threshold: dealsense_core::score::MATCH_THRESHOLD,
            notify_threshold: dealsense_core::score::NOTIFY_THRESHOLD,
            batch_concurrency: 8,
            item_timeout_secs: 30,
        }
    }
}

/// Result of scoring one pair; what `score_match` returns and what the
/// batch persists for rows above the threshold.
#[derive(Clone, Debug, serde::Serialize)]
pub struct ScoredMatchResult {
    pub score: f64,
    pub breakdown: MatchBreakdown,
    pub insights: Vec<dealsense_core::domain::matching::Insight>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct MatchSweep {
    pub products_processed: usize,
    pub products_failed: usize,
    pub matches_created: usize,
}

pub struct MatchingService {
    users: SqlUserRepository,
    products: SqlProductRepository,
    transactions: SqlTransactionRepository,
    bids: SqlBidRepository,
    activity: SqlActivityRepository,
    matches: SqlMatchRepository,
    predictions: SqlPredictionRepository,
    seller_scores: SqlSellerScoreRepository,
    market: Arc<dyn MarketContext>,
    propensity: Arc<PropensityService>,
    notifier: Arc<dyn Notifier>,
    weights: MatchWeights,
    options: MatchingOptions,
}

impl MatchingService {
    pub fn new(
        pool: DbPool,
        weights: MatchWeights,
        market: Arc<dyn MarketContext>,
        propensity: Arc<PropensityService>,
        notifier: Arc<dyn Notifier>,
        options: MatchingOptions,
    ) -> Self {
        Self {
            users: SqlUserRepository::new(pool.clone()),
            products: SqlProductRepository::new(pool.clone()),
            transactions: SqlTransactionRepository::new(pool.clone()),
            bids: SqlBidRepository::new(pool.clone()),
            activity: SqlActivityRepository::new(pool.clone()),
            matches: SqlMatchRepository::new(pool.clone()),
            predictions: SqlPredictionRepository::new(pool.clone()),
            seller_scores: SqlSellerScoreRepository::new(pool),
            market,
            propensity,
            notifier,
            weights,
            options,
        }
    }

    /// Pure read: scores the pair against current data without persisting
    /// anything.
    pub async fn score_match(
        &self,
        buyer_id: &UserId,
        product_id: &ProductId,
    ) -> EngineResult<ScoredMatchResult> {
        let buyer = self
            .users
            .find_by_id(buyer_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| unknown_entity("buyer", &buyer_id.0))?;
        let product = self
            .products
            .find_by_id(product_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| unknown_entity("product", &product_id.0))?;

        Ok(self.score_pair(&buyer, &product).await)
    }

    /// Scores every approved buyer (except the product's own seller) and
    /// upserts the pairs at or above the match threshold. The product's
    /// denormalized match count becomes this run's upsert count.
    pub async fn generate_matches_for_product(
        self: &Arc<Self>,
        product_id: &ProductId,
    ) -> EngineResult<usize> {
        let product = self
            .products
            .find_by_id(product_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| unknown_entity("product", &product_id.0))?;

        let buyers: Vec<User> = self
            .users
            .list_approved_buyers()
            .await
            .map_err(store_error)?
            .into_iter()
            .filter(|buyer| buyer.id != product.seller_id)
            .collect();

        // Independent pure computations fan out under a bounded pool; a
        // slow or panicking item is skipped, never the batch.
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.options.batch_concurrency.max(1)));
        let item_timeout = Duration::from_secs(self.options.item_timeout_secs.max(1));

        let mut handles = Vec::with_capacity(buyers.len());
        for buyer in buyers {
            let service = Arc::clone(self);
            let product = product.clone();
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                match tokio::time::timeout(item_timeout, service.score_pair(&buyer, &product)).await
                {
                    Ok(scored) => Some((buyer, scored)),
                    Err(_) => {
                        tracing::warn!(
                            event_name = "intelligence.matching.item_timeout",
                            buyer_id = %buyer.id,
                            product_id = %product.id,
                            "buyer scoring timed out and was skipped"
                        );
                        None
                    }
                }
            }));
        }

        let now = Utc::now();
        let mut upserted = 0usize;
        for handle in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::warn!(
                        event_name = "intelligence.matching.item_panicked",
                        product_id = %product.id,
                        error = %err,
                        "buyer scoring task failed and was skipped"
                    );
                    continue;
                }
            };
            let Some((buyer, scored)) = outcome else { continue };
            if scored.score < self.options.match_threshold {
                continue;
            }

            let row = Match {
                id: MatchId(new_id("match")),
                buyer_id: buyer.id.clone(),
                product_id: product.id.clone(),
                score: scored.score,
                breakdown: scored.breakdown,
                insights: scored.insights.clone(),
                status: MatchStatus::Pending,
                weights_version: self.weights.version.clone(),
                reviewed_at: None,
                created_at: now,
                updated_at: now,
            };
            if let Err(err) = self.matches.upsert_scored(&row).await {
                tracing::warn!(
                    event_name = "intelligence.matching.upsert_failed",
                    buyer_id = %buyer.id,
                    product_id = %product.id,
                    error = %err,
                    "match upsert failed and was skipped"
                );
                continue;
            }
            upserted += 1;

            if scored.score >= self.options.notify_threshold {
                self.notifier
                    .notify(
                        &buyer.id,
                        "match.high_score",
                        "New match worth a look",
                        &format!("{} scores {:.0} for you", product.name, scored.score),
                        serde_json::json!({
                            "product_id": product.id.0,
                            "category": product.category,
                            "score": scored.score,
                        }),
                    )
                    .await;
            }
        }

        self.products.set_match_count(&product.id, upserted as i64).await.map_err(store_error)?;

        tracing::info!(
            event_name = "intelligence.matching.product_scored",
            product_id = %product.id,
            matches_created = upserted,
            "product matched against approved buyers"
        );
        Ok(upserted)
    }

    /// Batch entry point for scheduled recomputation: every active and
    /// visible product, each against every approved buyer. One failing
    /// product is logged and skipped.
    pub async fn regenerate_all_matches(self: &Arc<Self>) -> EngineResult<MatchSweep> {
        let products = self.products.list_matchable().await.map_err(store_error)?;

        let mut sweep = MatchSweep::default();
        for product in products {
            match self.generate_matches_for_product(&product.id).await {
                Ok(created) => {
                    sweep.products_processed += 1;
                    sweep.matches_created += created;
                }
                Err(err) => {
                    sweep.products_failed += 1;
                    tracing::warn!(
                        event_name = "intelligence.matching.product_failed",
                        product_id = %product.id,
                        error = %err,
                        "product skipped during match regeneration"
                    );
                }
            }
        }

        tracing::info!(
            event_name = "intelligence.matching.sweep_finished",
            products_processed = sweep.products_processed,
            products_failed = sweep.products_failed,
            matches_created = sweep.matches_created,
            "match regeneration finished"
        );
        Ok(sweep)
    }

    /// Buyer opened the match.
    pub async fn record_view(
        &self,
        buyer_id: &UserId,
        product_id: &ProductId,
    ) -> EngineResult<Match> {
        self.transition(buyer_id, product_id, MatchStatus::Viewed).await
    }

    /// Buyer bid on the matched product.
    pub async fn record_conversion(
        &self,
        buyer_id: &UserId,
        product_id: &ProductId,
    ) -> EngineResult<Match> {
        self.transition(buyer_id, product_id, MatchStatus::Converted).await
    }

    /// Buyer dismissed the match.
    pub async fn record_rejection(
        &self,
        buyer_id: &UserId,
        product_id: &ProductId,
    ) -> EngineResult<Match> {
        self.transition(buyer_id, product_id, MatchStatus::Rejected).await
    }

    async fn transition(
        &self,
        buyer_id: &UserId,
        product_id: &ProductId,
        next: MatchStatus,
    ) -> EngineResult<Match> {
        let mut found = self
            .matches
            .find_by_pair(buyer_id, product_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| unknown_entity("match", &format!("{buyer_id}/{product_id}")))?;

        found.status = found.status.transition_to(next).map_err(ApplicationError::Domain)?;
        found.reviewed_at = found.reviewed_at.or_else(|| Some(Utc::now()));
        self.matches
            .set_status(&found.id, found.status, found.reviewed_at)
            .await
            .map_err(store_error)?;
        Ok(found)
    }

    async fn score_pair(&self, buyer: &User, product: &Product) -> ScoredMatchResult {
        let category = product.category.as_str();

        let category_affinity = match self.category_activity(&buyer.id, category).await {
            Ok(activity) => matching_math::category_affinity(&activity),
            Err(err) => self.degraded("category_affinity", buyer, product, err),
        };

        let price_fit = match self.price_fit_factor(buyer, product).await {
            Ok(factor) => factor,
            Err(err) => self.degraded("price_fit", buyer, product, err),
        };

        let location = match self.users.find_by_id(&product.seller_id).await {
            Ok(seller) => matching_math::location_score(
                buyer.location.as_deref(),
                seller.as_ref().and_then(|seller| seller.location.as_deref()),
            ),
            Err(err) => self.degraded("location", buyer, product, store_error(err)),
        };

        let relationship_history =
            match self.transactions.completed_count_between(&buyer.id, &product.seller_id).await {
                Ok(count) => matching_math::relationship_history(count),
                Err(err) => self.degraded("relationship_history", buyer, product, store_error(err)),
            };

        let reorder_timing = match self.reorder_timing_factor(&buyer.id, category).await {
            Ok(factor) => factor,
            Err(err) => self.degraded("reorder_timing", buyer, product, err),
        };

        let quantity_fit = match self.transactions.avg_order_quantity(&buyer.id, category).await {
            Ok(avg) => matching_math::quantity_fit(product.available_quantity, avg),
            Err(err) => self.degraded("quantity_fit", buyer, product, store_error(err)),
        };

        let seller_reliability = match self.seller_scores.find(&product.seller_id).await {
            Ok(Some(score)) if score.has_data() => FactorScore::measured(score.overall),
            Ok(_) => FactorScore::NoSignal,
            Err(err) => self.degraded("seller_reliability", buyer, product, store_error(err)),
        };

        let price_vs_market = match self.market.price_score(product).await {
            Ok(Some(score)) => FactorScore::measured(score),
            Ok(None) => FactorScore::NoSignal,
            Err(err) => self.degraded("price_vs_market", buyer, product, err),
        };

        let supply_demand = match self.market.supply_demand_score(product).await {
            Ok(Some(score)) => FactorScore::measured(score),
            Ok(None) => FactorScore::NoSignal,
            Err(err) => self.degraded("supply_demand", buyer, product, err),
        };

        let buyer_propensity = match self.propensity.get_propensity(&buyer.id, Some(category)).await
        {
            Ok(score) => FactorScore::measured(score.overall),
            Err(err) => self.degraded("buyer_propensity", buyer, product, err),
        };

        let breakdown = MatchBreakdown {
            category_affinity,
            price_fit,
            location,
            relationship_history,
            reorder_timing,
            quantity_fit,
            seller_reliability,
            price_vs_market,
            supply_demand,
            buyer_propensity,
        };

        ScoredMatchResult {
            score: matching_math::combine(&self.weights, &breakdown),
            insights: generate_insights(&breakdown, category),
            breakdown,
        }
    }

    async fn category_activity(
        &self,
        buyer_id: &UserId,
        category: &str,
    ) -> EngineResult<CategoryActivity> {
        Ok(CategoryActivity {
            transactions: self
                .transactions
                .count_for_buyer_category(buyer_id, category)
                .await
                .map_err(store_error)?,
            bids: self
                .bids
                .count_for_buyer_category(buyer_id, category)
                .await
                .map_err(store_error)?,
            shortlists: self
                .activity
                .shortlist_count(buyer_id, category)
                .await
                .map_err(store_error)?,
            views: self.activity.view_count(buyer_id, category).await.map_err(store_error)?,
        })
    }

    async fn price_fit_factor(&self, buyer: &User, product: &Product) -> EngineResult<FactorScore> {
        let buyer_avg = self
            .transactions
            .avg_unit_price(&buyer.id, &product.category)
            .await
            .map_err(store_error)?;
        let ratios = self.bids.bid_ask_ratios(&buyer.id).await.map_err(store_error)?;
        let elasticity = matching_math::bid_elasticity(&ratios);

        // Market average is only a nudge input here; losing it quietly
        // drops the elasticity adjustment rather than the whole factor.
        let market_avg = match self.market.average_price_for_category(&product.category).await {
            Ok(avg) => avg,
            Err(_) => None,
        };

        Ok(matching_math::price_fit(
            product.unit_price,
            buyer_avg,
            elasticity.as_ref(),
            market_avg,
        ))
    }

    async fn reorder_timing_factor(
        &self,
        buyer_id: &UserId,
        category: &str,
    ) -> EngineResult<FactorScore> {
        let now = Utc::now();
        let days_until = self
            .predictions
            .find(buyer_id, category)
            .await
            .map_err(store_error)?
            .map(|prediction| prediction.days_until(now));

        let days_since_last = self
            .transactions
            .last_transacted_at(buyer_id, Some(category))
            .await
            .map_err(store_error)?
            .map(|last| (now - last).num_seconds() as f64 / 86_400.0);

        Ok(matching_math::reorder_timing(days_until, days_since_last))
    }

    fn degraded(
        &self,
        factor: &'static str,
        buyer: &User,
        product: &Product,
        err: ApplicationError,
    ) -> FactorScore {
        tracing::warn!(
            event_name = "intelligence.matching.factor_degraded",
            factor,
            buyer_id = %buyer.id,
            product_id = %product.id,
            error = %err,
            "factor fell back to its neutral default"
        );
        FactorScore::NoSignal
    }
}

fn unknown_entity(kind: &str, id: &str) -> ApplicationError {
    ApplicationError::Domain(DomainError::InvariantViolation(format!("unknown {kind}: {id}")))
}
