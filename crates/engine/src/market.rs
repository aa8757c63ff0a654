//! Category-level market signals. The matching engine treats this as an
//! external collaborator: any failure here degrades a single factor to its
//! neutral default instead of failing the match.

use async_trait::async_trait;
use dealsense_core::chrono::{Duration, Utc};
use dealsense_core::domain::product::Product;
use dealsense_core::score::clamp_score;
use dealsense_db::repositories::{SqlBidRepository, SqlProductRepository, SqlTransactionRepository};
use dealsense_db::DbPool;

use crate::{store_error, EngineResult};

#[async_trait]
pub trait MarketContext: Send + Sync {
    /// Average traded unit price in the category; `None` without trades.
    async fn average_price_for_category(&self, category: &str) -> EngineResult<Option<f64>>;

    /// How competitively the product is priced against the category market,
    /// 0-100; `None` when the market average is not computable.
    async fn price_score(&self, product: &Product) -> EngineResult<Option<f64>>;

    /// Demand pressure in the product's category, 0-100; `None` without any
    /// listed supply.
    async fn supply_demand_score(&self, product: &Product) -> EngineResult<Option<f64>>;
}

const DEMAND_WINDOW_DAYS: i64 = 30;

pub struct SqlMarketContext {
    transactions: SqlTransactionRepository,
    bids: SqlBidRepository,
    products: SqlProductRepository,
}

impl SqlMarketContext {
    pub fn new(pool: DbPool) -> Self {
        Self {
            transactions: SqlTransactionRepository::new(pool.clone()),
            bids: SqlBidRepository::new(pool.clone()),
            products: SqlProductRepository::new(pool),
        }
    }
}

#[async_trait]
impl MarketContext for SqlMarketContext {
    async fn average_price_for_category(&self, category: &str) -> EngineResult<Option<f64>> {
        self.transactions.avg_unit_price_for_category(category).await.map_err(store_error)
    }

    async fn price_score(&self, product: &Product) -> EngineResult<Option<f64>> {
        let Some(market_avg) = self.average_price_for_category(&product.category).await? else {
            return Ok(None);
        };
        if market_avg <= 0.0 {
            return Ok(None);
        }

        // Linear in the percentage gap: 15% under market reads 95, at
        // market 65, 15% over 35; clamped so an outlier price still maps
        // into the factor range.
        let pct_diff = (product.unit_price - market_avg) / market_avg * 100.0;
        Ok(Some(clamp_score(65.0 - 2.0 * pct_diff)))
    }

    async fn supply_demand_score(&self, product: &Product) -> EngineResult<Option<f64>> {
        let supply = self
            .products
            .count_active_in_category(&product.category)
            .await
            .map_err(store_error)?;
        if supply <= 0 {
            return Ok(None);
        }

        let since = Utc::now() - Duration::days(DEMAND_WINDOW_DAYS);
        let demand = self
            .bids
            .count_recent_in_category(&product.category, since)
            .await
            .map_err(store_error)?;

        // One recent bid per listing is a balanced market (50); more bids
        // than listings pushes toward 100, a quiet book toward 25.
        let ratio = demand as f64 / supply as f64;
        Ok(Some(clamp_score(25.0 + 25.0 * ratio)))
    }
}
