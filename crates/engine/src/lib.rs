//! Orchestration layer of the deal intelligence engine: joins the sqlx
//! repositories to the pure scorers in `dealsense-core`, runs the batch
//! sweeps, and owns the collaborator seams (market context, notifier).

pub mod churn;
pub mod market;
pub mod matching;
pub mod notify;
pub mod propensity;
pub mod reorder;
pub mod seller;

use std::sync::Arc;

use dealsense_core::config::AppConfig;
use dealsense_core::errors::ApplicationError;
use dealsense_db::{DbPool, RepositoryError};

pub use churn::{ChurnService, ChurnSweep};
pub use market::{MarketContext, SqlMarketContext};
pub use matching::{MatchSweep, MatchingOptions, MatchingService, ScoredMatchResult};
pub use notify::{Notifier, NullNotifier, RecordingNotifier, WebhookNotifier};
pub use propensity::PropensityService;
pub use reorder::{PredictionSweep, ReorderService};
pub use seller::{SellerScoreService, SellerSweep};

pub type EngineResult<T> = Result<T, ApplicationError>;

pub(crate) fn store_error(err: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(err.to_string())
}

pub(crate) fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}

/// Every intelligence service wired against one pool, ready for the server
/// and CLI to drive.
pub struct Intelligence {
    pub matching: Arc<MatchingService>,
    pub propensity: Arc<PropensityService>,
    pub reorder: ReorderService,
    pub churn: ChurnService,
    pub sellers: SellerScoreService,
}

impl Intelligence {
    pub fn new(pool: DbPool, config: &AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        let market: Arc<dyn MarketContext> = Arc::new(SqlMarketContext::new(pool.clone()));
        let propensity = Arc::new(PropensityService::new(
            pool.clone(),
            Default::default(),
            config.intelligence.propensity_ttl_hours,
        ));

        Self {
            matching: Arc::new(MatchingService::new(
                pool.clone(),
                Default::default(),
                Arc::clone(&market),
                Arc::clone(&propensity),
                Arc::clone(&notifier),
                matching::MatchingOptions {
                    match_threshold: config.intelligence.match_threshold,
                    notify_threshold: config.intelligence.notify_threshold,
                    batch_concurrency: config.intelligence.batch_concurrency,
                    item_timeout_secs: config.intelligence.item_timeout_secs,
                },
            )),
            propensity,
            reorder: ReorderService::new(pool.clone(), Arc::clone(&notifier)),
            churn: ChurnService::new(pool.clone()),
            sellers: SellerScoreService::new(pool, Default::default()),
        }
    }
}
