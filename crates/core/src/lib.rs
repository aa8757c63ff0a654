pub mod config;
pub mod domain;
pub mod errors;
pub mod score;

// Re-exported so downstream crates share one chrono version.
pub use chrono;

pub use domain::bid::{Bid, BidId, BidStatus};
pub use domain::churn::{ChurnRiskLevel, ChurnSignal, ChurnStats};
pub use domain::matching::{Insight, InsightTag, Match, MatchId, MatchStatus};
pub use domain::prediction::ReorderPrediction;
pub use domain::product::{Product, ProductId};
pub use domain::propensity::{PropensityFeatures, PropensityScore, PropensitySubScores};
pub use domain::seller::SellerScore;
pub use domain::transaction::{Transaction, TransactionId, TransactionOutcome};
pub use domain::user::{User, UserId, UserRole};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use score::matching::MatchBreakdown;
pub use score::weights::{MatchWeights, PropensityWeights, SellerScoreWeights};
pub use score::FactorScore;
