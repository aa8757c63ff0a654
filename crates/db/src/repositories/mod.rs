use dealsense_core::chrono::{DateTime, Utc};
use thiserror::Error;

#[cfg(test)]
pub(crate) mod test_support;

pub mod activity;
pub mod bid;
pub mod churn;
pub mod matching;
pub mod prediction;
pub mod product;
pub mod propensity;
pub mod seller_score;
pub mod transaction;
pub mod user;

pub use activity::SqlActivityRepository;
pub use bid::SqlBidRepository;
pub use churn::SqlChurnRepository;
pub use matching::SqlMatchRepository;
pub use prediction::SqlPredictionRepository;
pub use product::SqlProductRepository;
pub use propensity::SqlPropensityRepository;
pub use seller_score::SqlSellerScoreRepository;
pub use transaction::SqlTransactionRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

pub(crate) fn parse_rfc3339(field: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc)).map_err(|err| {
        RepositoryError::Decode(format!("invalid {} timestamp '{}': {}", field, value, err))
    })
}

pub(crate) fn parse_optional_rfc3339(
    field: &str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|ts| parse_rfc3339(field, ts)).transpose()
}
