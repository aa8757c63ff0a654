pub mod bid;
pub mod churn;
pub mod matching;
pub mod prediction;
pub mod product;
pub mod propensity;
pub mod seller;
pub mod transaction;
pub mod user;
