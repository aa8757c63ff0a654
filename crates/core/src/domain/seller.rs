use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

/// Seller reliability: four weighted sub-scores plus the blend. A seller
/// with `transactions_scored == 0` has no data; the zero sub-scores are
/// then a sentinel, not a measurement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SellerScore {
    pub seller_id: UserId,
    pub fill_rate: f64,
    pub quality: f64,
    pub delivery: f64,
    pub pricing: f64,
    pub overall: f64,
    pub transactions_scored: i64,
    pub computed_at: DateTime<Utc>,
}

impl SellerScore {
    pub fn has_data(&self) -> bool {
        self.transactions_scored > 0
    }
}
