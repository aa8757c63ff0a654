use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::transaction::TransactionId;
use crate::domain::user::UserId;

/// Projected next purchase for a buyer-category, derived from historical
/// interval regularity. Unique per (buyer, category).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReorderPrediction {
    pub id: String,
    pub buyer_id: UserId,
    pub category: String,
    pub predicted_at: DateTime<Utc>,
    /// 0-100; consistency dominates, sample size adds a capped bonus.
    pub confidence: f64,
    pub sample_size: i64,
    pub avg_interval_days: f64,
    pub last_transaction_id: TransactionId,
    /// Set once the due-soon notification has gone out; cleared when the
    /// predicted date moves.
    pub notified_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ReorderPrediction {
    pub fn days_until(&self, now: DateTime<Utc>) -> f64 {
        (self.predicted_at - now).num_seconds() as f64 / 86_400.0
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.days_until(now) < 0.0
    }
}
