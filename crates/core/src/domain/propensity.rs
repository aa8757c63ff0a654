use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

/// Category key used when a propensity score spans all categories.
pub const ALL_CATEGORIES: &str = "all";

/// Raw feature vector snapshot a propensity score was computed from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PropensityFeatures {
    pub days_since_purchase: Option<f64>,
    pub days_since_reviewed_match: Option<f64>,
    pub transactions_total: i64,
    pub transactions_30d: i64,
    pub transactions_90d: i64,
    pub avg_interval_days: Option<f64>,
    pub total_spend: f64,
    pub spend_30d: f64,
    pub spend_90d: f64,
    pub avg_order_value: f64,
    pub distinct_categories: i64,
    pub top_category_count: i64,
    pub matches_reviewed: i64,
    /// Conversion rate among reviewed matches, 0.0-1.0.
    pub conversion_rate: f64,
    pub matches_pending: i64,
    pub churn_risk_score: f64,
    /// Days past the current reorder prediction; 0 when none or not overdue.
    pub overdue_days: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PropensitySubScores {
    pub recency: f64,
    pub frequency: f64,
    pub monetary: f64,
    pub category_affinity: f64,
    pub engagement: f64,
}

/// Composite likelihood-to-transact score, cached with a TTL. Unique per
/// (buyer, category-or-"all").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PropensityScore {
    pub id: String,
    pub buyer_id: UserId,
    /// `None` means the cross-category ("all") score.
    pub category: Option<String>,
    pub overall: f64,
    pub sub_scores: PropensitySubScores,
    pub features: PropensityFeatures,
    pub computed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PropensityScore {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn category_key(&self) -> &str {
        self.category.as_deref().unwrap_or(ALL_CATEGORIES)
    }
}
