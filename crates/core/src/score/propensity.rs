//! RFM-style propensity sub-scores and their composite.

use crate::domain::propensity::{PropensityFeatures, PropensitySubScores};
use crate::score::clamp_score;
use crate::score::weights::PropensityWeights;

/// Linear decay over 180 days since the last purchase; never purchased
/// scores 0.
pub fn recency_score(features: &PropensityFeatures) -> f64 {
    match features.days_since_purchase {
        Some(days) => clamp_score(100.0 - days / 180.0 * 100.0),
        None => 0.0,
    }
}

/// min(100, n×10), +20 for a purchase inside 30 days, +10 for more than two
/// inside 90 days, capped at 100.
pub fn frequency_score(features: &PropensityFeatures) -> f64 {
    let mut score = (features.transactions_total as f64 * 10.0).min(100.0);
    if features.transactions_30d > 0 {
        score += 20.0;
    }
    if features.transactions_90d > 2 {
        score += 10.0;
    }
    score.min(100.0)
}

/// min(100, AOV/1000×50 + min(50, total/10000×50)).
pub fn monetary_score(features: &PropensityFeatures) -> f64 {
    let aov_part = features.avg_order_value / 1_000.0 * 50.0;
    let spend_part = (features.total_spend / 10_000.0 * 50.0).min(50.0);
    (aov_part + spend_part).min(100.0).max(0.0)
}

/// min(100, top_category×20 + distinct_categories×10).
pub fn affinity_score(features: &PropensityFeatures) -> f64 {
    (features.top_category_count as f64 * 20.0 + features.distinct_categories as f64 * 10.0)
        .min(100.0)
}

/// min(100, conversion×50 + 20 if anything reviewed + 15 if anything
/// pending).
pub fn engagement_score(features: &PropensityFeatures) -> f64 {
    let mut score = features.conversion_rate * 50.0;
    if features.matches_reviewed > 0 {
        score += 20.0;
    }
    if features.matches_pending > 0 {
        score += 15.0;
    }
    score.min(100.0)
}

/// Weighted blend, scaled down by active churn risk, boosted by up to +20
/// proportional to overdue days, clamped to [0,100].
pub fn overall(
    weights: &PropensityWeights,
    subs: &PropensitySubScores,
    churn_risk_score: f64,
    overdue_days: f64,
) -> f64 {
    let blended = subs.recency * weights.recency
        + subs.frequency * weights.frequency
        + subs.monetary * weights.monetary
        + subs.category_affinity * weights.category_affinity
        + subs.engagement * weights.engagement;

    let churn_dampened = blended * (1.0 - 0.3 * (clamp_score(churn_risk_score) / 100.0));
    let overdue_boost = (overdue_days.max(0.0) * 2.0).min(20.0);

    clamp_score(churn_dampened + overdue_boost)
}

/// Convenience: every sub-score plus the composite from one feature vector.
pub fn score_features(
    weights: &PropensityWeights,
    features: &PropensityFeatures,
) -> (PropensitySubScores, f64) {
    let subs = PropensitySubScores {
        recency: recency_score(features),
        frequency: frequency_score(features),
        monetary: monetary_score(features),
        category_affinity: affinity_score(features),
        engagement: engagement_score(features),
    };
    let overall = overall(weights, &subs, features.churn_risk_score, features.overdue_days);
    (subs, overall)
}
