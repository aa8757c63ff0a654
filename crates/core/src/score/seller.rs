//! Seller reliability scoring: fill rate, quality, delivery timeliness and
//! pricing competitiveness over outcome-recorded transactions.

use crate::domain::transaction::Transaction;
use crate::score::clamp_score;
use crate::score::weights::SellerScoreWeights;

/// One category the seller has sold in, with the seller's own average
/// transaction value and the category-wide market average (when computable).
#[derive(Clone, Debug, PartialEq)]
pub struct CategorySales {
    pub category: String,
    pub seller_avg_value: f64,
    pub market_avg_value: Option<f64>,
    pub transaction_count: i64,
}

/// Σ delivered / Σ ordered over rows with both quantities present; 0 when
/// none qualify.
pub fn fill_rate(outcomes: &[Transaction]) -> f64 {
    let mut ordered = 0.0;
    let mut delivered = 0.0;
    for tx in outcomes.iter().filter(|tx| tx.has_fill_data()) {
        ordered += tx.quantity;
        if let Some(outcome) = &tx.outcome {
            delivered += outcome.delivered_quantity.unwrap_or(0.0);
        }
    }
    if ordered <= 0.0 {
        return 0.0;
    }
    clamp_score(delivered / ordered * 100.0)
}

/// Percentage of outcome-recorded rows marked quality-as-expected.
pub fn quality_score(outcomes: &[Transaction]) -> f64 {
    percentage_of(outcomes, |tx| {
        tx.outcome.as_ref().is_some_and(|o| o.quality_as_expected == Some(true))
    })
}

/// Percentage of outcome-recorded rows marked on-time.
pub fn delivery_score(outcomes: &[Transaction]) -> f64 {
    percentage_of(outcomes, |tx| tx.outcome.as_ref().is_some_and(|o| o.on_time == Some(true)))
}

fn percentage_of(outcomes: &[Transaction], hit: impl Fn(&Transaction) -> bool) -> f64 {
    let total = outcomes.len();
    if total == 0 {
        return 0.0;
    }
    let hits = outcomes.iter().filter(|tx| hit(tx)).count();
    clamp_score(hits as f64 / total as f64 * 100.0)
}

/// Pricing competitiveness per category: ≥15% below market scores 100,
/// ≥15% above scores 40, linear in between; blended across categories
/// weighted by transaction count. 50 when no category has a computable
/// market average.
pub fn pricing_score(categories: &[CategorySales]) -> f64 {
    let mut weighted = 0.0;
    let mut weight = 0.0;
    for sales in categories {
        let Some(market_avg) = sales.market_avg_value else {
            continue;
        };
        if market_avg <= 0.0 || sales.transaction_count <= 0 {
            continue;
        }
        let pct_diff = (sales.seller_avg_value - market_avg) / market_avg * 100.0;
        let score = if pct_diff <= -15.0 {
            100.0
        } else if pct_diff >= 15.0 {
            40.0
        } else {
            // Linear from (-15%, 100) to (+15%, 40).
            70.0 - 2.0 * pct_diff
        };
        weighted += score * sales.transaction_count as f64;
        weight += sales.transaction_count as f64;
    }
    if weight <= 0.0 {
        return 50.0;
    }
    clamp_score(weighted / weight)
}

pub fn overall(
    weights: &SellerScoreWeights,
    fill: f64,
    quality: f64,
    delivery: f64,
    pricing: f64,
) -> f64 {
    clamp_score(
        fill * weights.fill_rate
            + quality * weights.quality
            + delivery * weights.delivery
            + pricing * weights.pricing,
    )
}
