//! The ten match factors and their weighted combination.
//!
//! Every factor is a pure function of already fetched inputs and returns a
//! [`FactorScore`] so aggregation can tell a measured mid-range value from
//! an insufficient-data fallback.

use serde::{Deserialize, Serialize};

use crate::score::weights::MatchWeights;
use crate::score::{clamp_score, FactorScore, MIN_ELASTICITY_SAMPLE};

/// A buyer's observed activity inside one category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CategoryActivity {
    pub transactions: i64,
    pub bids: i64,
    pub shortlists: i64,
    pub views: i64,
}

/// How aggressively a buyer historically bids relative to ask.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BidElasticity {
    pub mean_ratio: f64,
    pub sample: usize,
}

/// Estimates elasticity from historical bid/ask ratios; requires at least
/// [`MIN_ELASTICITY_SAMPLE`] observations.
pub fn bid_elasticity(ratios: &[f64]) -> Option<BidElasticity> {
    if ratios.len() < MIN_ELASTICITY_SAMPLE {
        return None;
    }
    let mean = ratios.iter().sum::<f64>() / ratios.len() as f64;
    Some(BidElasticity { mean_ratio: mean, sample: ratios.len() })
}

/// Tiered by activity depth: transactions count most, mere views least.
/// Zero activity is a real lowest tier, never a neutral fallback.
pub fn category_affinity(activity: &CategoryActivity) -> FactorScore {
    let score = if activity.transactions >= 5 {
        100.0
    } else if activity.transactions >= 3 {
        90.0
    } else if activity.transactions >= 1 {
        80.0
    } else if activity.bids >= 3 {
        65.0
    } else if activity.bids >= 1 {
        55.0
    } else if activity.shortlists >= 1 {
        40.0
    } else if activity.views >= 3 {
        30.0
    } else if activity.views >= 1 {
        25.0
    } else {
        10.0
    };
    FactorScore::measured(score)
}

/// Product price against the buyer's historical category average, tiered by
/// percentage difference, then nudged by bid elasticity.
pub fn price_fit(
    product_price: f64,
    buyer_avg_price: Option<f64>,
    elasticity: Option<&BidElasticity>,
    market_avg_price: Option<f64>,
) -> FactorScore {
    let Some(buyer_avg) = buyer_avg_price.filter(|avg| *avg > 0.0) else {
        return FactorScore::NoSignal;
    };

    let pct_diff = (product_price - buyer_avg) / buyer_avg * 100.0;
    let mut score = if pct_diff <= -15.0 {
        100.0
    } else if pct_diff <= -5.0 {
        85.0
    } else if pct_diff <= 5.0 {
        70.0
    } else if pct_diff <= 15.0 {
        50.0
    } else if pct_diff <= 30.0 {
        35.0
    } else {
        20.0
    };

    if let (Some(elasticity), Some(market_avg)) = (elasticity, market_avg_price) {
        if market_avg > 0.0 {
            let at_or_above_market = product_price >= market_avg;
            if elasticity.mean_ratio <= 0.85 && at_or_above_market {
                // Aggressive bidders rarely pay at/above market.
                score -= if elasticity.mean_ratio <= 0.80 { 10.0 } else { 5.0 };
            } else if elasticity.mean_ratio >= 0.97 && !at_or_above_market {
                // Generous bidders convert well on discounted products.
                score += if elasticity.mean_ratio >= 1.0 { 10.0 } else { 5.0 };
            }
        }
    }

    FactorScore::measured(score)
}

/// String-overlap heuristic between buyer and seller geographic fields.
pub fn location_score(buyer_location: Option<&str>, seller_location: Option<&str>) -> FactorScore {
    let (Some(buyer), Some(seller)) = (buyer_location, seller_location) else {
        return FactorScore::NoSignal;
    };
    let buyer = buyer.trim().to_ascii_lowercase();
    let seller = seller.trim().to_ascii_lowercase();
    if buyer.is_empty() || seller.is_empty() {
        return FactorScore::NoSignal;
    }
    if buyer == seller {
        return FactorScore::measured(100.0);
    }

    let buyer_tokens: Vec<&str> = tokens(&buyer);
    let seller_tokens: Vec<&str> = tokens(&seller);
    let shared = buyer_tokens.iter().filter(|token| seller_tokens.contains(token)).count();
    let smaller = buyer_tokens.len().min(seller_tokens.len()).max(1);

    let score = if shared * 2 >= smaller && shared > 0 {
        80.0
    } else if shared > 0 {
        60.0
    } else {
        40.0
    };
    FactorScore::measured(score)
}

fn tokens(value: &str) -> Vec<&str> {
    value.split([' ', ',', '/', '-']).filter(|token| !token.is_empty()).collect()
}

/// Tiered by completed transactions between this buyer and seller.
pub fn relationship_history(completed_between: i64) -> FactorScore {
    let score = if completed_between >= 5 {
        100.0
    } else if completed_between >= 3 {
        90.0
    } else if completed_between >= 1 {
        75.0
    } else {
        40.0
    };
    FactorScore::measured(score)
}

/// From the stored prediction when present (overdue is the hottest signal),
/// falling back to raw days since the buyer's last category purchase.
pub fn reorder_timing(
    days_until_predicted: Option<f64>,
    days_since_last: Option<f64>,
) -> FactorScore {
    if let Some(days_until) = days_until_predicted {
        let score = if days_until < 0.0 {
            100.0
        } else if days_until <= 7.0 {
            90.0
        } else if days_until <= 14.0 {
            75.0
        } else if days_until <= 30.0 {
            55.0
        } else {
            25.0
        };
        return FactorScore::measured(score);
    }

    match days_since_last {
        Some(days) => {
            let score = if days >= 60.0 {
                80.0
            } else if days >= 30.0 {
                65.0
            } else if days >= 14.0 {
                50.0
            } else {
                35.0
            };
            FactorScore::measured(score)
        }
        None => FactorScore::NoSignal,
    }
}

/// Available quantity relative to the buyer's average order size, banded
/// around 1.0.
pub fn quantity_fit(available_quantity: f64, avg_order_quantity: Option<f64>) -> FactorScore {
    let Some(avg) = avg_order_quantity.filter(|avg| *avg > 0.0) else {
        return FactorScore::NoSignal;
    };
    let ratio = available_quantity / avg;
    let score = if ratio >= 5.0 {
        70.0
    } else if ratio >= 2.0 {
        90.0
    } else if ratio >= 1.0 {
        100.0
    } else if ratio >= 0.75 {
        80.0
    } else if ratio >= 0.5 {
        60.0
    } else {
        30.0
    };
    FactorScore::measured(score)
}

/// Per-factor results for one (buyer, product) pairing; persisted verbatim
/// on the match row.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchBreakdown {
    pub category_affinity: FactorScore,
    pub price_fit: FactorScore,
    pub location: FactorScore,
    pub relationship_history: FactorScore,
    pub reorder_timing: FactorScore,
    pub quantity_fit: FactorScore,
    pub seller_reliability: FactorScore,
    pub price_vs_market: FactorScore,
    pub supply_demand: FactorScore,
    pub buyer_propensity: FactorScore,
}

impl MatchBreakdown {
    pub fn factors(&self) -> [(&'static str, FactorScore); 10] {
        [
            ("category_affinity", self.category_affinity),
            ("price_fit", self.price_fit),
            ("location", self.location),
            ("relationship_history", self.relationship_history),
            ("reorder_timing", self.reorder_timing),
            ("quantity_fit", self.quantity_fit),
            ("seller_reliability", self.seller_reliability),
            ("price_vs_market", self.price_vs_market),
            ("supply_demand", self.supply_demand),
            ("buyer_propensity", self.buyer_propensity),
        ]
    }
}

/// Weighted average over the fixed table: Σ wᵢ·sᵢ / Σ wᵢ. A NoSignal factor
/// contributes the neutral midpoint under its full weight; the table is
/// never renormalized over present-vs-absent factors.
pub fn combine(weights: &MatchWeights, breakdown: &MatchBreakdown) -> f64 {
    let weighted = breakdown.category_affinity.value() * weights.category_affinity
        + breakdown.price_fit.value() * weights.price_fit
        + breakdown.location.value() * weights.location
        + breakdown.relationship_history.value() * weights.relationship_history
        + breakdown.reorder_timing.value() * weights.reorder_timing
        + breakdown.quantity_fit.value() * weights.quantity_fit
        + breakdown.seller_reliability.value() * weights.seller_reliability
        + breakdown.price_vs_market.value() * weights.price_vs_market
        + breakdown.supply_demand.value() * weights.supply_demand
        + breakdown.buyer_propensity.value() * weights.buyer_propensity;

    clamp_score(weighted / weights.total())
}
