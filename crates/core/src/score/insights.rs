//! Deterministic insight generation from a factor breakdown.
//!
//! Each rule inspects one sub-score against a fixed threshold and emits a
//! tagged human-readable string. Insights annotate a match; they are never
//! inputs to the score.

use crate::domain::matching::{Insight, InsightTag};
use crate::score::matching::MatchBreakdown;
use crate::score::FactorScore;

pub fn generate_insights(breakdown: &MatchBreakdown, category: &str) -> Vec<Insight> {
    let mut insights = Vec::new();

    if measured_at_least(breakdown.category_affinity, 80.0) {
        insights.push(insight(
            InsightTag::Positive,
            format!("Strong purchase history in {category}"),
        ));
    }

    if measured_at_least(breakdown.price_fit, 100.0) {
        insights.push(insight(
            InsightTag::Positive,
            "Priced well below this buyer's usual spend".to_owned(),
        ));
    }

    // Only an overdue prediction reaches 100 on this factor.
    if measured_at_least(breakdown.reorder_timing, 100.0) {
        insights.push(insight(
            InsightTag::Urgent,
            format!("Buyer is overdue for a reorder in {category}"),
        ));
    } else if measured_at_least(breakdown.reorder_timing, 90.0) {
        insights.push(insight(
            InsightTag::Positive,
            "Reorder window is approaching".to_owned(),
        ));
    }

    if measured_at_least(breakdown.relationship_history, 75.0) {
        insights.push(insight(
            InsightTag::Positive,
            "Buyer has purchased from this seller before".to_owned(),
        ));
    }

    match breakdown.seller_reliability {
        FactorScore::Measured(score) if score >= 85.0 => {
            insights.push(insight(InsightTag::Positive, "Highly reliable seller".to_owned()));
        }
        FactorScore::Measured(score) if score < 40.0 => {
            insights.push(insight(
                InsightTag::Warning,
                "Seller reliability is below average".to_owned(),
            ));
        }
        _ => {}
    }

    if measured_at_least(breakdown.buyer_propensity, 75.0) {
        insights.push(insight(
            InsightTag::Positive,
            "Buyer is highly likely to transact right now".to_owned(),
        ));
    }

    if measured_at_least(breakdown.supply_demand, 80.0) {
        insights.push(insight(
            InsightTag::Neutral,
            format!("Demand currently outpaces supply in {category}"),
        ));
    }

    if let FactorScore::Measured(score) = breakdown.price_vs_market {
        if score <= 30.0 {
            insights.push(insight(
                InsightTag::Warning,
                "Priced above the category market average".to_owned(),
            ));
        }
    }

    insights
}

fn measured_at_least(factor: FactorScore, threshold: f64) -> bool {
    matches!(factor, FactorScore::Measured(score) if score >= threshold)
}

fn insight(tag: InsightTag, message: String) -> Insight {
    Insight { tag, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::matching::MatchBreakdown;
    use crate::score::FactorScore;

    fn quiet_breakdown() -> MatchBreakdown {
        MatchBreakdown {
            category_affinity: FactorScore::measured(55.0),
            price_fit: FactorScore::measured(70.0),
            location: FactorScore::NoSignal,
            relationship_history: FactorScore::measured(40.0),
            reorder_timing: FactorScore::measured(55.0),
            quantity_fit: FactorScore::NoSignal,
            seller_reliability: FactorScore::measured(60.0),
            price_vs_market: FactorScore::measured(60.0),
            supply_demand: FactorScore::measured(50.0),
            buyer_propensity: FactorScore::measured(50.0),
        }
    }

    #[test]
    fn quiet_breakdown_generates_no_insights() {
        assert!(generate_insights(&quiet_breakdown(), "Flower").is_empty());
    }

    #[test]
    fn overdue_reorder_emits_an_urgent_insight() {
        let mut breakdown = quiet_breakdown();
        breakdown.reorder_timing = FactorScore::measured(100.0);

        let insights = generate_insights(&breakdown, "Flower");
        let urgent = insights
            .iter()
            .find(|i| i.tag == InsightTag::Urgent)
            .expect("urgent insight");
        assert!(urgent.message.contains("overdue"));
        assert!(urgent.message.contains("Flower"));
    }

    #[test]
    fn no_signal_reliability_never_warns() {
        let mut breakdown = quiet_breakdown();
        breakdown.seller_reliability = FactorScore::NoSignal;
        assert!(generate_insights(&breakdown, "Flower")
            .iter()
            .all(|i| i.tag != InsightTag::Warning));
    }

    #[test]
    fn weak_reliability_and_high_pricing_warn() {
        let mut breakdown = quiet_breakdown();
        breakdown.seller_reliability = FactorScore::measured(30.0);
        breakdown.price_vs_market = FactorScore::measured(25.0);

        let insights = generate_insights(&breakdown, "Flower");
        assert_eq!(insights.iter().filter(|i| i.tag == InsightTag::Warning).count(), 2);
    }

    #[test]
    fn strong_breakdown_generates_positive_insights() {
        let mut breakdown = quiet_breakdown();
        breakdown.category_affinity = FactorScore::measured(90.0);
        breakdown.price_fit = FactorScore::measured(100.0);
        breakdown.relationship_history = FactorScore::measured(90.0);
        breakdown.seller_reliability = FactorScore::measured(92.0);

        let insights = generate_insights(&breakdown, "Flower");
        assert!(insights.len() >= 4);
        assert!(insights.iter().all(|i| i.tag == InsightTag::Positive));
    }
}
