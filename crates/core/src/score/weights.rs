//! Versioned weight tables. Weight changes are data, not code changes:
//! every scorer takes its table as an argument, and test suites can inject
//! alternate sets deterministically.

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Weights for the ten match factors. Must sum to 1.0; the combiner never
/// renormalizes over present-vs-absent factors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchWeights {
    pub version: String,
    pub category_affinity: f64,
    pub price_fit: f64,
    pub location: f64,
    pub relationship_history: f64,
    pub reorder_timing: f64,
    pub quantity_fit: f64,
    pub seller_reliability: f64,
    pub price_vs_market: f64,
    pub supply_demand: f64,
    pub buyer_propensity: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            version: "match-v1".to_owned(),
            category_affinity: 0.15,
            price_fit: 0.12,
            location: 0.05,
            relationship_history: 0.10,
            reorder_timing: 0.10,
            quantity_fit: 0.08,
            seller_reliability: 0.10,
            price_vs_market: 0.10,
            supply_demand: 0.05,
            buyer_propensity: 0.15,
        }
    }
}

impl MatchWeights {
    pub fn total(&self) -> f64 {
        self.category_affinity
            + self.price_fit
            + self.location
            + self.relationship_history
            + self.reorder_timing
            + self.quantity_fit
            + self.seller_reliability
            + self.price_vs_market
            + self.supply_demand
            + self.buyer_propensity
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        validate_table(&self.version, self.total(), &[
            self.category_affinity,
            self.price_fit,
            self.location,
            self.relationship_history,
            self.reorder_timing,
            self.quantity_fit,
            self.seller_reliability,
            self.price_vs_market,
            self.supply_demand,
            self.buyer_propensity,
        ])
    }
}

/// Weights for the five propensity sub-scores.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropensityWeights {
    pub version: String,
    pub recency: f64,
    pub frequency: f64,
    pub monetary: f64,
    pub category_affinity: f64,
    pub engagement: f64,
}

impl Default for PropensityWeights {
    fn default() -> Self {
        Self {
            version: "propensity-v1".to_owned(),
            recency: 0.25,
            frequency: 0.20,
            monetary: 0.15,
            category_affinity: 0.15,
            engagement: 0.25,
        }
    }
}

impl PropensityWeights {
    pub fn total(&self) -> f64 {
        self.recency + self.frequency + self.monetary + self.category_affinity + self.engagement
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        validate_table(&self.version, self.total(), &[
            self.recency,
            self.frequency,
            self.monetary,
            self.category_affinity,
            self.engagement,
        ])
    }
}

/// Weights for the four seller reliability sub-scores.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SellerScoreWeights {
    pub version: String,
    pub fill_rate: f64,
    pub quality: f64,
    pub delivery: f64,
    pub pricing: f64,
}

impl Default for SellerScoreWeights {
    fn default() -> Self {
        Self {
            version: "seller-v1".to_owned(),
            fill_rate: 0.30,
            quality: 0.30,
            delivery: 0.25,
            pricing: 0.15,
        }
    }
}

impl SellerScoreWeights {
    pub fn total(&self) -> f64 {
        self.fill_rate + self.quality + self.delivery + self.pricing
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        validate_table(&self.version, self.total(), &[
            self.fill_rate,
            self.quality,
            self.delivery,
            self.pricing,
        ])
    }
}

fn validate_table(version: &str, total: f64, entries: &[f64]) -> Result<(), DomainError> {
    if entries.iter().any(|w| *w < 0.0) {
        return Err(DomainError::InvalidWeights {
            version: version.to_owned(),
            reason: "negative weight".to_owned(),
        });
    }
    if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(DomainError::InvalidWeights {
            version: version.to_owned(),
            reason: format!("weights sum to {total}, expected 1.0"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{MatchWeights, PropensityWeights, SellerScoreWeights};

    #[test]
    fn default_tables_sum_to_one_and_validate() {
        assert!((MatchWeights::default().total() - 1.0).abs() < 1e-9);
        assert!((PropensityWeights::default().total() - 1.0).abs() < 1e-9);
        assert!((SellerScoreWeights::default().total() - 1.0).abs() < 1e-9);

        assert!(MatchWeights::default().validate().is_ok());
        assert!(PropensityWeights::default().validate().is_ok());
        assert!(SellerScoreWeights::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_tables_that_do_not_sum_to_one() {
        let mut weights = MatchWeights::default();
        weights.category_affinity += 0.05;
        assert!(weights.validate().is_err());
    }

    #[test]
    fn validate_rejects_negative_weights() {
        let weights = PropensityWeights {
            recency: -0.25,
            frequency: 0.70,
            ..PropensityWeights::default()
        };
        assert!(weights.validate().is_err());
    }
}
