//! Pure scoring math for the deal intelligence engine.
//!
//! Everything in this module is deterministic computation over already
//! fetched rows; data access and persistence live in the engine crate.

pub mod churn;
pub mod insights;
pub mod matching;
pub mod propensity;
pub mod reorder;
pub mod seller;
pub mod weights;

use serde::{Deserialize, Serialize};

/// Minimum combined score for a match to be persisted.
pub const MATCH_THRESHOLD: f64 = 50.0;

/// Combined score at which a new or updated match notifies the buyer.
pub const NOTIFY_THRESHOLD: f64 = 70.0;

/// Neutral midpoint substituted for factors with no signal.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Transactions required before a reorder prediction is produced.
pub const MIN_PREDICTION_SAMPLE: i64 = 2;

/// Purchase gaps outside this window are discarded as noise.
pub const MIN_GAP_DAYS: f64 = 3.0;
pub const MAX_GAP_DAYS: f64 = 365.0;

/// Bids with an ask snapshot required before elasticity is estimated.
pub const MIN_ELASTICITY_SAMPLE: usize = 3;

/// Propensity cache time-to-live.
pub const PROPENSITY_TTL_HOURS: i64 = 24;

pub fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

/// A factor result that keeps "we measured 50" distinguishable from "we
/// had no data and fell back to the neutral midpoint". Aggregation always
/// applies the factor's full fixed weight either way.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FactorScore {
    Measured(f64),
    NoSignal,
}

impl FactorScore {
    /// Clamps into [0,100] at construction so no factor can leak an
    /// out-of-range value into the weighted sum.
    pub fn measured(value: f64) -> Self {
        FactorScore::Measured(clamp_score(value))
    }

    pub fn value(self) -> f64 {
        match self {
            FactorScore::Measured(value) => value,
            FactorScore::NoSignal => NEUTRAL_SCORE,
        }
    }

    pub fn is_measured(self) -> bool {
        matches!(self, FactorScore::Measured(_))
    }
}

#[cfg(test)]
mod tests {
    use super::{clamp_score, FactorScore, NEUTRAL_SCORE};

    #[test]
    fn measured_clamps_out_of_range_input() {
        assert_eq!(FactorScore::measured(120.0), FactorScore::Measured(100.0));
        assert_eq!(FactorScore::measured(-5.0), FactorScore::Measured(0.0));
    }

    #[test]
    fn no_signal_resolves_to_the_neutral_midpoint() {
        assert_eq!(FactorScore::NoSignal.value(), NEUTRAL_SCORE);
        assert!(!FactorScore::NoSignal.is_measured());
        assert!(FactorScore::measured(NEUTRAL_SCORE).is_measured());
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp_score(-1.0), 0.0);
        assert_eq!(clamp_score(100.1), 100.0);
        assert_eq!(clamp_score(42.5), 42.5);
    }
}
