//! Churn risk from overdue reorder ratios.

use crate::domain::churn::ChurnRiskLevel;
use crate::score::clamp_score;

/// A buyer is flagged once they are 20% past their expected interval.
pub const CHURN_RATIO_TRIGGER: f64 = 1.2;

/// How far past the expected reorder interval the buyer is; 0 when the
/// interval is unusable.
pub fn overdue_ratio(days_since_last: f64, avg_interval_days: f64) -> f64 {
    if avg_interval_days <= 0.0 {
        return 0.0;
    }
    (days_since_last / avg_interval_days).max(0.0)
}

/// clamp((ratio − 1) × 50, 0, 100): one full missed interval scores 50,
/// three intervals late saturates at 100.
pub fn risk_score(ratio: f64) -> f64 {
    clamp_score((ratio - 1.0) * 50.0)
}

/// Evaluates a buyer-category; `None` below the trigger ratio.
pub fn evaluate(days_since_last: f64, avg_interval_days: f64) -> Option<(f64, ChurnRiskLevel)> {
    let ratio = overdue_ratio(days_since_last, avg_interval_days);
    if ratio < CHURN_RATIO_TRIGGER {
        return None;
    }
    let score = risk_score(ratio);
    Some((score, ChurnRiskLevel::from_score(score)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::churn::ChurnRiskLevel;

    #[test]
    fn risk_is_monotonic_in_the_overdue_ratio() {
        let mut previous = -1.0;
        for ratio in [1.0, 1.2, 1.5, 2.0, 2.5, 3.0, 4.0] {
            let score = risk_score(ratio);
            assert!(score >= previous, "score regressed at ratio {ratio}");
            previous = score;
        }
    }

    #[test]
    fn below_trigger_is_not_a_signal() {
        assert!(evaluate(10.0, 10.0).is_none());
        assert!(evaluate(11.0, 10.0).is_none());
    }

    #[test]
    fn levels_escalate_with_lateness() {
        let (score, level) = evaluate(15.0, 10.0).expect("signal");
        assert_eq!(level, ChurnRiskLevel::Medium);
        assert!((score - 25.0).abs() < 1e-9);

        let (_, level) = evaluate(20.0, 10.0).expect("signal");
        assert_eq!(level, ChurnRiskLevel::High);

        let (_, level) = evaluate(25.0, 10.0).expect("signal");
        assert_eq!(level, ChurnRiskLevel::Critical);
    }

    #[test]
    fn risk_saturates_at_100() {
        assert_eq!(risk_score(10.0), 100.0);
    }

    #[test]
    fn unusable_interval_yields_zero_ratio() {
        assert_eq!(overdue_ratio(30.0, 0.0), 0.0);
        assert!(evaluate(30.0, 0.0).is_none());
    }
}
