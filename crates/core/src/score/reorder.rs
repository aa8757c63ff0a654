//! Reorder interval model: pairwise purchase gaps, noise filtering and a
//! consistency-dominated confidence score.

use chrono::{DateTime, Duration, Utc};

use crate::score::{clamp_score, MAX_GAP_DAYS, MIN_GAP_DAYS};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntervalModel {
    pub avg_interval_days: f64,
    pub stddev_days: f64,
    /// Gaps that survived the noise filter.
    pub sample_gaps: usize,
}

/// Pairwise day-gaps between consecutive purchase dates (expects ascending
/// order), with gaps outside [MIN_GAP_DAYS, MAX_GAP_DAYS] discarded.
pub fn qualifying_gaps(dates: &[DateTime<Utc>]) -> Vec<f64> {
    dates
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_seconds() as f64 / 86_400.0)
        .filter(|gap| (MIN_GAP_DAYS..=MAX_GAP_DAYS).contains(gap))
        .collect()
}

/// Fits the interval model; `None` when every gap was discarded as noise.
pub fn interval_model(dates: &[DateTime<Utc>]) -> Option<IntervalModel> {
    let gaps = qualifying_gaps(dates);
    if gaps.is_empty() {
        return None;
    }

    let avg = gaps.iter().sum::<f64>() / gaps.len() as f64;
    let variance = gaps.iter().map(|gap| (gap - avg).powi(2)).sum::<f64>() / gaps.len() as f64;

    Some(IntervalModel {
        avg_interval_days: avg,
        stddev_days: variance.sqrt(),
        sample_gaps: gaps.len(),
    })
}

/// Consistency dominates; sample size adds a capped bonus:
/// clamp(max(0, 100 − 2σ) + min(20, 2n), 0, 100).
pub fn confidence(stddev_days: f64, transaction_count: i64) -> f64 {
    let consistency = (100.0 - 2.0 * stddev_days).max(0.0);
    let sample_bonus = (2.0 * transaction_count as f64).min(20.0);
    clamp_score(consistency + sample_bonus)
}

pub fn predicted_date(last_transaction: DateTime<Utc>, avg_interval_days: f64) -> DateTime<Utc> {
    last_transaction + Duration::seconds((avg_interval_days * 86_400.0) as i64)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn day(d: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, d, 9, 0, 0).unwrap()
    }

    #[test]
    fn evenly_spaced_purchases_give_a_zero_stddev_model() {
        let dates = vec![day(1), day(11), day(21)];
        let model = interval_model(&dates).expect("model");
        assert!((model.avg_interval_days - 10.0).abs() < 1e-9);
        assert!(model.stddev_days.abs() < 1e-9);
        assert_eq!(model.sample_gaps, 2);
    }

    #[test]
    fn perfect_consistency_confidence_is_capped_at_100() {
        // 100 - 0 plus the 3-transaction bonus of 6, clamped.
        assert_eq!(confidence(0.0, 3), 100.0);
    }

    #[test]
    fn sample_bonus_is_capped_at_20() {
        // stddev 45 leaves 10 consistency; 50 transactions add only 20.
        assert_eq!(confidence(45.0, 50), 30.0);
    }

    #[test]
    fn wildly_inconsistent_history_bottoms_out_at_the_bonus() {
        assert_eq!(confidence(80.0, 2), 4.0);
        assert_eq!(confidence(80.0, 0), 0.0);
    }

    #[test]
    fn gaps_outside_the_noise_window_are_discarded() {
        // 1-day gap (duplicate order) and a 400-day gap are both noise.
        let dates = vec![
            day(1),
            day(2),
            day(12),
            Utc.with_ymd_and_hms(2027, 2, 16, 9, 0, 0).unwrap(),
        ];
        let gaps = qualifying_gaps(&dates);
        assert_eq!(gaps.len(), 1);
        assert!((gaps[0] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn all_noise_means_no_model() {
        let dates = vec![day(1), day(2), day(3)];
        assert!(interval_model(&dates).is_none());
    }

    #[test]
    fn predicted_date_advances_by_the_average_interval() {
        let predicted = predicted_date(day(21), 10.0);
        assert_eq!(predicted, day(31));
    }
}
