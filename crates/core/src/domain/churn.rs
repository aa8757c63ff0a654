use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChurnRiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ChurnRiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChurnRiskLevel::Low => "low",
            ChurnRiskLevel::Medium => "medium",
            ChurnRiskLevel::High => "high",
            ChurnRiskLevel::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(ChurnRiskLevel::Low),
            "medium" => Some(ChurnRiskLevel::Medium),
            "high" => Some(ChurnRiskLevel::High),
            "critical" => Some(ChurnRiskLevel::Critical),
            _ => None,
        }
    }

    /// Level thresholds are policy constants; the mapping is monotonic in
    /// the risk score.
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            ChurnRiskLevel::Critical
        } else if score >= 50.0 {
            ChurnRiskLevel::High
        } else if score >= 25.0 {
            ChurnRiskLevel::Medium
        } else {
            ChurnRiskLevel::Low
        }
    }
}

/// Active flag that a buyer is overdue relative to their reorder pattern.
/// Resolved (deactivated) on a new purchase in the same category; history
/// is preserved rather than deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChurnSignal {
    pub id: String,
    pub buyer_id: UserId,
    pub category: String,
    pub risk_score: f64,
    pub risk_level: ChurnRiskLevel,
    pub is_active: bool,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Aggregate counts of active signals, for dashboards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChurnStats {
    pub critical: i64,
    pub high: i64,
    pub medium: i64,
    pub low: i64,
}

impl ChurnStats {
    pub fn total(&self) -> i64 {
        self.critical + self.high + self.medium + self.low
    }
}
