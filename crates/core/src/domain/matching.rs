use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::domain::user::UserId;
use crate::errors::DomainError;
use crate::score::matching::MatchBreakdown;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchId(pub String);

/// Lifecycle of a scored buyer-product pairing:
/// `pending → viewed → {converted | rejected}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Viewed,
    Converted,
    Rejected,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Viewed => "viewed",
            MatchStatus::Converted => "converted",
            MatchStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(MatchStatus::Pending),
            "viewed" => Some(MatchStatus::Viewed),
            "converted" => Some(MatchStatus::Converted),
            "rejected" => Some(MatchStatus::Rejected),
            _ => None,
        }
    }

    /// Terminal statuses survive a re-score; pending/viewed reset.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Converted | MatchStatus::Rejected)
    }

    pub fn transition_to(self, next: MatchStatus) -> Result<MatchStatus, DomainError> {
        let allowed = matches!(
            (self, next),
            (MatchStatus::Pending, MatchStatus::Viewed)
                | (MatchStatus::Pending, MatchStatus::Rejected)
                | (MatchStatus::Viewed, MatchStatus::Converted)
                | (MatchStatus::Viewed, MatchStatus::Rejected)
        );
        if allowed {
            Ok(next)
        } else {
            Err(DomainError::InvalidMatchTransition { from: self, to: next })
        }
    }
}

/// Severity tag attached to a generated insight string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightTag {
    Positive,
    Neutral,
    Urgent,
    Warning,
}

/// Human-readable annotation derived from the factor breakdown. Advisory
/// only; never an input to the score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub tag: InsightTag,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub buyer_id: UserId,
    pub product_id: ProductId,
    pub score: f64,
    pub breakdown: MatchBreakdown,
    pub insights: Vec<Insight>,
    pub status: MatchStatus,
    pub weights_version: String,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::MatchStatus;

    #[test]
    fn status_machine_allows_the_documented_paths() {
        assert!(MatchStatus::Pending.transition_to(MatchStatus::Viewed).is_ok());
        assert!(MatchStatus::Viewed.transition_to(MatchStatus::Converted).is_ok());
        assert!(MatchStatus::Viewed.transition_to(MatchStatus::Rejected).is_ok());
        assert!(MatchStatus::Pending.transition_to(MatchStatus::Rejected).is_ok());
    }

    #[test]
    fn status_machine_rejects_backwards_and_terminal_moves() {
        assert!(MatchStatus::Pending.transition_to(MatchStatus::Converted).is_err());
        assert!(MatchStatus::Converted.transition_to(MatchStatus::Viewed).is_err());
        assert!(MatchStatus::Rejected.transition_to(MatchStatus::Pending).is_err());
    }

    #[test]
    fn terminal_statuses_are_converted_and_rejected() {
        assert!(MatchStatus::Converted.is_terminal());
        assert!(MatchStatus::Rejected.is_terminal());
        assert!(!MatchStatus::Pending.is_terminal());
        assert!(!MatchStatus::Viewed.is_terminal());
    }
}
