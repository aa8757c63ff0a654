use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Buyer,
    Seller,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Buyer => "buyer",
            UserRole::Seller => "seller",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "buyer" => Some(UserRole::Buyer),
            "seller" => Some(UserRole::Seller),
            _ => None,
        }
    }
}

/// Marketplace account. Buyers must be `approved` before they are eligible
/// for matching; the aggregate counters are denormalized from transactions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub role: UserRole,
    pub location: Option<String>,
    pub approved: bool,
    pub transaction_count: i64,
    pub total_value: f64,
    pub last_transaction_at: Option<DateTime<Utc>>,
    /// Denormalized seller reliability; `None` means never scored.
    pub avg_fulfillment_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}
