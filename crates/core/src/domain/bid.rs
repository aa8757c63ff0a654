use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BidId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Submitted,
    Accepted,
    Rejected,
}

impl BidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::Submitted => "submitted",
            BidStatus::Accepted => "accepted",
            BidStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "submitted" => Some(BidStatus::Submitted),
            "accepted" => Some(BidStatus::Accepted),
            "rejected" => Some(BidStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub buyer_id: UserId,
    pub product_id: ProductId,
    pub category: String,
    pub unit_price: f64,
    pub quantity: f64,
    /// Asking price snapshot at bid time; feeds bid-elasticity estimation.
    pub ask_price: Option<f64>,
    pub status: BidStatus,
    pub created_at: DateTime<Utc>,
}

impl Bid {
    /// Proximity-to-ask ratio; 1.0 means the buyer bid the full ask.
    pub fn bid_ask_ratio(&self) -> Option<f64> {
        match self.ask_price {
            Some(ask) if ask > 0.0 => Some(self.unit_price / ask),
            _ => None,
        }
    }
}
