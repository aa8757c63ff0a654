use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome fields recorded at most once by the seller after fulfillment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    pub delivered_quantity: Option<f64>,
    pub on_time: Option<bool>,
    pub quality_as_expected: Option<bool>,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A completed marketplace transaction. Immutable once the outcome is
/// recorded; drives every scorer in the intelligence engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub product_id: ProductId,
    pub category: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_value: f64,
    pub transacted_at: DateTime<Utc>,
    pub outcome: Option<TransactionOutcome>,
}

impl Transaction {
    pub fn has_outcome(&self) -> bool {
        self.outcome.is_some()
    }

    /// Both ordered and delivered quantities present, so the row counts
    /// toward the fill rate.
    pub fn has_fill_data(&self) -> bool {
        self.quantity > 0.0
            && self.outcome.as_ref().is_some_and(|o| o.delivered_quantity.is_some())
    }
}
