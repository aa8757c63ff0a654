use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub seller_id: UserId,
    pub name: String,
    pub category: String,
    pub unit_price: f64,
    pub available_quantity: f64,
    pub active: bool,
    pub visible: bool,
    /// Number of matches upserted in the most recent scoring run.
    pub match_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn is_matchable(&self) -> bool {
        self.active && self.visible
    }
}
