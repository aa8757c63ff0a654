//! Shared fixtures for repository tests.

use dealsense_core::chrono::{DateTime, TimeZone, Utc};
use dealsense_core::domain::product::ProductId;
use dealsense_core::domain::transaction::{Transaction, TransactionId};
use dealsense_core::domain::user::UserId;

use crate::{connect_with_settings, migrations, DbPool};

pub(crate) async fn setup_pool() -> DbPool {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
    migrations::run_pending(&pool).await.expect("run migrations");
    pool
}

pub(crate) async fn insert_user(pool: &DbPool, id: &str, role: &str) {
    insert_user_with(pool, id, role, Some("Portland, OR"), true).await;
}

pub(crate) async fn insert_user_with(
    pool: &DbPool,
    id: &str,
    role: &str,
    location: Option<&str>,
    approved: bool,
) {
    let created_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap().to_rfc3339();
    sqlx::query(
        "INSERT INTO users (id, display_name, role, location, approved, transaction_count, total_value, created_at)
         VALUES (?, ?, ?, ?, ?, 0, 0, ?)",
    )
    .bind(id)
    .bind(format!("User {id}"))
    .bind(role)
    .bind(location)
    .bind(approved)
    .bind(&created_at)
    .execute(pool)
    .await
    .expect("insert user fixture");
}

pub(crate) async fn insert_product(
    pool: &DbPool,
    id: &str,
    seller_id: &str,
    category: &str,
    unit_price: f64,
) {
    insert_product_with(pool, id, seller_id, category, unit_price, 100.0, true).await;
}

pub(crate) async fn insert_product_with(
    pool: &DbPool,
    id: &str,
    seller_id: &str,
    category: &str,
    unit_price: f64,
    available_quantity: f64,
    visible: bool,
) {
    let created_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap().to_rfc3339();
    sqlx::query(
        "INSERT INTO products (id, seller_id, name, category, unit_price, available_quantity, active, visible, match_count, created_at)
         VALUES (?, ?, ?, ?, ?, ?, 1, ?, 0, ?)",
    )
    .bind(id)
    .bind(seller_id)
    .bind(format!("Product {id}"))
    .bind(category)
    .bind(unit_price)
    .bind(available_quantity)
    .bind(visible)
    .bind(&created_at)
    .execute(pool)
    .await
    .expect("insert product fixture");
}

/// A plain 10-unit transaction at $4/unit with no recorded outcome.
pub(crate) fn tx_at(
    id: &str,
    buyer_id: &str,
    seller_id: &str,
    product_id: &str,
    category: &str,
    transacted_at: DateTime<Utc>,
) -> Transaction {
    Transaction {
        id: TransactionId(id.to_owned()),
        buyer_id: UserId(buyer_id.to_owned()),
        seller_id: UserId(seller_id.to_owned()),
        product_id: ProductId(product_id.to_owned()),
        category: category.to_owned(),
        quantity: 10.0,
        unit_price: 4.0,
        total_value: 40.0,
        transacted_at,
        outcome: None,
    }
}
