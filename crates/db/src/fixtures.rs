//! Deterministic demo dataset: a small two-seller marketplace with enough
//! history to exercise every scorer. Used by the CLI `seed` command and the
//! end-to-end engine tests.

use dealsense_core::chrono::{DateTime, Duration, Utc};
use dealsense_core::domain::bid::{Bid, BidId, BidStatus};
use dealsense_core::domain::product::{Product, ProductId};
use dealsense_core::domain::transaction::{Transaction, TransactionId, TransactionOutcome};
use dealsense_core::domain::user::{User, UserId, UserRole};

use crate::repositories::{
    RepositoryError, SqlActivityRepository, SqlBidRepository, SqlProductRepository,
    SqlTransactionRepository, SqlUserRepository,
};
use crate::DbPool;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub products: usize,
    pub transactions: usize,
    pub bids: usize,
}

/// Seeds the demo marketplace as of `now`. Ids are stable so the dataset
/// can be re-asserted from tests.
pub async fn seed_demo_dataset(pool: &DbPool, now: DateTime<Utc>) -> Result<SeedSummary, RepositoryError> {
    let users = SqlUserRepository::new(pool.clone());
    let products = SqlProductRepository::new(pool.clone());
    let transactions = SqlTransactionRepository::new(pool.clone());
    let bids = SqlBidRepository::new(pool.clone());
    let activity = SqlActivityRepository::new(pool.clone());

    let mut summary = SeedSummary::default();

    let accounts = [
        user("seller-green-acres", "Green Acres Farm", UserRole::Seller, "Portland, OR", true),
        user("seller-cascade", "Cascade Gardens", UserRole::Seller, "Salem, OR", true),
        user("buyer-rose-city", "Rose City Dispensary", UserRole::Buyer, "Portland, OR", true),
        user("buyer-high-desert", "High Desert Wellness", UserRole::Buyer, "Bend, OR", true),
        user("buyer-pending", "Pending Retail LLC", UserRole::Buyer, "Eugene, OR", false),
    ];
    for account in &accounts {
        users.insert(account).await?;
        summary.users += 1;
    }

    let catalog = [
        product("prod-flower-premium", "seller-green-acres", "Premium Flower", "Flower", 3.40, 500.0, true),
        product("prod-flower-value", "seller-cascade", "Value Flower", "Flower", 4.80, 200.0, true),
        product("prod-edibles-gummies", "seller-cascade", "Fruit Gummies", "Edibles", 11.0, 300.0, true),
        product("prod-flower-hidden", "seller-green-acres", "Unlisted Flower", "Flower", 3.90, 80.0, false),
    ];
    for item in &catalog {
        products.insert(item).await?;
        summary.products += 1;
    }

    // Rose City buys Flower every ten days at $4/g with clean outcomes:
    // three purchases from Green Acres, two from Cascade.
    for (index, age_days) in [50i64, 40, 30, 20, 10].into_iter().enumerate() {
        let at = now - Duration::days(age_days);
        let (seller, product) = if index < 3 {
            ("seller-green-acres", "prod-flower-premium")
        } else {
            ("seller-cascade", "prod-flower-value")
        };
        let tx = Transaction {
            id: TransactionId(format!("tx-rose-flower-{index}")),
            buyer_id: UserId("buyer-rose-city".to_owned()),
            seller_id: UserId(seller.to_owned()),
            product_id: ProductId(product.to_owned()),
            category: "Flower".to_owned(),
            quantity: 100.0,
            unit_price: 4.0,
            total_value: 400.0,
            transacted_at: at,
            outcome: Some(TransactionOutcome {
                delivered_quantity: Some(100.0),
                on_time: Some(true),
                quality_as_expected: Some(true),
                notes: None,
                recorded_at: at + Duration::days(2),
            }),
        };
        transactions.insert(&tx).await?;
        summary.transactions += 1;
    }

    // High Desert last bought Edibles months ago; overdue enough to churn.
    for (index, age_days) in [120i64, 100, 80].into_iter().enumerate() {
        let at = now - Duration::days(age_days);
        let tx = Transaction {
            id: TransactionId(format!("tx-desert-edibles-{index}")),
            buyer_id: UserId("buyer-high-desert".to_owned()),
            seller_id: UserId("seller-cascade".to_owned()),
            product_id: ProductId("prod-edibles-gummies".to_owned()),
            category: "Edibles".to_owned(),
            quantity: 40.0,
            unit_price: 10.0,
            total_value: 400.0,
            transacted_at: at,
            outcome: Some(TransactionOutcome {
                delivered_quantity: Some(38.0),
                on_time: Some(index % 2 == 0),
                quality_as_expected: Some(true),
                notes: None,
                recorded_at: at + Duration::days(3),
            }),
        };
        transactions.insert(&tx).await?;
        summary.transactions += 1;
    }

    for id in ["buyer-rose-city", "buyer-high-desert"] {
        users.refresh_transaction_rollup(&UserId(id.to_owned())).await?;
    }

    // Bid history gives Rose City a generous elasticity profile and High
    // Desert an aggressive one.
    let bid_rows = [
        ("bid-rose-1", "buyer-rose-city", "prod-flower-premium", "Flower", 3.40, 3.40, BidStatus::Accepted),
        ("bid-rose-2", "buyer-rose-city", "prod-flower-value", "Flower", 4.70, 4.80, BidStatus::Rejected),
        ("bid-rose-3", "buyer-rose-city", "prod-flower-premium", "Flower", 3.35, 3.40, BidStatus::Accepted),
        ("bid-desert-1", "buyer-high-desert", "prod-edibles-gummies", "Edibles", 8.0, 11.0, BidStatus::Rejected),
        ("bid-desert-2", "buyer-high-desert", "prod-edibles-gummies", "Edibles", 8.5, 11.0, BidStatus::Accepted),
        ("bid-desert-3", "buyer-high-desert", "prod-flower-value", "Flower", 3.6, 4.80, BidStatus::Rejected),
    ];
    for (index, (id, buyer, product, category, price, ask, status)) in bid_rows.into_iter().enumerate() {
        let bid = Bid {
            id: BidId(id.to_owned()),
            buyer_id: UserId(buyer.to_owned()),
            product_id: ProductId(product.to_owned()),
            category: category.to_owned(),
            unit_price: price,
            quantity: 20.0,
            ask_price: Some(ask),
            status,
            created_at: now - Duration::days(60 - index as i64),
        };
        bids.insert(&bid).await?;
        summary.bids += 1;
    }

    // Light engagement so the affinity tiers below "has bid" are reachable.
    activity
        .add_shortlist(
            &UserId("buyer-high-desert".to_owned()),
            &ProductId("prod-flower-value".to_owned()),
            "Flower",
            now - Duration::days(9),
        )
        .await?;
    activity
        .add_view(
            "view-desert-1",
            &UserId("buyer-high-desert".to_owned()),
            &ProductId("prod-flower-premium".to_owned()),
            "Flower",
            now - Duration::days(8),
        )
        .await?;

    Ok(summary)
}

fn user(id: &str, name: &str, role: UserRole, location: &str, approved: bool) -> User {
    User {
        id: UserId(id.to_owned()),
        display_name: name.to_owned(),
        role,
        location: Some(location.to_owned()),
        approved,
        transaction_count: 0,
        total_value: 0.0,
        last_transaction_at: None,
        avg_fulfillment_score: None,
        created_at: Utc::now() - Duration::days(365),
    }
}

fn product(
    id: &str,
    seller_id: &str,
    name: &str,
    category: &str,
    unit_price: f64,
    available_quantity: f64,
    visible: bool,
) -> Product {
    Product {
        id: ProductId(id.to_owned()),
        seller_id: UserId(seller_id.to_owned()),
        name: name.to_owned(),
        category: category.to_owned(),
        unit_price,
        available_quantity,
        active: true,
        visible,
        match_count: 0,
        created_at: Utc::now() - Duration::days(30),
    }
}

#[cfg(test)]
mod tests {
    use dealsense_core::chrono::{TimeZone, Utc};
    use dealsense_core::domain::user::UserId;

    use super::seed_demo_dataset;
    use crate::repositories::{SqlProductRepository, SqlTransactionRepository, SqlUserRepository};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn demo_dataset_seeds_a_scoreable_marketplace() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        let summary = seed_demo_dataset(&pool, now).await.expect("seed");
        assert_eq!(summary.users, 5);
        assert_eq!(summary.products, 4);
        assert_eq!(summary.transactions, 8);
        assert_eq!(summary.bids, 6);

        let users = SqlUserRepository::new(pool.clone());
        assert_eq!(users.list_approved_buyers().await.expect("buyers").len(), 2);

        let products = SqlProductRepository::new(pool.clone());
        assert_eq!(products.list_matchable().await.expect("matchable").len(), 3);

        let transactions = SqlTransactionRepository::new(pool.clone());
        let avg = transactions
            .avg_unit_price(&UserId("buyer-rose-city".to_owned()), "Flower")
            .await
            .expect("avg");
        assert_eq!(avg, Some(4.0));
    }
}
