//! End-to-end scenarios over a seeded in-memory store: the full engine
//! wired exactly as the server wires it, minus the transport.

use std::sync::Arc;

use dealsense_core::chrono::{Duration, Utc};
use dealsense_core::config::{
    AppConfig, DatabaseConfig, IntelligenceConfig, LogFormat, LoggingConfig, ServerConfig,
};
use dealsense_core::domain::churn::ChurnRiskLevel;
use dealsense_core::domain::matching::{InsightTag, MatchStatus};
use dealsense_core::domain::product::ProductId;
use dealsense_core::domain::transaction::{Transaction, TransactionId};
use dealsense_core::domain::user::{User, UserId, UserRole};
use dealsense_core::score::FactorScore;
use dealsense_db::repositories::{
    SqlMatchRepository, SqlProductRepository, SqlTransactionRepository, SqlUserRepository,
};
use dealsense_db::{connect_with_settings, migrations, seed_demo_dataset, DbPool};
use dealsense_engine::{Intelligence, RecordingNotifier};

fn test_config() -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            url: "sqlite::memory:".to_owned(),
            max_connections: 1,
            timeout_secs: 30,
        },
        server: ServerConfig { bind_address: "127.0.0.1".to_owned(), port: 0 },
        logging: LoggingConfig { level: "warn".to_owned(), format: LogFormat::Compact },
        intelligence: IntelligenceConfig {
            match_threshold: 50.0,
            notify_threshold: 70.0,
            propensity_ttl_hours: 24,
            batch_concurrency: 4,
            item_timeout_secs: 30,
            notify_webhook_url: None,
        },
    }
}

async fn setup() -> (DbPool, Intelligence, Arc<RecordingNotifier>) {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrate");
    seed_demo_dataset(&pool, Utc::now()).await.expect("seed");

    let notifier = Arc::new(RecordingNotifier::new());
    let engine = Intelligence::new(pool.clone(), &test_config(), notifier.clone());
    (pool, engine, notifier)
}

fn buyer(id: &str) -> UserId {
    UserId(id.to_owned())
}

fn product(id: &str) -> ProductId {
    ProductId(id.to_owned())
}

#[tokio::test]
async fn flower_scenario_scores_the_documented_factor_tiers() {
    let (_pool, engine, _notifier) = setup().await;

    // Five Flower purchases at $4/g, three of them from this product's
    // seller, product listed at $3.40 (15% below the buyer's average).
    let scored = engine
        .matching
        .score_match(&buyer("buyer-rose-city"), &product("prod-flower-premium"))
        .await
        .expect("score");

    match scored.breakdown.category_affinity {
        FactorScore::Measured(score) => assert!(score >= 80.0, "category tier was {score}"),
        FactorScore::NoSignal => panic!("category affinity must always measure"),
    }
    assert_eq!(scored.breakdown.price_fit, FactorScore::Measured(100.0));
    assert_eq!(scored.breakdown.relationship_history, FactorScore::Measured(90.0));
    assert!(scored.score > 50.0, "combined score was {}", scored.score);

    for (name, factor) in scored.breakdown.factors() {
        let value = factor.value();
        assert!((0.0..=100.0).contains(&value), "{name} out of range: {value}");
    }
}

#[tokio::test]
async fn generating_matches_persists_pending_rows_and_notifies_high_scores() {
    let (pool, engine, notifier) = setup().await;

    let created = engine
        .matching
        .generate_matches_for_product(&product("prod-flower-premium"))
        .await
        .expect("generate");
    assert!(created >= 1);

    let matches = SqlMatchRepository::new(pool.clone());
    let found = matches
        .find_by_pair(&buyer("buyer-rose-city"), &product("prod-flower-premium"))
        .await
        .expect("find")
        .expect("match persisted");
    assert_eq!(found.status, MatchStatus::Pending);
    assert!(found.score >= 50.0);

    // The denormalized count reflects this run, and the unapproved buyer
    // never gets a row.
    let products = SqlProductRepository::new(pool.clone());
    let listing = products
        .find_by_id(&product("prod-flower-premium"))
        .await
        .expect("find product")
        .expect("exists");
    assert_eq!(listing.match_count, created as i64);
    assert!(matches
        .find_by_pair(&buyer("buyer-pending"), &product("prod-flower-premium"))
        .await
        .expect("find")
        .is_none());

    let sent = notifier.sent();
    assert!(
        sent.iter()
            .any(|n| n.kind == "match.high_score" && n.user_id == buyer("buyer-rose-city")),
        "expected a high-score notification for the strong match"
    );
}

#[tokio::test]
async fn regenerating_all_matches_twice_is_idempotent() {
    let (pool, engine, _notifier) = setup().await;

    let first = engine.matching.regenerate_all_matches().await.expect("first run");
    assert_eq!(first.products_processed, 3, "all matchable products scored");
    assert_eq!(first.products_failed, 0);

    let matches = SqlMatchRepository::new(pool.clone());
    let snapshot = |rows: Vec<dealsense_core::domain::matching::Match>| {
        rows.into_iter().map(|m| (m.product_id.0.clone(), m.score)).collect::<Vec<_>>()
    };
    let rose_first =
        snapshot(matches.list_for_buyer(&buyer("buyer-rose-city")).await.expect("list"));

    let second = engine.matching.regenerate_all_matches().await.expect("second run");
    assert_eq!(second.products_processed, first.products_processed);

    let rose_second =
        snapshot(matches.list_for_buyer(&buyer("buyer-rose-city")).await.expect("list"));
    assert_eq!(rose_first.len(), rose_second.len(), "no duplicate match rows");
    for ((product_a, score_a), (product_b, score_b)) in rose_first.iter().zip(&rose_second) {
        assert_eq!(product_a, product_b);
        assert!((score_a - score_b).abs() < 1e-6, "score drifted between runs");
    }
}

#[tokio::test]
async fn overdue_buyer_gets_the_urgent_reorder_signal() {
    let (_pool, engine, notifier) = setup().await;

    // High Desert's Edibles cadence is 20 days with the last purchase 80
    // days ago: the prediction lands well in the past.
    let sweep = engine.reorder.generate_predictions().await.expect("sweep");
    assert!(sweep.predictions_created >= 2);
    assert!(sweep.notifications_sent >= 1);

    let scored = engine
        .matching
        .score_match(&buyer("buyer-high-desert"), &product("prod-edibles-gummies"))
        .await
        .expect("score");
    assert_eq!(scored.breakdown.reorder_timing, FactorScore::Measured(100.0));

    let urgent = scored
        .insights
        .iter()
        .find(|insight| insight.tag == InsightTag::Urgent)
        .expect("urgent insight present");
    assert!(urgent.message.contains("overdue"));

    // The due-soon alert fires exactly once per prediction.
    let sent_before = notifier
        .sent()
        .iter()
        .filter(|n| n.kind == "reorder.due_soon")
        .count();
    let second = engine.reorder.generate_predictions().await.expect("second sweep");
    assert_eq!(second.notifications_sent, 0, "unchanged predictions must not re-alert");
    let sent_after = notifier
        .sent()
        .iter()
        .filter(|n| n.kind == "reorder.due_soon")
        .count();
    assert_eq!(sent_before, sent_after);
}

#[tokio::test]
async fn churn_signal_raises_then_resolves_on_a_new_purchase() {
    let (pool, engine, _notifier) = setup().await;

    engine.reorder.generate_predictions().await.expect("predictions");
    let sweep = engine.churn.detect_all_churn_signals().await.expect("detect");
    assert!(sweep.signals_raised >= 1);

    let at_risk =
        engine.churn.get_at_risk_buyers(ChurnRiskLevel::High, 10).await.expect("at risk");
    assert!(at_risk.iter().any(|signal| {
        signal.buyer_id == buyer("buyer-high-desert") && signal.category == "Edibles"
    }));
    let stats = engine.churn.get_churn_stats().await.expect("stats");
    assert!(stats.critical >= 1);

    // A fresh Edibles purchase brings the buyer back inside their pattern.
    let transactions = SqlTransactionRepository::new(pool.clone());
    transactions
        .insert(&Transaction {
            id: TransactionId("tx-desert-return".to_owned()),
            buyer_id: buyer("buyer-high-desert"),
            seller_id: UserId("seller-cascade".to_owned()),
            product_id: product("prod-edibles-gummies"),
            category: "Edibles".to_owned(),
            quantity: 40.0,
            unit_price: 10.0,
            total_value: 400.0,
            transacted_at: Utc::now(),
            outcome: None,
        })
        .await
        .expect("insert return purchase");

    let second = engine.churn.detect_all_churn_signals().await.expect("re-detect");
    assert!(second.signals_resolved >= 1);

    let stats = engine.churn.get_churn_stats().await.expect("stats after");
    assert_eq!(stats.critical, 0, "resolved signal left the dashboard");
}

#[tokio::test]
async fn propensity_reads_through_the_cache_until_expiry() {
    let (pool, engine, _notifier) = setup().await;

    let first =
        engine.propensity.get_propensity(&buyer("buyer-rose-city"), None).await.expect("compute");
    assert!((0.0..=100.0).contains(&first.overall));

    let second =
        engine.propensity.get_propensity(&buyer("buyer-rose-city"), None).await.expect("cached");
    assert_eq!(second.computed_at, first.computed_at, "second read must hit the cache");

    // Force the TTL past and the next read recomputes.
    sqlx::query("UPDATE propensity_scores SET expires_at = ? WHERE buyer_id = ?")
        .bind((Utc::now() - Duration::hours(1)).to_rfc3339())
        .bind("buyer-rose-city")
        .execute(&pool)
        .await
        .expect("expire");

    let third =
        engine.propensity.get_propensity(&buyer("buyer-rose-city"), None).await.expect("recompute");
    assert!(third.computed_at > first.computed_at, "expired entry must recompute");

    // Explicit invalidation also forces the next read to recompute.
    engine.propensity.invalidate(&buyer("buyer-rose-city")).await.expect("invalidate");
    let fourth =
        engine.propensity.get_propensity(&buyer("buyer-rose-city"), None).await.expect("recompute");
    assert!(fourth.computed_at > third.computed_at);
}

#[tokio::test]
async fn seller_scoring_updates_the_denormalized_profile_score() {
    let (pool, engine, _notifier) = setup().await;

    let score = engine
        .sellers
        .calculate_seller_scores(&UserId("seller-green-acres".to_owned()))
        .await
        .expect("score");
    assert_eq!(score.transactions_scored, 3);
    assert_eq!(score.quality, 100.0);
    assert_eq!(score.delivery, 100.0);
    assert_eq!(score.fill_rate, 100.0);

    let users = SqlUserRepository::new(pool.clone());
    let seller = users
        .find_by_id(&UserId("seller-green-acres".to_owned()))
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(seller.avg_fulfillment_score, Some(score.overall));

    // A seller with no outcome-recorded transactions gets the distinct
    // no-data row and no profile score.
    users
        .insert(&User {
            id: UserId("seller-new".to_owned()),
            display_name: "Brand New Farm".to_owned(),
            role: UserRole::Seller,
            location: Some("Medford, OR".to_owned()),
            approved: true,
            transaction_count: 0,
            total_value: 0.0,
            last_transaction_at: None,
            avg_fulfillment_score: None,
            created_at: Utc::now(),
        })
        .await
        .expect("insert seller");

    let empty = engine
        .sellers
        .calculate_seller_scores(&UserId("seller-new".to_owned()))
        .await
        .expect("score empty");
    assert_eq!(empty.transactions_scored, 0);
    assert_eq!(empty.overall, 0.0);

    let sweep = engine.sellers.recalculate_all_seller_scores().await.expect("sweep");
    assert_eq!(sweep.sellers_updated, 3);
    assert_eq!(sweep.sellers_failed, 0);
}

#[tokio::test]
async fn match_status_machine_survives_rescoring() {
    let (pool, engine, _notifier) = setup().await;

    engine
        .matching
        .generate_matches_for_product(&product("prod-flower-premium"))
        .await
        .expect("generate");

    let rose = buyer("buyer-rose-city");
    let premium = product("prod-flower-premium");

    let viewed = engine.matching.record_view(&rose, &premium).await.expect("view");
    assert_eq!(viewed.status, MatchStatus::Viewed);
    assert!(viewed.reviewed_at.is_some());

    let converted = engine.matching.record_conversion(&rose, &premium).await.expect("convert");
    assert_eq!(converted.status, MatchStatus::Converted);

    // Converting again is an invalid transition.
    assert!(engine.matching.record_conversion(&rose, &premium).await.is_err());

    // Re-scoring must not reset a converted match.
    engine
        .matching
        .generate_matches_for_product(&premium)
        .await
        .expect("re-generate");
    let after = engine
        .matching
        .score_match(&rose, &premium)
        .await
        .expect("still scoreable");
    assert!(after.score > 0.0);

    let matches = SqlMatchRepository::new(pool.clone());
    let row = matches.find_by_pair(&rose, &premium).await.expect("find").expect("exists");
    assert_eq!(row.status, MatchStatus::Converted);
}
