use dealsense_core::chrono::{DateTime, Duration, Utc};
use dealsense_core::domain::product::ProductId;
use dealsense_core::domain::transaction::{Transaction, TransactionId, TransactionOutcome};
use dealsense_core::domain::user::UserId;
use dealsense_core::score::seller::CategorySales;
use sqlx::{sqlite::SqliteRow, Row};

use super::{parse_optional_rfc3339, parse_rfc3339, RepositoryError};
use crate::DbPool;

/// Aggregate spend/frequency view of a buyer, optionally scoped to one
/// category. Feeds propensity feature extraction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpendSummary {
    pub transactions_total: i64,
    pub transactions_30d: i64,
    pub transactions_90d: i64,
    pub total_spend: f64,
    pub spend_30d: f64,
    pub spend_90d: f64,
    pub avg_order_value: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CategoryCount {
    pub category: String,
    pub transactions: i64,
}

pub struct SqlTransactionRepository {
    pool: DbPool,
}

impl SqlTransactionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, tx: &Transaction) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, buyer_id, seller_id, product_id, category,
                quantity, unit_price, total_value, transacted_at,
                delivered_quantity, on_time, quality_as_expected,
                outcome_notes, outcome_recorded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&tx.id.0)
        .bind(&tx.buyer_id.0)
        .bind(&tx.seller_id.0)
        .bind(&tx.product_id.0)
        .bind(&tx.category)
        .bind(tx.quantity)
        .bind(tx.unit_price)
        .bind(tx.total_value)
        .bind(tx.transacted_at.to_rfc3339())
        .bind(tx.outcome.as_ref().and_then(|o| o.delivered_quantity))
        .bind(tx.outcome.as_ref().and_then(|o| o.on_time))
        .bind(tx.outcome.as_ref().and_then(|o| o.quality_as_expected))
        .bind(tx.outcome.as_ref().and_then(|o| o.notes.as_deref()))
        .bind(tx.outcome.as_ref().map(|o| o.recorded_at.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records outcome fields exactly once; a second call is a no-op and
    /// returns false.
    pub async fn record_outcome(
        &self,
        id: &TransactionId,
        outcome: &TransactionOutcome,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE transactions SET
                delivered_quantity = ?,
                on_time = ?,
                quality_as_expected = ?,
                outcome_notes = ?,
                outcome_recorded_at = ?
            WHERE id = ? AND outcome_recorded_at IS NULL
            "#,
        )
        .bind(outcome.delivered_quantity)
        .bind(outcome.on_time)
        .bind(outcome.quality_as_expected)
        .bind(outcome.notes.as_deref())
        .bind(outcome.recorded_at.to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_for_buyer(
        &self,
        buyer_id: &UserId,
        category: Option<&str>,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let rows = match category {
            Some(category) => {
                sqlx::query(
                    "SELECT * FROM transactions
                     WHERE buyer_id = ? AND category = ?
                     ORDER BY transacted_at ASC, id ASC",
                )
                .bind(&buyer_id.0)
                .bind(category)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM transactions
                     WHERE buyer_id = ?
                     ORDER BY transacted_at ASC, id ASC",
                )
                .bind(&buyer_id.0)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(transaction_from_row).collect()
    }

    /// Transactions with at least one recorded outcome field; the input set
    /// for seller reliability scoring.
    pub async fn list_outcomes_for_seller(
        &self,
        seller_id: &UserId,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM transactions
             WHERE seller_id = ? AND outcome_recorded_at IS NOT NULL
             ORDER BY transacted_at ASC, id ASC",
        )
        .bind(&seller_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(transaction_from_row).collect()
    }

    /// Per category the seller sold in: the seller's average transaction
    /// value against the category-wide average, weighted by their count.
    pub async fn seller_category_sales(
        &self,
        seller_id: &UserId,
    ) -> Result<Vec<CategorySales>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT
                s.category,
                s.seller_avg,
                s.transaction_count,
                m.market_avg
            FROM (
                SELECT category, AVG(total_value) AS seller_avg, COUNT(*) AS transaction_count
                FROM transactions WHERE seller_id = ? GROUP BY category
            ) s
            LEFT JOIN (
                SELECT category, AVG(total_value) AS market_avg
                FROM transactions GROUP BY category
            ) m ON m.category = s.category
            ORDER BY s.category ASC
            "#,
        )
        .bind(&seller_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CategorySales {
                category: row.get("category"),
                seller_avg_value: row.get("seller_avg"),
                market_avg_value: row.get("market_avg"),
                transaction_count: row.get("transaction_count"),
            })
            .collect())
    }

    pub async fn avg_unit_price(
        &self,
        buyer_id: &UserId,
        category: &str,
    ) -> Result<Option<f64>, RepositoryError> {
        let avg: Option<f64> = sqlx::query_scalar(
            "SELECT AVG(unit_price) FROM transactions WHERE buyer_id = ? AND category = ?",
        )
        .bind(&buyer_id.0)
        .bind(category)
        .fetch_one(&self.pool)
        .await?;
        Ok(avg)
    }

    pub async fn avg_order_quantity(
        &self,
        buyer_id: &UserId,
        category: &str,
    ) -> Result<Option<f64>, RepositoryError> {
        let avg: Option<f64> = sqlx::query_scalar(
            "SELECT AVG(quantity) FROM transactions WHERE buyer_id = ? AND category = ?",
        )
        .bind(&buyer_id.0)
        .bind(category)
        .fetch_one(&self.pool)
        .await?;
        Ok(avg)
    }

    /// Category-wide average unit price across all trades; the market
    /// context's price baseline.
    pub async fn avg_unit_price_for_category(
        &self,
        category: &str,
    ) -> Result<Option<f64>, RepositoryError> {
        let avg: Option<f64> =
            sqlx::query_scalar("SELECT AVG(unit_price) FROM transactions WHERE category = ?")
                .bind(category)
                .fetch_one(&self.pool)
                .await?;
        Ok(avg)
    }

    pub async fn completed_count_between(
        &self,
        buyer_id: &UserId,
        seller_id: &UserId,
    ) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE buyer_id = ? AND seller_id = ?",
        )
        .bind(&buyer_id.0)
        .bind(&seller_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn count_for_buyer_category(
        &self,
        buyer_id: &UserId,
        category: &str,
    ) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE buyer_id = ? AND category = ?",
        )
        .bind(&buyer_id.0)
        .bind(category)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn last_transacted_at(
        &self,
        buyer_id: &UserId,
        category: Option<&str>,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let value: Option<String> = match category {
            Some(category) => {
                sqlx::query_scalar(
                    "SELECT MAX(transacted_at) FROM transactions
                     WHERE buyer_id = ? AND category = ?",
                )
                .bind(&buyer_id.0)
                .bind(category)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar("SELECT MAX(transacted_at) FROM transactions WHERE buyer_id = ?")
                    .bind(&buyer_id.0)
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        parse_optional_rfc3339("transaction transacted_at", value.as_deref())
    }

    pub async fn spend_summary(
        &self,
        buyer_id: &UserId,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SpendSummary, RepositoryError> {
        let cutoff_30d = (now - Duration::days(30)).to_rfc3339();
        let cutoff_90d = (now - Duration::days(90)).to_rfc3339();

        let base = r#"
            SELECT
                COUNT(*) AS transactions_total,
                COALESCE(SUM(CASE WHEN transacted_at >= ? THEN 1 ELSE 0 END), 0) AS transactions_30d,
                COALESCE(SUM(CASE WHEN transacted_at >= ? THEN 1 ELSE 0 END), 0) AS transactions_90d,
                COALESCE(SUM(total_value), 0.0) AS total_spend,
                COALESCE(SUM(CASE WHEN transacted_at >= ? THEN total_value ELSE 0.0 END), 0.0) AS spend_30d,
                COALESCE(SUM(CASE WHEN transacted_at >= ? THEN total_value ELSE 0.0 END), 0.0) AS spend_90d
            FROM transactions WHERE buyer_id = ?
        "#;

        let row = match category {
            Some(category) => {
                sqlx::query(&format!("{base} AND category = ?"))
                    .bind(&cutoff_30d)
                    .bind(&cutoff_90d)
                    .bind(&cutoff_30d)
                    .bind(&cutoff_90d)
                    .bind(&buyer_id.0)
                    .bind(category)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query(base)
                    .bind(&cutoff_30d)
                    .bind(&cutoff_90d)
                    .bind(&cutoff_30d)
                    .bind(&cutoff_90d)
                    .bind(&buyer_id.0)
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        let transactions_total: i64 = row.get("transactions_total");
        let total_spend: f64 = row.get("total_spend");
        let avg_order_value =
            if transactions_total > 0 { total_spend / transactions_total as f64 } else { 0.0 };

        Ok(SpendSummary {
            transactions_total,
            transactions_30d: row.get("transactions_30d"),
            transactions_90d: row.get("transactions_90d"),
            total_spend,
            spend_30d: row.get("spend_30d"),
            spend_90d: row.get("spend_90d"),
            avg_order_value,
        })
    }

    /// Distinct categories the buyer purchased in, most transactions first.
    pub async fn category_counts(
        &self,
        buyer_id: &UserId,
    ) -> Result<Vec<CategoryCount>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT category, COUNT(*) AS transactions
             FROM transactions WHERE buyer_id = ?
             GROUP BY category
             ORDER BY transactions DESC, category ASC",
        )
        .bind(&buyer_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CategoryCount {
                category: row.get("category"),
                transactions: row.get("transactions"),
            })
            .collect())
    }

    /// Every (buyer, category) pair at or above the minimum sample size;
    /// the work list for prediction and churn sweeps.
    pub async fn buyer_categories_with_min_transactions(
        &self,
        min_count: i64,
    ) -> Result<Vec<(UserId, String, i64)>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT buyer_id, category, COUNT(*) AS transactions
             FROM transactions
             GROUP BY buyer_id, category
             HAVING COUNT(*) >= ?
             ORDER BY buyer_id ASC, category ASC",
        )
        .bind(min_count)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (UserId(row.get("buyer_id")), row.get("category"), row.get("transactions"))
            })
            .collect())
    }
}

fn transaction_from_row(row: &SqliteRow) -> Result<Transaction, RepositoryError> {
    let outcome_recorded_at = parse_optional_rfc3339(
        "transaction outcome_recorded_at",
        row.try_get::<Option<String>, _>("outcome_recorded_at")?.as_deref(),
    )?;

    let outcome = outcome_recorded_at.map(|recorded_at| -> Result<_, RepositoryError> {
        Ok(TransactionOutcome {
            delivered_quantity: row.try_get("delivered_quantity")?,
            on_time: row.try_get("on_time")?,
            quality_as_expected: row.try_get("quality_as_expected")?,
            notes: row.try_get("outcome_notes")?,
            recorded_at,
        })
    });

    Ok(Transaction {
        id: TransactionId(row.try_get("id")?),
        buyer_id: UserId(row.try_get("buyer_id")?),
        seller_id: UserId(row.try_get("seller_id")?),
        product_id: ProductId(row.try_get("product_id")?),
        category: row.try_get("category")?,
        quantity: row.try_get("quantity")?,
        unit_price: row.try_get("unit_price")?,
        total_value: row.try_get("total_value")?,
        transacted_at: parse_rfc3339(
            "transaction transacted_at",
            &row.try_get::<String, _>("transacted_at")?,
        )?,
        outcome: outcome.transpose()?,
    })
}
