use dealsense_core::domain::product::{Product, ProductId};
use dealsense_core::domain::user::UserId;
use sqlx::{sqlite::SqliteRow, Row};

use super::{parse_rfc3339, RepositoryError};
use crate::DbPool;

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, seller_id, name, category, unit_price,
                available_quantity, active, visible, match_count, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.id.0)
        .bind(&product.seller_id.0)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.unit_price)
        .bind(product.available_quantity)
        .bind(product.active)
        .bind(product.visible)
        .bind(product.match_count)
        .bind(product.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM products WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| product_from_row(&row)).transpose()
    }

    /// Active and visible products: the batch entry set for match
    /// regeneration.
    pub async fn list_matchable(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM products WHERE active = 1 AND visible = 1 ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(product_from_row).collect()
    }

    pub async fn count_active_in_category(&self, category: &str) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE category = ? AND active = 1 AND visible = 1",
        )
        .bind(category)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Overwrites the denormalized count with this run's result; never a
    /// running total.
    pub async fn set_match_count(
        &self,
        id: &ProductId,
        match_count: i64,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE products SET match_count = ? WHERE id = ?")
            .bind(match_count)
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn product_from_row(row: &SqliteRow) -> Result<Product, RepositoryError> {
    Ok(Product {
        id: ProductId(row.try_get("id")?),
        seller_id: UserId(row.try_get("seller_id")?),
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        unit_price: row.try_get("unit_price")?,
        available_quantity: row.try_get("available_quantity")?,
        active: row.try_get("active")?,
        visible: row.try_get("visible")?,
        match_count: row.try_get("match_count")?,
        created_at: parse_rfc3339("product created_at", &row.try_get::<String, _>("created_at")?)?,
    })
}
