//! Database operations for the `products` table.

use chrono::{DateTime, Utc};
use churnwatch_core::Product;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

/// Return the product with the given name, inserting it first if absent.
///
/// The no-op `DO UPDATE` makes `RETURNING` yield the existing row on conflict,
/// so concurrent first references to the same name converge on one id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn get_or_create_product(pool: &PgPool, name: &str) -> Result<ProductRow, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(
        "INSERT INTO products (name) VALUES ($1) \
         ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
         RETURNING id, name, created_at",
    )
    .bind(name)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Look up a product by its unique name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product_by_name(pool: &PgPool, name: &str) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT id, name, created_at FROM products WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Look up a product by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product(pool: &PgPool, id: i64) -> Result<Option<ProductRow>, DbError> {
    let row =
        sqlx::query_as::<_, ProductRow>("SELECT id, name, created_at FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(row)
}
