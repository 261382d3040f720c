//! Database operations for `notification_preferences`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `notification_preferences` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionRow {
    pub id: i64,
    pub product_id: i64,
    pub email: String,
    pub display_name: Option<String>,
    pub email_alerts: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inserts or updates the alert preference for `(product_id, email)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_subscription(
    pool: &PgPool,
    product_id: i64,
    email: &str,
    display_name: Option<&str>,
    email_alerts: bool,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO notification_preferences (product_id, email, display_name, email_alerts) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (product_id, email) DO UPDATE SET \
             display_name = EXCLUDED.display_name, \
             email_alerts = EXCLUDED.email_alerts, \
             updated_at   = NOW()",
    )
    .bind(product_id)
    .bind(email)
    .bind(display_name)
    .bind(email_alerts)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetches the preference row for `(product_id, email)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_subscription(
    pool: &PgPool,
    product_id: i64,
    email: &str,
) -> Result<Option<SubscriptionRow>, DbError> {
    let row = sqlx::query_as::<_, SubscriptionRow>(
        "SELECT id, product_id, email, display_name, email_alerts, created_at, updated_at \
         FROM notification_preferences \
         WHERE product_id = $1 AND email = $2",
    )
    .bind(product_id)
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns every preference row for the product with `email_alerts = true`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_alert_subscribers(
    pool: &PgPool,
    product_id: i64,
) -> Result<Vec<SubscriptionRow>, DbError> {
    let rows = sqlx::query_as::<_, SubscriptionRow>(
        "SELECT id, product_id, email, display_name, email_alerts, created_at, updated_at \
         FROM notification_preferences \
         WHERE product_id = $1 AND email_alerts = true \
         ORDER BY id",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
