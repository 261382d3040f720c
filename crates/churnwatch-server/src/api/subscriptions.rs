use axum::{
    extract::{Path, State},
    Extension, Json,
};
use churnwatch_core::{validate_product_name, Subscription};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_store_error, ApiError, ApiResponse, AppState};

const MAX_EMAIL_LEN: usize = 320;

#[derive(Debug, Deserialize)]
pub(super) struct SubscriptionRequest {
    pub email: String,
    pub display_name: Option<String>,
    #[serde(default = "default_email_alerts")]
    pub email_alerts: bool,
}

fn default_email_alerts() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub(super) struct SubscriptionItem {
    pub product_id: i64,
    pub product_name: String,
    pub email: String,
    pub display_name: Option<String>,
    pub email_alerts: bool,
}

/// Create or replace one subscriber's alert preference for a product.
/// The product is created if it does not exist yet.
pub(super) async fn upsert_subscription(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(product_name): Path<String>,
    Json(body): Json<SubscriptionRequest>,
) -> Result<Json<ApiResponse<SubscriptionItem>>, ApiError> {
    let name = validate_product_name(&product_name)
        .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?;
    let email = validate_email(&body.email)
        .map_err(|message| ApiError::new(req_id.0.clone(), "validation_error", message))?;
    let display_name = body
        .display_name
        .map(|n| n.trim().to_owned())
        .filter(|n| !n.is_empty());

    let store = state.store();
    let product = store
        .get_or_create_product(&name)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    let subscription = Subscription {
        product_id: product.id,
        email,
        display_name,
        email_alerts: body.email_alerts,
    };
    store
        .upsert_subscription(&subscription)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    tracing::info!(
        product = product.name.as_str(),
        email_alerts = subscription.email_alerts,
        "subscription updated"
    );

    Ok(Json(ApiResponse::new(
        SubscriptionItem {
            product_id: product.id,
            product_name: product.name,
            email: subscription.email,
            display_name: subscription.display_name,
            email_alerts: subscription.email_alerts,
        },
        req_id.0,
    )))
}

/// Look up one subscriber's alert preference for a product.
pub(super) async fn get_subscription(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((product_name, email)): Path<(String, String)>,
) -> Result<Json<ApiResponse<SubscriptionItem>>, ApiError> {
    let name = validate_product_name(&product_name)
        .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?;
    let email = validate_email(&email)
        .map_err(|message| ApiError::new(req_id.0.clone(), "validation_error", message))?;

    let store = state.store();
    let product = store
        .get_product_by_name(&name)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "product not found"))?;

    let subscription = store
        .get_subscription(product.id, &email)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "subscription not found"))?;

    Ok(Json(ApiResponse::new(
        SubscriptionItem {
            product_id: product.id,
            product_name: product.name,
            email: subscription.email,
            display_name: subscription.display_name,
            email_alerts: subscription.email_alerts,
        },
        req_id.0,
    )))
}

fn validate_email(raw: &str) -> Result<String, &'static str> {
    let email = raw.trim();
    if email.is_empty() {
        return Err("email is required");
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err("email is too long");
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            Ok(email.to_lowercase())
        }
        _ => Err("email is not a valid address"),
    }
}

#[cfg(test)]
mod tests {
    use super::validate_email;

    #[test]
    fn validate_email_normalizes_and_rejects_garbage() {
        assert_eq!(
            validate_email("  Ops@Example.com "),
            Ok("ops@example.com".to_string())
        );
        assert!(validate_email("").is_err());
        assert!(validate_email("nobody").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a@localhost").is_err());
    }
}
