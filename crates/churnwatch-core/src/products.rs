use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Longest accepted product name, in characters.
pub const MAX_PRODUCT_NAME_LEN: usize = 255;

/// A tracked product, identified by its unique name.
///
/// Products are created lazily the first time an analysis is requested for
/// the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Validate and normalize a product name from a request.
///
/// Leading/trailing whitespace is trimmed. The trimmed name must be between
/// 1 and [`MAX_PRODUCT_NAME_LEN`] characters and contain no control characters.
///
/// # Errors
///
/// Returns [`CoreError::InvalidProductName`] describing the first violated rule.
pub fn validate_product_name(raw: &str) -> Result<String, CoreError> {
    let name = raw.trim();

    if name.is_empty() {
        return Err(CoreError::InvalidProductName(
            "product name must not be empty".to_string(),
        ));
    }

    let len = name.chars().count();
    if len > MAX_PRODUCT_NAME_LEN {
        return Err(CoreError::InvalidProductName(format!(
            "product name is {len} characters; the limit is {MAX_PRODUCT_NAME_LEN}"
        )));
    }

    if name.chars().any(char::is_control) {
        return Err(CoreError::InvalidProductName(
            "product name must not contain control characters".to_string(),
        ));
    }

    Ok(name.to_string())
}
