pub mod health;
pub mod image_handler;
pub mod item_handler;

use axum::Extension;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CallerIdentity;
use crate::models::Item;

/// The identity is attached by the auth layer; its absence means the route
/// was mounted without it.
pub(crate) fn require_identity(
    identity: Option<Extension<CallerIdentity>>,
) -> AppResult<CallerIdentity> {
    identity
        .map(|Extension(caller)| caller)
        .ok_or_else(|| AppError::Unauthenticated("unauthorized".to_string()))
}

pub(crate) fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::InvalidInput("invalid ID".to_string()))
}

/// Only the owner or an admin may modify an item.
pub fn can_modify(item: &Item, caller: &CallerIdentity) -> bool {
    item.user_id == caller.user_id || caller.is_admin
}

pub(crate) fn authorize(item: &Item, caller: &CallerIdentity, action: &str) -> AppResult<()> {
    if can_modify(item, caller) {
        Ok(())
    } else {
        tracing::warn!(
            "User {} denied {} on item {} owned by {}",
            caller.user_id,
            action,
            item.id,
            item.user_id
        );
        Err(AppError::Forbidden(format!(
            "not authorized to {} this item",
            action
        )))
    }
}

/// Non-numeric input falls back to the default.
pub(crate) fn parse_int_or_default(value: Option<&str>, default: i64) -> i64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
