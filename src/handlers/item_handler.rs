use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CallerIdentity;
use crate::models::{Item, ItemPayload, JsonResponse, Page};
use crate::repository::ItemFilter;
use crate::router::AppState;
use crate::services::item_service::{DEFAULT_LIMIT, DEFAULT_PAGE};

use super::{authorize, parse_id, parse_int_or_default, require_identity};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub category: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

fn body(payload: Result<Json<ItemPayload>, JsonRejection>) -> AppResult<ItemPayload> {
    payload
        .map(|Json(p)| p)
        .map_err(|e| AppError::InvalidInput(e.body_text()))
}

pub async fn create_item(
    State(state): State<AppState>,
    identity: Option<Extension<CallerIdentity>>,
    payload: Result<Json<ItemPayload>, JsonRejection>,
) -> AppResult<JsonResponse<Item>> {
    let payload = body(payload)?;
    let caller = require_identity(identity)?;

    let item = payload.into_item(Uuid::new_v4(), caller.user_id);
    let created = state.items.create(item).await?;

    tracing::info!("Item created: id={}, owner={}", created.id, caller.user_id);
    Ok(JsonResponse::created("Item created successfully", created))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<JsonResponse<Item>> {
    let id = parse_id(&id)?;
    let item = state.items.get_by_id(id).await?;
    Ok(JsonResponse::ok("Item retrieved successfully", item))
}

pub async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<JsonResponse<Page<Item>>> {
    let filter = ItemFilter::new(
        params.status.unwrap_or_default(),
        params.category.unwrap_or_default(),
    );
    let page = parse_int_or_default(params.page.as_deref(), DEFAULT_PAGE);
    let limit = parse_int_or_default(params.limit.as_deref(), DEFAULT_LIMIT);

    let result = state.items.list(&filter, page, limit).await?;
    Ok(JsonResponse::ok("Items retrieved successfully", result))
}

pub async fn search_items(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<JsonResponse<Page<Item>>> {
    let keyword = params.q.unwrap_or_default();
    let page = parse_int_or_default(params.page.as_deref(), DEFAULT_PAGE);
    let limit = parse_int_or_default(params.limit.as_deref(), DEFAULT_LIMIT);

    let result = state.items.search(keyword.trim(), page, limit).await?;
    Ok(JsonResponse::ok("Items retrieved successfully", result))
}

pub async fn update_item(
    State(state): State<AppState>,
    identity: Option<Extension<CallerIdentity>>,
    Path(id): Path<String>,
    payload: Result<Json<ItemPayload>, JsonRejection>,
) -> AppResult<JsonResponse<Item>> {
    let id = parse_id(&id)?;
    let payload = body(payload)?;
    let caller = require_identity(identity)?;

    let existing = state.items.get_by_id(id).await?;
    authorize(&existing, &caller, "update")?;

    let mut item = payload.into_item(id, existing.user_id);
    item.created_at = existing.created_at;
    let updated = state.items.update(item).await?;

    Ok(JsonResponse::ok("Item updated successfully", updated))
}

pub async fn delete_item(
    State(state): State<AppState>,
    identity: Option<Extension<CallerIdentity>>,
    Path(id): Path<String>,
) -> AppResult<JsonResponse<()>> {
    let id = parse_id(&id)?;
    let caller = require_identity(identity)?;

    let existing = state.items.get_by_id(id).await?;
    authorize(&existing, &caller, "delete")?;

    state.items.delete(id).await?;

    tracing::info!("Item deleted: id={}, by={}", id, caller.user_id);
    Ok(JsonResponse::new(StatusCode::OK, "Item deleted successfully", None))
}
