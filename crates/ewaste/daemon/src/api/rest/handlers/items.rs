//! Item registry handlers

use super::parse_id;
use crate::api::rest::auth::Authenticated;
use crate::api::rest::extract::{ApiJson, ApiQuery};
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use ewaste_storage::{DeletedItem, StatusTransition};
use ewaste_types::{Item, ItemId, StatusLogEntry};
use ewaste_workflow::authz::require_vendor;
use ewaste_workflow::{parse_target_status, ItemDetail, ItemQuery, NewItem};
use serde::Deserialize;

/// Vendor-reported handling step
#[derive(Debug, Deserialize)]
pub struct AdvanceStatusRequest {
    /// Target status name, case-insensitive
    pub status: String,
    #[serde(default)]
    pub remarks: String,
}

/// List the caller's reported items
pub async fn list_items(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiQuery(query): ApiQuery<ItemQuery>,
) -> ApiResult<Json<Vec<Item>>> {
    Ok(Json(state.coordinator.list_items(&principal, &query).await?))
}

/// Report a new item
pub async fn create_item(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiJson(input): ApiJson<NewItem>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    let item = state.coordinator.create_item(&principal, input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_item(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<Json<ItemDetail>> {
    let item_id: ItemId = parse_id(&id)?;
    Ok(Json(state.coordinator.item_detail(&principal, item_id).await?))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<Json<DeletedItem>> {
    let item_id: ItemId = parse_id(&id)?;
    Ok(Json(state.coordinator.delete_item(&principal, item_id).await?))
}

/// Full status history, newest first
pub async fn item_history(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<StatusLogEntry>>> {
    let item_id: ItemId = parse_id(&id)?;
    Ok(Json(state.coordinator.status_history(&principal, item_id).await?))
}

pub async fn advance_status(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<AdvanceStatusRequest>,
) -> ApiResult<Json<StatusTransition>> {
    // Role is checked before the status name is parsed
    require_vendor(&principal, "update item status")?;
    let item_id: ItemId = parse_id(&id)?;
    let target = parse_target_status(&request.status)?;
    let transition = state
        .coordinator
        .advance_item_status(&principal, item_id, target, &request.remarks)
        .await?;
    Ok(Json(transition))
}
