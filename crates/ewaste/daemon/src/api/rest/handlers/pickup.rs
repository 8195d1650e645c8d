//! Pickup request handlers

use super::parse_id;
use crate::api::rest::auth::Authenticated;
use crate::api::rest::extract::OptionalJson;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use ewaste_storage::ApprovalOutcome;
use ewaste_types::{ItemId, PickupRequest, RequestId};
use ewaste_workflow::{ApprovalInput, VendorBoard};
use serde::Deserialize;

/// Optional free text attached to a request or a decision
#[derive(Debug, Default, Deserialize)]
pub struct NotesRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

/// A vendor asks to collect an item
pub async fn create_pickup_request(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<NotesRequest>,
) -> ApiResult<(StatusCode, Json<PickupRequest>)> {
    let item_id: ItemId = parse_id(&id)?;
    let request = state
        .coordinator
        .create_pickup_request(&principal, item_id, body.notes)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// The owner clears requests left pending after another vendor won the item
pub async fn reject_stale_requests(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<NotesRequest>,
) -> ApiResult<Json<Vec<PickupRequest>>> {
    let item_id: ItemId = parse_id(&id)?;
    let rejected = state
        .coordinator
        .reject_stale_requests(&principal, item_id, body.notes)
        .await?;
    Ok(Json(rejected))
}

pub async fn approve_request(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
    OptionalJson(input): OptionalJson<ApprovalInput>,
) -> ApiResult<Json<ApprovalOutcome>> {
    let request_id: RequestId = parse_id(&id)?;
    Ok(Json(
        state
            .coordinator
            .approve_request(&principal, request_id, input)
            .await?,
    ))
}

pub async fn reject_request(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<NotesRequest>,
) -> ApiResult<Json<PickupRequest>> {
    let request_id: RequestId = parse_id(&id)?;
    Ok(Json(
        state
            .coordinator
            .reject_request(&principal, request_id, body.notes)
            .await?,
    ))
}

/// Requests the caller made (vendor) or received (user)
pub async fn list_requests(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> ApiResult<Json<Vec<PickupRequest>>> {
    Ok(Json(state.coordinator.list_requests(&principal).await?))
}

pub async fn vendor_board(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> ApiResult<Json<VendorBoard>> {
    Ok(Json(state.coordinator.vendor_board(&principal).await?))
}
