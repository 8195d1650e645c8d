//! Reference data handlers. These are readable without a credential.

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{extract::State, Json};
use ewaste_types::{Category, Department};

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.coordinator.list_categories().await?))
}

pub async fn list_departments(State(state): State<AppState>) -> ApiResult<Json<Vec<Department>>> {
    Ok(Json(state.coordinator.list_departments().await?))
}
