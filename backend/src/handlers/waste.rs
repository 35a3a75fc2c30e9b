//! Waste handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{PaginatedResponse, Pagination, WasteRecord};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::waste::{RecordWasteInput, WasteFilter};
use crate::services::WasteService;
use crate::AppState;

pub async fn list_waste(
    State(state): State<AppState>,
    Query(filter): Query<WasteFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<WasteRecord>>> {
    let pagination = pagination.clamped(state.config.pagination.max_per_page);
    let service = WasteService::new(state.db);
    Ok(Json(service.list(filter, pagination).await?))
}

pub async fn record_waste(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<RecordWasteInput>,
) -> AppResult<(StatusCode, Json<WasteRecord>)> {
    let service = WasteService::new(state.db);
    let waste = service.record(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(waste)))
}

pub async fn delete_waste(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = WasteService::new(state.db);
    service.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
