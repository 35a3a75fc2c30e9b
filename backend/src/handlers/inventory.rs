//! Inventory records and stock movements

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{InventoryRecord, InventoryStatus, Movement, PaginatedResponse, Pagination};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::stock::{
    InitializeRecordInput, InventoryFilter, ManualMovementInput, MovementFilter, UpdateRecordInput,
};
use crate::services::InventoryService;
use crate::AppState;

pub async fn list_records(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(filter): Query<InventoryFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<InventoryStatus>>> {
    let pagination = pagination.clamped(state.config.pagination.max_per_page);
    let service = InventoryService::new(state.db);
    Ok(Json(service.list_records(&actor, filter, pagination).await?))
}

pub async fn initialize_record(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<InitializeRecordInput>,
) -> AppResult<(StatusCode, Json<InventoryRecord>)> {
    let service = InventoryService::new(state.db);
    let record = service.initialize_record(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_record(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateRecordInput>,
) -> AppResult<Json<InventoryRecord>> {
    let service = InventoryService::new(state.db);
    Ok(Json(service.update_record(&actor, id, input).await?))
}

pub async fn list_movements(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(filter): Query<MovementFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Movement>>> {
    let pagination = pagination.clamped(state.config.pagination.max_per_page);
    let service = InventoryService::new(state.db);
    Ok(Json(service.list_movements(&actor, filter, pagination).await?))
}

/// Manual entrada or salida
pub async fn create_movement(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<ManualMovementInput>,
) -> AppResult<(StatusCode, Json<Movement>)> {
    let service = InventoryService::new(state.db);
    let movement = service.create_movement(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

pub async fn reverse_movement(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = InventoryService::new(state.db);
    service.reverse_movement(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
