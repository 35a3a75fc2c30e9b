//! Catalog HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{
    Client, Lot, PaginatedResponse, Pagination, Presentation, Product, Supplier, Warehouse,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::catalog::{
    ClientFilter, CreateClientInput, CreateLotInput, CreatePresentationInput, CreateProductInput,
    CreateSupplierInput, CreateWarehouseInput, LotFilter, PresentationFilter, UpdateClientInput,
    UpdatePresentationInput, UpdateSupplierInput,
};
use crate::services::CatalogService;
use crate::AppState;

// ============================================================================
// Warehouses
// ============================================================================

pub async fn list_warehouses(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> AppResult<Json<Vec<Warehouse>>> {
    let service = CatalogService::new(state.db);
    Ok(Json(service.list_warehouses(&actor).await?))
}

pub async fn create_warehouse(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<CreateWarehouseInput>,
) -> AppResult<(StatusCode, Json<Warehouse>)> {
    let service = CatalogService::new(state.db);
    let warehouse = service.create_warehouse(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(warehouse)))
}

pub async fn get_warehouse(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Warehouse>> {
    let service = CatalogService::new(state.db);
    Ok(Json(service.get_warehouse(&actor, id).await?))
}

// ============================================================================
// Clients
// ============================================================================

pub async fn list_clients(
    State(state): State<AppState>,
    Query(filter): Query<ClientFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Client>>> {
    let pagination = pagination.clamped(state.config.pagination.max_per_page);
    let service = CatalogService::new(state.db);
    Ok(Json(service.list_clients(filter, pagination).await?))
}

pub async fn create_client(
    State(state): State<AppState>,
    Json(input): Json<CreateClientInput>,
) -> AppResult<(StatusCode, Json<Client>)> {
    let service = CatalogService::new(state.db);
    let client = service.create_client(input).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Client>> {
    let service = CatalogService::new(state.db);
    Ok(Json(service.get_client(id).await?))
}

pub async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateClientInput>,
) -> AppResult<Json<Client>> {
    let service = CatalogService::new(state.db);
    Ok(Json(service.update_client(id, input).await?))
}

// ============================================================================
// Suppliers
// ============================================================================

pub async fn list_suppliers(State(state): State<AppState>) -> AppResult<Json<Vec<Supplier>>> {
    let service = CatalogService::new(state.db);
    Ok(Json(service.list_suppliers().await?))
}

pub async fn create_supplier(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<CreateSupplierInput>,
) -> AppResult<(StatusCode, Json<Supplier>)> {
    let service = CatalogService::new(state.db);
    let supplier = service.create_supplier(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn get_supplier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Supplier>> {
    let service = CatalogService::new(state.db);
    Ok(Json(service.get_supplier(id).await?))
}

pub async fn update_supplier(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateSupplierInput>,
) -> AppResult<Json<Supplier>> {
    let service = CatalogService::new(state.db);
    Ok(Json(service.update_supplier(&actor, id, input).await?))
}

pub async fn delete_supplier(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = CatalogService::new(state.db);
    service.delete_supplier(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Products and presentations
// ============================================================================

pub async fn list_products(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    let service = CatalogService::new(state.db);
    Ok(Json(service.list_products().await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let service = CatalogService::new(state.db);
    let product = service.create_product(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn list_presentations(
    State(state): State<AppState>,
    Query(filter): Query<PresentationFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Presentation>>> {
    let pagination = pagination.clamped(state.config.pagination.max_per_page);
    let service = CatalogService::new(state.db);
    Ok(Json(service.list_presentations(filter, pagination).await?))
}

pub async fn create_presentation(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<CreatePresentationInput>,
) -> AppResult<(StatusCode, Json<Presentation>)> {
    let service = CatalogService::new(state.db);
    let presentation = service.create_presentation(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(presentation)))
}

pub async fn get_presentation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Presentation>> {
    let service = CatalogService::new(state.db);
    Ok(Json(service.get_presentation(id).await?))
}

pub async fn update_presentation(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdatePresentationInput>,
) -> AppResult<Json<Presentation>> {
    let service = CatalogService::new(state.db);
    Ok(Json(service.update_presentation(&actor, id, input).await?))
}

// ============================================================================
// Lots
// ============================================================================

pub async fn list_lots(
    State(state): State<AppState>,
    Query(filter): Query<LotFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Lot>>> {
    let pagination = pagination.clamped(state.config.pagination.max_per_page);
    let service = CatalogService::new(state.db);
    Ok(Json(service.list_lots(filter, pagination).await?))
}

pub async fn create_lot(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<CreateLotInput>,
) -> AppResult<(StatusCode, Json<Lot>)> {
    let service = CatalogService::new(state.db);
    let lot = service.create_lot(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(lot)))
}

pub async fn get_lot(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<Lot>> {
    let service = CatalogService::new(state.db);
    Ok(Json(service.get_lot(id).await?))
}
