//! Order HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Order, PaginatedResponse, Pagination};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::order::{
    ConvertOrderInput, CreateOrderInput, OrderDetail, OrderFilter, UpdateOrderInput,
};
use crate::services::sale::SaleDetail;
use crate::services::OrderService;
use crate::AppState;

pub async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(filter): Query<OrderFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Order>>> {
    let pagination = pagination.clamped(state.config.pagination.max_per_page);
    let service = OrderService::new(state.db);
    Ok(Json(service.list(&actor, filter, pagination).await?))
}

pub async fn create_order(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<(StatusCode, Json<OrderDetail>)> {
    let service = OrderService::new(state.db);
    let order = service.create(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<OrderDetail>> {
    let service = OrderService::new(state.db);
    Ok(Json(service.get(&actor, id).await?))
}

pub async fn update_order(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateOrderInput>,
) -> AppResult<Json<OrderDetail>> {
    let service = OrderService::new(state.db);
    Ok(Json(service.update(&actor, id, input).await?))
}

pub async fn delete_order(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = OrderService::new(state.db);
    service.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn cancel_order(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let service = OrderService::new(state.db);
    Ok(Json(service.cancel(&actor, id).await?))
}

/// The body is optional; without one the sale is priced from the order's
/// estimates and paid `contado`
pub async fn convert_order(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ConvertOrderInput>>,
) -> AppResult<(StatusCode, Json<SaleDetail>)> {
    let input = body.map(|Json(input)| input).unwrap_or_default();
    let service = OrderService::new(state.db);
    let sale = service.convert(&actor, id, input).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}
