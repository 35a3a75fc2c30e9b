//! Sale HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{PaginatedResponse, Pagination, Sale};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::sale::{CreateSaleInput, SaleDetail, SaleFilter, UpdateSaleInput};
use crate::services::SaleService;
use crate::AppState;

fn service(state: &AppState) -> SaleService {
    SaleService::new(state.db.clone(), state.store.clone(), &state.config.storage)
}

pub async fn list_sales(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(filter): Query<SaleFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Sale>>> {
    let pagination = pagination.clamped(state.config.pagination.max_per_page);
    Ok(Json(service(&state).list(&actor, filter, pagination).await?))
}

pub async fn create_sale(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<CreateSaleInput>,
) -> AppResult<(StatusCode, Json<SaleDetail>)> {
    let sale = service(&state).create(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn get_sale(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SaleDetail>> {
    Ok(Json(service(&state).get(&actor, id).await?))
}

pub async fn update_sale(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateSaleInput>,
) -> AppResult<Json<SaleDetail>> {
    Ok(Json(service(&state).update(&actor, id, input).await?))
}

pub async fn delete_sale(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    service(&state).delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
