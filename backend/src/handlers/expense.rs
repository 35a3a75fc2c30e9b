//! Expense HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Expense, PaginatedResponse, Pagination};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::expense::{CreateExpenseInput, ExpenseFilter, UpdateExpenseInput};
use crate::services::ExpenseService;
use crate::AppState;

pub async fn list_expenses(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(filter): Query<ExpenseFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Expense>>> {
    let pagination = pagination.clamped(state.config.pagination.max_per_page);
    let service = ExpenseService::new(state.db);
    Ok(Json(service.list(&actor, filter, pagination).await?))
}

pub async fn create_expense(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<CreateExpenseInput>,
) -> AppResult<(StatusCode, Json<Expense>)> {
    let service = ExpenseService::new(state.db);
    let expense = service.create(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn update_expense(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateExpenseInput>,
) -> AppResult<Json<Expense>> {
    let service = ExpenseService::new(state.db);
    Ok(Json(service.update(&actor, id, input).await?))
}

pub async fn delete_expense(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = ExpenseService::new(state.db);
    service.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
