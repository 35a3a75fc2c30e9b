//! Bank deposit HTTP handlers

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{PaginatedResponse, Pagination};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::handlers::form::ReceiptForm;
use crate::middleware::CurrentUser;
use crate::services::deposit::{DepositChanges, DepositFilter, DepositView, NewDeposit};
use crate::services::DepositService;
use crate::AppState;

fn service(state: &AppState) -> DepositService {
    DepositService::new(state.db.clone(), state.store.clone(), &state.config.storage)
}

pub async fn list_deposits(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(filter): Query<DepositFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<DepositView>>> {
    let pagination = pagination.clamped(state.config.pagination.max_per_page);
    Ok(Json(service(&state).list(&actor, filter, pagination).await?))
}

/// Fields: `warehouse_id`, `amount`, `deposit_date?`, `bank_reference?`,
/// `notes?`, file `receipt?`
pub async fn create_deposit(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DepositView>)> {
    let form = ReceiptForm::read(multipart).await?;
    let input = NewDeposit {
        warehouse_id: form
            .uuid("warehouse_id")?
            .ok_or_else(|| AppError::validation("warehouse_id", "Field is required"))?,
        amount: form.required_decimal("amount")?,
        deposit_date: form.date("deposit_date")?,
        bank_reference: form.text("bank_reference"),
        notes: form.text("notes"),
    };

    let deposit = service(&state).create(&actor, input, form.receipt).await?;
    Ok((StatusCode::CREATED, Json(deposit)))
}

pub async fn get_deposit(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DepositView>> {
    Ok(Json(service(&state).get(&actor, id).await?))
}

pub async fn update_deposit(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<DepositView>> {
    let form = ReceiptForm::read(multipart).await?;
    let changes = DepositChanges {
        amount: form.decimal("amount")?,
        deposit_date: form.date("deposit_date")?,
        bank_reference: form.text("bank_reference"),
        notes: form.text("notes"),
        remove_receipt: form.flag("remove_receipt"),
    };

    let deposit = service(&state)
        .update(&actor, id, changes, form.receipt)
        .await?;
    Ok(Json(deposit))
}

pub async fn delete_deposit(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    service(&state).delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
