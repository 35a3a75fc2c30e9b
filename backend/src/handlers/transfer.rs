//! Inter-warehouse transfer handler

use axum::{extract::State, http::StatusCode, Json};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::transfer::{TransferInput, TransferResult};
use crate::services::TransferService;
use crate::AppState;

pub async fn create_transfer(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<TransferInput>,
) -> AppResult<(StatusCode, Json<TransferResult>)> {
    let service = TransferService::new(state.db);
    let result = service.transfer(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(result)))
}
