//! User management handlers (admin only)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::User;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::user::{CreateUserInput, UpdateUserInput, UserFilter};
use crate::services::UserService;
use crate::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(filter): Query<UserFilter>,
) -> AppResult<Json<Vec<User>>> {
    let service = UserService::new(state.db);
    Ok(Json(service.list(&actor, filter).await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<User>)> {
    let service = UserService::new(state.db);
    let user = service.create(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    let service = UserService::new(state.db);
    Ok(Json(service.get(&actor, id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<Json<User>> {
    let service = UserService::new(state.db);
    Ok(Json(service.update(&actor, id, input).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = UserService::new(state.db);
    service.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
