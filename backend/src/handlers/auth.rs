//! Authentication handlers

use axum::{extract::State, Json};

use crate::error::AppError;
use crate::services::auth::{AuthTokens, LoginInput};
use crate::services::AuthService;
use crate::AppState;

/// Login endpoint handler
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginInput>,
) -> Result<Json<AuthTokens>, AppError> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let tokens = auth_service.login(body).await?;
    Ok(Json(tokens))
}
