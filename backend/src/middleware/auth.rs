//! Authentication middleware
//!
//! Decodes the Bearer JWT into a [`Principal`] stored in the request
//! extensions. Role and warehouse checks are not done here; services call
//! `services::access` at the top of each operation.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use shared::{Principal, Role};
use uuid::Uuid;

use crate::error::{ErrorDetail, ErrorResponse};
use crate::AppState;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: Role,
    /// Warehouse a non-admin user is pinned to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn into_principal(self) -> Result<Principal, String> {
        let user_id =
            Uuid::parse_str(&self.sub).map_err(|_| "Invalid user ID in token".to_string())?;
        let warehouse_id = self
            .warehouse_id
            .map(|w| Uuid::parse_str(&w))
            .transpose()
            .map_err(|_| "Invalid warehouse ID in token".to_string())?;
        Ok(Principal {
            user_id,
            role: self.role,
            warehouse_id,
        })
    }
}

/// Authentication middleware that validates JWT tokens against the
/// configured secret, the same one the login service signs with
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match request.headers().typed_get::<Authorization<Bearer>>() {
        Some(Authorization(bearer)) => bearer.token().to_string(),
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    let decoded = decode_jwt(&token, &state.config.jwt.secret).and_then(Claims::into_principal);
    let principal = match decoded {
        Ok(principal) => principal,
        Err(msg) => return unauthorized_response(&msg),
    };

    request.extensions_mut().insert(principal);

    next.run(request).await
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: ErrorDetail::new("UNAUTHORIZED", message),
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for authenticated user
/// Use this in handlers to get the current principal
#[derive(Clone, Debug)]
pub struct CurrentUser(pub Principal);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: ErrorDetail::new("UNAUTHORIZED", "Authentication required"),
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}
