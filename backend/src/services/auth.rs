//! Authentication service: password login and token issuance

use bcrypt::verify;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use shared::{Principal, Role};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::Claims;

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    access_token_expiry: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(length(min = 1, max = 80))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Token handed back on a successful login
#[derive(Debug, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: Principal,
}

/// User info from database
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    password_hash: String,
    role: Role,
    warehouse_id: Option<Uuid>,
    active: bool,
}

impl AuthService {
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
        }
    }

    /// Verify a username and password and issue an access token
    pub async fn login(&self, input: LoginInput) -> AppResult<AuthTokens> {
        input.validate()?;

        let user = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, password_hash, role, warehouse_id, active
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(input.username.trim())
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        if !user.active {
            return Err(AppError::Unauthorized("Account is disabled".to_string()));
        }

        let valid = verify(&input.password, &user.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
        if !valid {
            tracing::debug!(username = %input.username, "Rejected login");
            return Err(AppError::InvalidCredentials);
        }

        let principal = Principal {
            user_id: user.id,
            role: user.role,
            warehouse_id: user.warehouse_id,
        };
        let access_token = self.issue_token(&principal)?;

        tracing::info!(user_id = %user.id, role = principal.role.as_str(), "User logged in");
        Ok(AuthTokens {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
            user: principal,
        })
    }

    fn issue_token(&self, principal: &Principal) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: principal.user_id.to_string(),
            role: principal.role,
            warehouse_id: principal.warehouse_id.map(|w| w.to_string()),
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }
}
