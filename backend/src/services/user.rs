//! User accounts: creation, role and warehouse assignment

use bcrypt::{hash, DEFAULT_COST};
use serde::Deserialize;
use shared::{validate_assignment, validate_password, Principal, Role, User};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::access::{require_role, ADMIN_ONLY};
use crate::services::stock::ensure_warehouse_exists;

const USER_COLUMNS: &str = "id, username, role, warehouse_id, active, created_at";

#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 3, max = 80))]
    pub username: String,
    pub password: String,
    pub role: Role,
    pub warehouse_id: Option<Uuid>,
}

/// Every field is optional; `warehouse_id: null` is treated as "keep"
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserInput {
    pub password: Option<String>,
    pub role: Option<Role>,
    pub warehouse_id: Option<Uuid>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub warehouse_id: Option<Uuid>,
}

fn hash_password(password: &str) -> AppResult<String> {
    validate_password(password).map_err(|msg| AppError::validation("password", msg))?;
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Admins drop their warehouse; everyone else keeps the requested or current one
fn resolve_warehouse(role: Role, requested: Option<Uuid>, current: Option<Uuid>) -> Option<Uuid> {
    if role.needs_warehouse() {
        requested.or(current)
    } else {
        None
    }
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, actor: &Principal, input: CreateUserInput) -> AppResult<User> {
        require_role(actor, ADMIN_ONLY)?;
        input.validate()?;
        let warehouse_id = resolve_warehouse(input.role, input.warehouse_id, None);
        validate_assignment(input.role, warehouse_id)
            .map_err(|msg| AppError::validation("warehouse_id", msg))?;
        let password_hash = hash_password(&input.password)?;
        let username = input.username.trim();

        let mut conn = self.db.acquire().await?;
        if let Some(warehouse_id) = warehouse_id {
            ensure_warehouse_exists(&mut conn, warehouse_id).await?;
        }

        let taken =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&mut *conn)
                .await?;
        if taken {
            return Err(AppError::Conflict {
                resource: "user".to_string(),
                message: format!("Username '{}' is already taken", username),
            });
        }

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, password_hash, role, warehouse_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(&password_hash)
        .bind(input.role)
        .bind(warehouse_id)
        .fetch_one(&mut *conn)
        .await?;

        tracing::info!(
            user_id = %user.id,
            role = user.role.as_str(),
            created_by = %actor.user_id,
            "User created"
        );
        Ok(user)
    }

    pub async fn list(&self, actor: &Principal, filter: UserFilter) -> AppResult<Vec<User>> {
        require_role(actor, ADMIN_ONLY)?;
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE ($1::user_role IS NULL OR role = $1)
              AND ($2::uuid IS NULL OR warehouse_id = $2)
            ORDER BY username
            "#
        ))
        .bind(filter.role)
        .bind(filter.warehouse_id)
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    pub async fn get(&self, actor: &Principal, id: Uuid) -> AppResult<User> {
        require_role(actor, ADMIN_ONLY)?;
        self.fetch(id).await
    }

    /// Change role, warehouse, password or active flag. Tokens already issued
    /// keep their old claims until they expire.
    pub async fn update(&self, actor: &Principal, id: Uuid, input: UpdateUserInput) -> AppResult<User> {
        require_role(actor, ADMIN_ONLY)?;
        let existing = self.fetch(id).await?;

        let role = input.role.unwrap_or(existing.role);
        let active = input.active.unwrap_or(existing.active);
        if id == actor.user_id && (role != existing.role || !active) {
            return Err(AppError::forbidden(
                "You cannot change your own role or deactivate yourself",
            ));
        }
        let warehouse_id = resolve_warehouse(role, input.warehouse_id, existing.warehouse_id);
        validate_assignment(role, warehouse_id)
            .map_err(|msg| AppError::validation("warehouse_id", msg))?;
        let password_hash = input.password.as_deref().map(hash_password).transpose()?;

        let mut conn = self.db.acquire().await?;
        if let Some(warehouse_id) = input.warehouse_id.filter(|_| role.needs_warehouse()) {
            ensure_warehouse_exists(&mut conn, warehouse_id).await?;
        }

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET role = $2, warehouse_id = $3, active = $4,
                password_hash = COALESCE($5, password_hash)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(role)
        .bind(warehouse_id)
        .bind(active)
        .bind(password_hash)
        .fetch_one(&mut *conn)
        .await?;

        tracing::info!(user_id = %id, role = user.role.as_str(), active = user.active, "User updated");
        Ok(user)
    }

    /// Users referenced by sales or movements cannot be deleted; deactivate them instead
    pub async fn delete(&self, actor: &Principal, id: Uuid) -> AppResult<()> {
        require_role(actor, ADMIN_ONLY)?;
        if id == actor.user_id {
            return Err(AppError::forbidden("You cannot delete your own account"));
        }
        self.fetch(id).await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::info!(user_id = %id, deleted_by = %actor.user_id, "User deleted");
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }
}
