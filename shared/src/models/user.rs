//! Users, roles and the authenticated principal

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "user_role", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Gerente,
    Usuario,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Gerente => "gerente",
            Role::Usuario => "usuario",
        }
    }

    /// Non-admins only ever see one warehouse, so they must be given one
    pub fn needs_warehouse(&self) -> bool {
        !matches!(self, Role::Admin)
    }
}

/// A login account as returned by the API; the password hash never leaves the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub warehouse_id: Option<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Check that a role and warehouse assignment fit together
pub fn validate_assignment(role: Role, warehouse_id: Option<Uuid>) -> Result<(), &'static str> {
    if role.needs_warehouse() && warehouse_id.is_none() {
        return Err("Gerente and usuario accounts must be assigned a warehouse");
    }
    Ok(())
}

/// An already-authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    /// Warehouse a non-admin user is pinned to
    pub warehouse_id: Option<Uuid>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    /// Admins reach every warehouse; everyone else only the one in their claims
    pub fn can_access_warehouse(&self, warehouse_id: Uuid) -> bool {
        self.is_admin() || self.warehouse_id == Some(warehouse_id)
    }

    /// Warehouse filter to apply on list queries, `None` meaning unrestricted.
    /// A non-admin without a warehouse claim gets the nil id and matches nothing.
    pub fn warehouse_filter(&self, requested: Option<Uuid>) -> Option<Uuid> {
        if self.is_admin() {
            requested
        } else {
            Some(self.warehouse_id.unwrap_or(Uuid::nil()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_admin_is_pinned_to_claim_warehouse() {
        let home = Uuid::new_v4();
        let other = Uuid::new_v4();
        let user = Principal {
            user_id: Uuid::new_v4(),
            role: Role::Usuario,
            warehouse_id: Some(home),
        };
        assert!(user.can_access_warehouse(home));
        assert!(!user.can_access_warehouse(other));
        assert_eq!(user.warehouse_filter(Some(other)), Some(home));

        let admin = Principal {
            role: Role::Admin,
            warehouse_id: None,
            ..user
        };
        assert!(admin.can_access_warehouse(other));
        assert_eq!(admin.warehouse_filter(None), None);
    }

    #[test]
    fn only_admins_may_go_without_warehouse() {
        assert!(validate_assignment(Role::Admin, None).is_ok());
        assert!(validate_assignment(Role::Gerente, None).is_err());
        assert!(validate_assignment(Role::Usuario, Some(Uuid::new_v4())).is_ok());
    }
}
