//! Authorization checks
//!
//! Called explicitly at the top of each service operation so that the rules
//! hold whatever route or job invokes the service.

use shared::{Principal, Role};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Roles allowed to run management operations
pub const MANAGERS: &[Role] = &[Role::Admin, Role::Gerente];

pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

pub fn require_role(actor: &Principal, roles: &[Role]) -> AppResult<()> {
    if actor.has_role(roles) {
        Ok(())
    } else {
        let allowed: Vec<&str> = roles.iter().map(Role::as_str).collect();
        Err(AppError::forbidden(format!(
            "Requires one of the roles: {}",
            allowed.join(", ")
        )))
    }
}

pub fn ensure_warehouse_scope(actor: &Principal, warehouse_id: Uuid) -> AppResult<()> {
    if actor.can_access_warehouse(warehouse_id) {
        Ok(())
    } else {
        Err(AppError::forbidden(
            "You can only operate on your assigned warehouse",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role, warehouse_id: Option<Uuid>) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            role,
            warehouse_id,
        }
    }

    #[test]
    fn role_gate() {
        assert!(require_role(&principal(Role::Gerente, None), MANAGERS).is_ok());
        assert!(matches!(
            require_role(&principal(Role::Usuario, None), MANAGERS),
            Err(AppError::Forbidden(_))
        ));
        assert!(require_role(&principal(Role::Gerente, None), ADMIN_ONLY).is_err());
    }

    #[test]
    fn warehouse_scope() {
        let home = Uuid::new_v4();
        let user = principal(Role::Usuario, Some(home));
        assert!(ensure_warehouse_scope(&user, home).is_ok());
        assert!(ensure_warehouse_scope(&user, Uuid::new_v4()).is_err());
        assert!(ensure_warehouse_scope(&principal(Role::Admin, None), home).is_ok());
        assert!(ensure_warehouse_scope(&principal(Role::Gerente, None), home).is_err());
    }
}
