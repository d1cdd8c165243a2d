use thiserror::Error;

use gasline_core::UserId;

use crate::{Permission, Role, role_permissions};

/// A fully resolved principal for authorization decisions.
///
/// Construction is decoupled from storage and transport: the API derives it from
/// verified claims plus the current users read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn new(user_id: UserId, username: impl Into<String>, role: Role) -> Self {
        Self {
            user_id,
            username: username.into(),
            role,
            permissions: role_permissions(role),
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Command-side authorization contract (checked at the command boundary).
///
/// The API enforces these requirements before dispatching.
pub trait CommandAuthorization {
    fn required_permission(&self) -> Permission;
}

/// Authorize a principal for a single permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let granted = principal
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> Principal {
        Principal::new(UserId::new(), "tester", role)
    }

    #[test]
    fn admin_wildcard_grants_everything() {
        let p = principal(Role::Admin);
        assert!(authorize(&p, &Permission::new("users.write")).is_ok());
        assert!(authorize(&p, &Permission::new("anything.at.all")).is_ok());
    }

    #[test]
    fn station_cannot_manage_users_or_announcements() {
        let p = principal(Role::Station);
        assert!(authorize(&p, &Permission::new("users.read")).is_ok());
        assert_eq!(
            authorize(&p, &Permission::new("users.write")),
            Err(AuthzError::Forbidden("users.write".to_string()))
        );
        assert!(authorize(&p, &Permission::new("announcements.write")).is_err());
    }

    #[test]
    fn courier_files_inspections_but_cannot_rectify() {
        let p = principal(Role::Delivery);
        assert!(authorize(&p, &Permission::new("safety.write")).is_ok());
        assert!(authorize(&p, &Permission::new("safety.rectify")).is_err());
        assert!(authorize(&p, &Permission::new("orders.assign")).is_err());
    }

    #[test]
    fn only_customers_rate_orders() {
        assert!(authorize(&principal(Role::User), &Permission::new("ratings.write")).is_ok());
        assert!(authorize(&principal(Role::Station), &Permission::new("ratings.write")).is_err());
        assert!(authorize(&principal(Role::User), &Permission::new("stats.read")).is_err());
    }
}
