use chrono::{DateTime, Utc};
use uuid::Uuid;

use gasline_auth::{Principal, Role};
use gasline_core::UserId;

/// Principal context for a request (authenticated identity + role).
///
/// Built by the auth middleware from the verified token and the current users
/// read model, so role changes apply to tokens already issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
    token_id: Uuid,
    token_expires_at: DateTime<Utc>,
}

impl PrincipalContext {
    pub fn new(principal: Principal, token_id: Uuid, token_expires_at: DateTime<Utc>) -> Self {
        Self {
            principal,
            token_id,
            token_expires_at,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn username(&self) -> &str {
        &self.principal.username
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }

    pub fn is_staff(&self) -> bool {
        self.principal.is_staff()
    }

    pub fn token_id(&self) -> Uuid {
        self.token_id
    }

    pub fn token_expires_at(&self) -> DateTime<Utc> {
        self.token_expires_at
    }
}
