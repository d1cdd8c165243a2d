//! API-side authorization guard for commands.
//!
//! This enforces authorization at the command boundary (before dispatch),
//! while keeping domain aggregates and infra auth-agnostic.

use gasline_auth::{AuthzError, CommandAuthorization, Permission, authorize};

use crate::context::PrincipalContext;

/// Associates the permission a handler requires with the command it will dispatch.
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Permission,
}

impl<C> CmdAuth<C> {
    pub fn new(inner: C, required: &'static str) -> Self {
        Self {
            inner,
            required: Permission::new(required),
        }
    }
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_permission(&self) -> Permission {
        self.required.clone()
    }
}

/// Check authorization for a command in the current request context.
///
/// This is intended to be called **before** dispatching a command.
pub fn authorize_command<C: CommandAuthorization>(
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    authorize(principal.principal(), &command.required_permission())
}

/// Permission check for reads and other handlers without a command.
pub fn require(principal: &PrincipalContext, permission: &'static str) -> Result<(), AuthzError> {
    authorize(principal.principal(), &Permission::new(permission))
}
