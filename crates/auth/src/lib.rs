//! `gasline-auth` — authentication/authorization boundary.
//!
//! This crate is decoupled from HTTP and storage: it knows roles, permissions,
//! tokens, password hashes and the `User` aggregate, nothing about axum.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod revocation;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256Jwt, JwtValidator, TokenError};
pub use password::{PasswordError, check_policy, hash_password, verify_password};
pub use permissions::{Permission, role_permissions};
pub use revocation::RevocationList;
pub use roles::Role;
pub use user::{
    ChangePassword, PasswordChanged, ProfileUpdated, RegisterUser, RemoveUser, UpdateProfile, User,
    UserCommand, UserEvent, UserRegistered, UserRemoved,
};
