//! Domain error model shared by every aggregate.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic business failures raised while handling a command.
///
/// Storage and transport failures never show up here; infra wraps them in its
/// own error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-range input (bad spec label, score of 7).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The command is well-formed but the aggregate's state forbids it.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Never created, or removed.
    #[error("not found")]
    NotFound,

    /// Duplicate creation, a second rating, or a stale expected version.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller is not the party the aggregate expects (rating someone else's order).
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// A lifecycle move the status table does not allow.
    pub fn illegal_transition(
        what: &str,
        from: impl core::fmt::Display,
        to: impl core::fmt::Display,
    ) -> Self {
        Self::InvariantViolation(format!("cannot move {what} from {from} to {to}"))
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_errors_name_both_states() {
        let err = DomainError::illegal_transition("order", "completed", "pending");
        assert_eq!(
            err.to_string(),
            "invariant violated: cannot move order from completed to pending"
        );
    }
}
