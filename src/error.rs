//! Typed failures of the core operations.
//!
//! The web layer maps each variant to a status code; none of them is fatal.

use crate::permissions::Permissions;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("missing capability {needed}")]
    Unauthorized { needed: Permissions },

    #[error("only the author may change this {0}")]
    Forbidden(&'static str),

    #[error("already following this user")]
    AlreadyFollowing,

    #[error("not following this user")]
    NotFollowing,

    #[error("invalid follow target: {0}")]
    InvalidTarget(&'static str),

    #[error("content must not be empty")]
    EmptyContent,

    #[error("username `{0}` is already taken")]
    UsernameTaken(String),

    #[error("email `{0}` is already registered")]
    EmailTaken(String),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error(transparent)]
    Validation(#[from] validator::ValidationErrors),

    #[error("malformed stored value: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

impl CoreError {
    /// Stable machine-readable code for adapters.
    pub fn code(&self) -> &'static str {
        use CoreError::*;
        match self {
            NotFound(_) => "not_found",
            Unauthorized { .. } => "unauthorized",
            Forbidden(_) => "forbidden",
            AlreadyFollowing => "already_following",
            NotFollowing => "not_following",
            InvalidTarget(_) => "invalid_target",
            EmptyContent => "empty_content",
            UsernameTaken(_) => "username_taken",
            EmailTaken(_) => "email_taken",
            Invalid { .. } | Validation(_) => "invalid",
            Corrupt(_) | Storage(_) => "internal_error",
        }
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

pub(crate) fn is_check_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_check_violation())
}
