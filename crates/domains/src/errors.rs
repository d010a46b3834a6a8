//! # DomainError
//!
//! Centralized error handling for prastha.
//! Every business-rule violation surfaces as one of these variants so the
//! caller can render a specific message; nothing is swallowed.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Which kind of entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Thread,
    Message,
    Gossip,
    Comment,
    User,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Thread => "thread",
            Self::Message => "message",
            Self::Gossip => "gossip",
            Self::Comment => "comment",
            Self::User => "user",
        };
        f.write_str(name)
    }
}

/// Why an actor is not allowed to perform a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ForbiddenReason {
    #[error("only thread members can post messages")]
    NotAMember,
    #[error("only the thread creator or an admin can do this")]
    NotCreatorOrAdmin,
    #[error("only the author or an admin can do this")]
    NotAuthorOrAdmin,
    #[error("you cannot report your own comment")]
    SelfReport,
    #[error("admin access required")]
    NotAdmin,
}

/// State transitions that are invalid given the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConflictReason {
    #[error("user is already a member of this thread")]
    AlreadyMember,
    #[error("a join request is already pending")]
    AlreadyPending,
    #[error("no pending join request for this user")]
    NotPending,
    #[error("comment already reported by this user")]
    AlreadyReported,
    #[error("username is already taken")]
    UsernameTaken,
}

/// Input that fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),
    #[error("{field} exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("parent comment {0} not found in this gossip")]
    ParentNotFound(Uuid),
    #[error("invalid expiry: {0}")]
    InvalidExpiry(String),
}

/// The primary error type for all domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Entity id doesn't resolve.
    #[error("{kind} not found with ID {id}")]
    NotFound { kind: EntityKind, id: Uuid },

    /// Actor lacks authorization for the requested mutation.
    #[error("forbidden: {0}")]
    Forbidden(ForbiddenReason),

    /// State transition invalid given current state.
    #[error("conflict: {0}")]
    Conflict(ConflictReason),

    /// Operation attempted on a time-lapsed thread or gossip.
    #[error("{kind} {id} has expired")]
    Expired { kind: EntityKind, id: Uuid },

    #[error("validation error: {0}")]
    Validation(ValidationError),

    /// Store unavailable or failed. Transient; the caller may retry.
    #[error("storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }

    pub fn expired(kind: EntityKind, id: Uuid) -> Self {
        Self::Expired { kind, id }
    }

    pub fn storage(err: impl fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    /// True for infrastructure failures that an idempotent read may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<ForbiddenReason> for DomainError {
    fn from(reason: ForbiddenReason) -> Self {
        Self::Forbidden(reason)
    }
}

impl From<ConflictReason> for DomainError {
    fn from(reason: ConflictReason) -> Self {
        Self::Conflict(reason)
    }
}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

/// A specialized Result type for prastha domain logic.
pub type DomainResult<T> = std::result::Result<T, DomainError>;
