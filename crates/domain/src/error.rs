//! Error types shared across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`AllocationError`] via `#[from]`. The four caller-facing kinds are
//! validation, not-found, capacity, and conflict. Storage failures stay
//! opaque behind a boxed source.

use crate::id::{ProviderId, RegistrationId};

/// Top-level error returned by every domain and application operation.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("capacity conflict")]
    Capacity(#[from] CapacityError),

    #[error("conflicting state")]
    Conflict(#[from] ConflictError),

    #[error("storage error")]
    Storage(Box<dyn std::error::Error + Send + Sync>),
}

/// Input or invariant violations detected before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("code must not be empty")]
    EmptyCode,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{0} must be in the future (after today)")]
    DateNotInFuture(&'static str),

    #[error("{0} cannot be in the past")]
    DateInPast(&'static str),

    #[error("at least one date is required")]
    NoDatesSupplied,

    #[error("registration ids must not be empty")]
    EmptyReorder,

    #[error("registration ids count ({given}) does not match queue size ({expected})")]
    ReorderCountMismatch { expected: usize, given: usize },

    #[error("registration {0} is not part of this queue")]
    ForeignRegistration(RegistrationId),

    #[error("registration {0} is listed more than once")]
    DuplicateRegistration(RegistrationId),
}

/// A referenced record does not exist (or is not in the expected archive state).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// The vehicle/point capacity ratio would be violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("provider {provider_id} has only {vehicles} vehicles but must have {required} vehicles")]
pub struct CapacityError {
    pub provider_id: ProviderId,
    pub vehicles: u64,
    pub required: u64,
}

/// The operation clashes with existing state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("network point code {0:?} already exists")]
    DuplicatePointCode(String),

    #[error("provider code {0:?} already exists")]
    DuplicateProviderCode(String),

    #[error("vehicle with license plate {0:?} already exists")]
    DuplicateLicensePlate(String),

    #[error("cannot delete provider: {vehicles} vehicles and {points} network points still reference it")]
    ProviderInUse { vehicles: u64, points: u64 },

    #[error("{0} is archived")]
    Archived(&'static str),
}

impl AllocationError {
    /// Wrap an arbitrary storage-layer error.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(err))
    }
}
