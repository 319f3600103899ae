//! # Market Error Types
//!
//! Structured error hierarchy for the engagement core. Every variant
//! carries diagnostic context: the entity involved, the state at the time
//! of failure, and the operation that was rejected.
//!
//! All failures are local and recoverable: an error guarantees that no
//! state was mutated, because every operation validates its preconditions
//! before performing any write. Callers own retry policy; retrying an
//! already-applied transition fails `InvalidStatus` without side effects.

use thiserror::Error;

use gig_core::MoneyError;

/// Errors arising from engagement operations.
///
/// Each variant maps to a canonical machine-readable code via
/// [`MarketError::code`] for use by transport layers.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Malformed or missing input. Never mutates state.
    #[error("validation error on {field}: {reason}")]
    Validation {
        /// The offending input field.
        field: String,
        /// Why the input was rejected.
        reason: String,
    },

    /// A referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// The entity kind (e.g., "job", "proposal").
        entity: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },

    /// Authorization denial. The guard performs no side effects.
    #[error("actor {actor} may not {operation}: {reason}")]
    Forbidden {
        /// The denied actor.
        actor: String,
        /// The attempted operation.
        operation: String,
        /// Why the actor was denied.
        reason: String,
    },

    /// The job is not open for the attempted operation.
    #[error("job {job_id} is not open (status {status})")]
    JobNotOpen {
        /// The job identifier.
        job_id: String,
        /// The job's current status.
        status: String,
    },

    /// Precondition on an entity's state machine not met.
    #[error("cannot {operation} {entity} {id} in {status} status")]
    InvalidStatus {
        /// The entity kind.
        entity: &'static str,
        /// The entity identifier.
        id: String,
        /// The attempted operation.
        operation: String,
        /// The entity's current status.
        status: String,
    },

    /// Escrow balance cannot cover the requested release.
    #[error(
        "release of {requested} exceeds remaining balance {remaining} for escrow {escrow_id}"
    )]
    InsufficientFunds {
        /// The escrow identifier.
        escrow_id: String,
        /// The requested release amount (minor units).
        requested: String,
        /// The remaining balance (minor units).
        remaining: String,
    },

    /// Cross-entity consistency requirement not met.
    #[error("precondition failed for {entity} {id}: {reason}")]
    PreconditionFailed {
        /// The entity kind.
        entity: &'static str,
        /// The entity identifier.
        id: String,
        /// The unmet requirement.
        reason: String,
    },
}

impl MarketError {
    /// The canonical machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::JobNotOpen { .. } => "JOB_NOT_OPEN",
            Self::InvalidStatus { .. } => "INVALID_STATUS",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::PreconditionFailed { .. } => "PRECONDITION_FAILED",
        }
    }
}

impl From<MoneyError> for MarketError {
    fn from(err: MoneyError) -> Self {
        Self::Validation {
            field: "amount".to_string(),
            reason: err.to_string(),
        }
    }
}
