//! # Proposal Lifecycle
//!
//! A proposal is a freelancer's bid against an open job. Its state machine:
//!
//! ```text
//! Pending ──accept()───▶ Accepted
//!    │
//!    ├──reject()───▶ Rejected
//!    └──withdraw()─▶ Withdrawn
//! ```
//!
//! Accepted, Rejected, and Withdrawn are terminal and immutable. Exactly
//! one proposal per job may ever reach Accepted; that invariant is
//! enforced by the broker gating `accept` on the job's OPEN status, not
//! only on the proposal's own status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gig_core::{ActorId, Money};

use crate::error::MarketError;
use crate::job::{Job, JobId};

/// A unique identifier for a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalId(Uuid);

impl ProposalId {
    /// Create a new random proposal identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a proposal identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ProposalId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProposalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "proposal:{}", self.0)
    }
}

/// The lifecycle status of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    /// Awaiting the client's decision.
    Pending,
    /// Accepted by the client; a contract was derived. Terminal state.
    Accepted,
    /// Rejected by the client. Terminal state.
    Rejected,
    /// Withdrawn by the submitting freelancer. Terminal state.
    Withdrawn,
}

impl ProposalStatus {
    /// The canonical string name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::Withdrawn => "WITHDRAWN",
        }
    }

    /// Whether this status is terminal (no further transitions allowed).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Valid target statuses from this status.
    pub fn valid_transitions(&self) -> &'static [ProposalStatus] {
        match self {
            Self::Pending => &[Self::Accepted, Self::Rejected, Self::Withdrawn],
            Self::Accepted | Self::Rejected | Self::Withdrawn => &[],
        }
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for submitting a proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProposal {
    /// The freelancer's pitch.
    pub cover_letter: String,
    /// The bid amount.
    pub bid_amount: Money,
}

/// A freelancer's bid against a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    /// Unique proposal identifier.
    pub id: ProposalId,
    /// The job this proposal is bound to.
    pub job_id: JobId,
    /// The submitting freelancer.
    pub freelancer_id: ActorId,
    /// The job's owning client, denormalized at submission time so
    /// authorization checks need no job lookup.
    pub client_id: ActorId,
    /// The bid amount.
    pub bid_amount: Money,
    /// The freelancer's pitch.
    pub cover_letter: String,
    /// Current lifecycle status.
    pub status: ProposalStatus,
    /// When the proposal was submitted (UTC).
    pub created_at: DateTime<Utc>,
    /// When the proposal was last updated (UTC).
    pub updated_at: DateTime<Utc>,
}

impl Proposal {
    /// Submit a new proposal against an open job.
    ///
    /// This is the only constructor. The caller (the broker) is
    /// responsible for the existence and OPEN checks on the job; this
    /// validates the proposal's own fields.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] if the cover letter is empty or
    /// the bid is not strictly positive.
    pub fn submit(
        job: &Job,
        freelancer_id: ActorId,
        input: NewProposal,
    ) -> Result<Self, MarketError> {
        if input.cover_letter.trim().is_empty() {
            return Err(MarketError::Validation {
                field: "cover_letter".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if !input.bid_amount.is_positive() {
            return Err(MarketError::Validation {
                field: "bid_amount".to_string(),
                reason: format!("must be positive, got {}", input.bid_amount),
            });
        }
        let now = Utc::now();
        Ok(Self {
            id: ProposalId::new(),
            job_id: job.id,
            freelancer_id,
            client_id: job.client_id,
            bid_amount: input.bid_amount,
            cover_letter: input.cover_letter,
            status: ProposalStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Transition Pending → Accepted.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidStatus`] unless currently Pending.
    /// A retried accept on an already-Accepted proposal is rejected, not
    /// silently absorbed: a second accept must never mint a second
    /// contract.
    pub fn accept(&mut self) -> Result<(), MarketError> {
        self.transition("accept", ProposalStatus::Accepted)
    }

    /// Transition Pending → Rejected. Never cascades to sibling proposals.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidStatus`] unless currently Pending.
    pub fn reject(&mut self) -> Result<(), MarketError> {
        self.transition("reject", ProposalStatus::Rejected)
    }

    /// Transition Pending → Withdrawn.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidStatus`] unless currently Pending.
    pub fn withdraw(&mut self) -> Result<(), MarketError> {
        self.transition("withdraw", ProposalStatus::Withdrawn)
    }

    /// Expected-current-status guard: Pending → `to`, everything else is
    /// rejected with the current status in the error.
    fn transition(&mut self, operation: &str, to: ProposalStatus) -> Result<(), MarketError> {
        if self.status != ProposalStatus::Pending {
            return Err(MarketError::InvalidStatus {
                entity: "proposal",
                id: self.id.to_string(),
                operation: operation.to_string(),
                status: self.status.as_str().to_string(),
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}
