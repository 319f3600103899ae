//! # Milestone Lifecycle
//!
//! A milestone is a contract sub-deliverable with its own payment amount
//! and review cycle:
//!
//! ```text
//! Pending ──submit(freelancer)──▶ Submitted ──approve(client)──▶ Approved
//!    ▲                               │                              │
//!    │                               │ request_revision(client)     │ release funds
//!    │                               ▼                              ▼ (auto or explicit)
//!    └────── submit(freelancer) ── RevisionRequested              Paid
//! ```
//!
//! `order` is unique and strictly increasing within a contract; the broker
//! assigns the next sequential value when the caller omits it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gig_core::Money;

use crate::contract::ContractId;
use crate::error::MarketError;

/// A unique identifier for a milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MilestoneId(Uuid);

impl MilestoneId {
    /// Create a new random milestone identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a milestone identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MilestoneId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MilestoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "milestone:{}", self.0)
    }
}

/// The lifecycle status of a milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MilestoneStatus {
    /// Created; work not yet handed in.
    Pending,
    /// Work handed in, awaiting client review.
    Submitted,
    /// Client asked for changes; freelancer may resubmit.
    RevisionRequested,
    /// Client approved the deliverable; payment owed.
    Approved,
    /// The milestone amount has been released from escrow. Terminal state.
    Paid,
}

impl MilestoneStatus {
    /// The canonical string name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Submitted => "SUBMITTED",
            Self::RevisionRequested => "REVISION_REQUESTED",
            Self::Approved => "APPROVED",
            Self::Paid => "PAID",
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid)
    }

    /// Valid target statuses from this status.
    pub fn valid_transitions(&self) -> &'static [MilestoneStatus] {
        match self {
            Self::Pending => &[Self::Submitted],
            Self::Submitted => &[Self::Approved, Self::RevisionRequested],
            Self::RevisionRequested => &[Self::Submitted],
            Self::Approved => &[Self::Paid],
            Self::Paid => &[],
        }
    }
}

impl std::fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for creating a milestone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMilestone {
    /// Short name of the deliverable.
    pub name: String,
    /// Payment amount for this milestone.
    pub amount: Money,
    /// Optional due date.
    pub due_date: Option<DateTime<Utc>>,
    /// Position within the contract; the next sequential value is
    /// assigned when omitted.
    pub order: Option<u32>,
}

/// A contract sub-deliverable with its own payment amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    /// Unique milestone identifier.
    pub id: MilestoneId,
    /// The owning contract.
    pub contract_id: ContractId,
    /// Short name of the deliverable.
    pub name: String,
    /// Payment amount for this milestone.
    pub amount: Money,
    /// Optional due date.
    pub due_date: Option<DateTime<Utc>>,
    /// Position within the contract (unique per contract).
    pub order: u32,
    /// Current lifecycle status.
    pub status: MilestoneStatus,
    /// When the milestone was created (UTC).
    pub created_at: DateTime<Utc>,
    /// When the milestone was last updated (UTC).
    pub updated_at: DateTime<Utc>,
}

impl Milestone {
    /// Create a new milestone in the [`Pending`](MilestoneStatus::Pending)
    /// status. Order uniqueness is the broker's responsibility since it
    /// requires visibility over the contract's other milestones.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] if the name is empty or the
    /// amount is not strictly positive.
    pub fn create(
        contract_id: ContractId,
        input: NewMilestone,
        order: u32,
    ) -> Result<Self, MarketError> {
        if input.name.trim().is_empty() {
            return Err(MarketError::Validation {
                field: "name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if !input.amount.is_positive() {
            return Err(MarketError::Validation {
                field: "amount".to_string(),
                reason: format!("must be positive, got {}", input.amount),
            });
        }
        let now = Utc::now();
        Ok(Self {
            id: MilestoneId::new(),
            contract_id,
            name: input.name,
            amount: input.amount,
            due_date: input.due_date,
            order,
            status: MilestoneStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Hand in work: Pending or RevisionRequested → Submitted.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidStatus`] from any other status.
    pub fn submit(&mut self) -> Result<(), MarketError> {
        if !matches!(
            self.status,
            MilestoneStatus::Pending | MilestoneStatus::RevisionRequested
        ) {
            return Err(self.invalid("submit"));
        }
        self.set_status(MilestoneStatus::Submitted);
        Ok(())
    }

    /// Approve the deliverable: Submitted → Approved.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidStatus`] unless currently Submitted.
    pub fn approve(&mut self) -> Result<(), MarketError> {
        if self.status != MilestoneStatus::Submitted {
            return Err(self.invalid("approve"));
        }
        self.set_status(MilestoneStatus::Approved);
        Ok(())
    }

    /// Ask for changes: Submitted → RevisionRequested.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidStatus`] unless currently Submitted.
    pub fn request_revision(&mut self) -> Result<(), MarketError> {
        if self.status != MilestoneStatus::Submitted {
            return Err(self.invalid("request_revision"));
        }
        self.set_status(MilestoneStatus::RevisionRequested);
        Ok(())
    }

    /// Record the escrow release: Approved → Paid.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidStatus`] unless currently Approved.
    pub fn mark_paid(&mut self) -> Result<(), MarketError> {
        if self.status != MilestoneStatus::Approved {
            return Err(self.invalid("mark_paid"));
        }
        self.set_status(MilestoneStatus::Paid);
        Ok(())
    }

    fn set_status(&mut self, to: MilestoneStatus) {
        self.status = to;
        self.updated_at = Utc::now();
    }

    fn invalid(&self, operation: &str) -> MarketError {
        MarketError::InvalidStatus {
            entity: "milestone",
            id: self.id.to_string(),
            operation: operation.to_string(),
            status: self.status.as_str().to_string(),
        }
    }
}
