//! # Contract Lifecycle
//!
//! A contract is the binding engagement materialized when a proposal is
//! accepted. It has exactly one constructor, [`Contract::from_accepted_proposal`],
//! which is `pub(crate)`: contracts can only come out of the broker's
//! accept path, never forged from arbitrary inputs.
//!
//! The amount is copied from the accepted proposal's bid at acceptance
//! time. Accepted proposals are terminal and immutable, so the contract
//! amount can never drift afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gig_core::{ActorId, Money};

use crate::error::MarketError;
use crate::job::JobId;
use crate::proposal::{Proposal, ProposalId, ProposalStatus};

/// A unique identifier for a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractId(Uuid);

impl ContractId {
    /// Create a new random contract identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a contract identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ContractId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContractId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "contract:{}", self.0)
    }
}

/// The lifecycle status of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractStatus {
    /// Work in progress.
    Active,
    /// All deliverables approved; engagement finished. Terminal state.
    Completed,
    /// A party raised a dispute. Terminal for this core; resolution is an
    /// external concern.
    Disputed,
}

impl ContractStatus {
    /// The canonical string name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Disputed => "DISPUTED",
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Valid target statuses from this status.
    pub fn valid_transitions(&self) -> &'static [ContractStatus] {
        match self {
            Self::Active => &[Self::Completed, Self::Disputed],
            Self::Completed | Self::Disputed => &[],
        }
    }
}

impl std::fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The binding engagement between a client and a freelancer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    /// Unique contract identifier.
    pub id: ContractId,
    /// The job this contract settles.
    pub job_id: JobId,
    /// The accepted proposal this contract was derived from.
    pub proposal_id: ProposalId,
    /// The client party.
    pub client_id: ActorId,
    /// The freelancer party.
    pub freelancer_id: ActorId,
    /// Engagement amount, copied from the winning bid at acceptance.
    pub amount: Money,
    /// Current lifecycle status.
    pub status: ContractStatus,
    /// When the contract was created (UTC).
    pub created_at: DateTime<Utc>,
    /// When the contract was last updated (UTC).
    pub updated_at: DateTime<Utc>,
}

impl Contract {
    /// Derive a contract from a proposal that has just been accepted.
    ///
    /// Called only from the broker's accept path, after the proposal has
    /// transitioned to Accepted under the job entry lock.
    pub(crate) fn from_accepted_proposal(proposal: &Proposal) -> Self {
        debug_assert_eq!(proposal.status, ProposalStatus::Accepted);
        let now = Utc::now();
        Self {
            id: ContractId::new(),
            job_id: proposal.job_id,
            proposal_id: proposal.id,
            client_id: proposal.client_id,
            freelancer_id: proposal.freelancer_id,
            amount: proposal.bid_amount.clone(),
            status: ContractStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition Active → Completed.
    ///
    /// The cross-entity requirement (all milestones approved or paid) is
    /// checked by the broker before this is called.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidStatus`] unless currently Active.
    pub fn complete(&mut self) -> Result<(), MarketError> {
        self.transition("complete", ContractStatus::Completed)
    }

    /// Transition Active → Disputed.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidStatus`] unless currently Active.
    pub fn dispute(&mut self) -> Result<(), MarketError> {
        self.transition("dispute", ContractStatus::Disputed)
    }

    fn transition(&mut self, operation: &str, to: ContractStatus) -> Result<(), MarketError> {
        if self.status != ContractStatus::Active {
            return Err(MarketError::InvalidStatus {
                entity: "contract",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Budget, BudgetType, Job, NewJob};
    use crate::proposal::NewProposal;

    fn accepted_proposal() -> Proposal {
        let job = Job::create(
            ActorId::new(),
            NewJob {
                title: "API integration".to_string(),
                description: "Connect billing provider".to_string(),
                budget: Budget {
                    amount: Money::new("1000000", "USD").unwrap(),
                    budget_type: BudgetType::Fixed,
                },
            },
        )
        .unwrap();
        let mut proposal = Proposal::submit(
            &job,
            ActorId::new(),
            NewProposal {
                cover_letter: "pitch".to_string(),
                bid_amount: Money::new("800000", "USD").unwrap(),
            },
        )
        .unwrap();
        proposal.accept().unwrap();
        proposal
    }

    #[test]
    fn derived_contract_copies_parties_and_bid() {
        let proposal = accepted_proposal();
        let contract = Contract::from_accepted_proposal(&proposal);
        assert_eq!(contract.status, ContractStatus::Active);
        assert_eq!(contract.amount, proposal.bid_amount);
        assert_eq!(contract.client_id, proposal.client_id);
        assert_eq!(contract.freelancer_id, proposal.freelancer_id);
        assert_eq!(contract.job_id, proposal.job_id);
        assert_eq!(contract.proposal_id, proposal.id);
    }

    #[test]
    fn complete_from_active() {
        let mut contract = Contract::from_accepted_proposal(&accepted_proposal());
        contract.complete().unwrap();
        assert_eq!(contract.status, ContractStatus::Completed);
        assert!(contract.status.is_terminal());
    }

    #[test]
    fn complete_twice_rejected() {
        let mut contract = Contract::from_accepted_proposal(&accepted_proposal());
        contract.complete().unwrap();
        let err = contract.complete().unwrap_err();
        assert_eq!(err.code(), "INVALID_STATUS");
    }

    #[test]
    fn dispute_from_active() {
        let mut contract = Contract::from_accepted_proposal(&accepted_proposal());
        contract.dispute().unwrap();
        assert_eq!(contract.status, ContractStatus::Disputed);
    }

    #[test]
    fn dispute_rejected_after_completion() {
        let mut contract = Contract::from_accepted_proposal(&accepted_proposal());
        contract.complete().unwrap();
        assert!(contract.dispute().is_err());
    }

    #[test]
    fn status_valid_transitions() {
        let from_active = ContractStatus::Active.valid_transitions();
        assert!(from_active.contains(&ContractStatus::Completed));
        assert!(from_active.contains(&ContractStatus::Disputed));
        assert!(ContractStatus::Completed.valid_transitions().is_empty());
        assert!(ContractStatus::Disputed.valid_transitions().is_empty());
    }

    #[test]
    fn contract_serialization_roundtrip() {
        let contract = Contract::from_accepted_proposal(&accepted_proposal());
        let json = serde_json::to_string(&contract).unwrap();
        let back: Contract = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, contract.id);
        assert_eq!(back.amount, contract.amount);
        assert_eq!(back.status, contract.status);
    }
}
