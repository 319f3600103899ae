//! # Authorization Guard
//!
//! Stateless allow/deny decisions for every operation on the engagement
//! surface. The guard maps `(actor, role, operation, resource ownership)`
//! to `Ok(())` or a [`MarketError::Forbidden`] and performs no side
//! effects; callers must evaluate it *before* attempting any transition,
//! never interleaved with one.
//!
//! Ownership rules are id-based, not role-based: a freelancer who also
//! happens to hold a client account elsewhere is still denied when acting
//! on their own submitted proposal (self-dealing).

use gig_core::{Actor, ActorId, Role};

use crate::error::MarketError;

/// The operations exposed by the engagement core.
///
/// Closed enum so authorization coverage is exhaustive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateJob,
    UpdateJob,
    CloseJob,
    DeleteJob,
    SubmitProposal,
    AcceptProposal,
    RejectProposal,
    WithdrawProposal,
    CompleteContract,
    DisputeContract,
    CreateMilestone,
    SubmitMilestone,
    ApproveMilestone,
    RequestRevision,
    ReleaseMilestone,
    FundEscrow,
    ReleaseEscrow,
    RefundEscrow,
}

impl Operation {
    /// The canonical dotted operation name (e.g. `proposal.accept`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateJob => "job.create",
            Self::UpdateJob => "job.update",
            Self::CloseJob => "job.close",
            Self::DeleteJob => "job.delete",
            Self::SubmitProposal => "proposal.submit",
            Self::AcceptProposal => "proposal.accept",
            Self::RejectProposal => "proposal.reject",
            Self::WithdrawProposal => "proposal.withdraw",
            Self::CompleteContract => "contract.complete",
            Self::DisputeContract => "contract.dispute",
            Self::CreateMilestone => "milestone.create",
            Self::SubmitMilestone => "milestone.submit",
            Self::ApproveMilestone => "milestone.approve",
            Self::RequestRevision => "milestone.request_revision",
            Self::ReleaseMilestone => "milestone.release",
            Self::FundEscrow => "escrow.fund",
            Self::ReleaseEscrow => "escrow.release",
            Self::RefundEscrow => "escrow.refund",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Require that the actor holds the given role.
pub fn require_role(actor: &Actor, role: Role, op: Operation) -> Result<(), MarketError> {
    if actor.role != role {
        return Err(deny(
            actor.id,
            op,
            format!("requires the {role} role, actor holds {}", actor.role),
        ));
    }
    Ok(())
}

/// Require that the actor is the owning client of the resource.
pub fn require_client_owner(
    actor: &Actor,
    client_id: ActorId,
    op: Operation,
) -> Result<(), MarketError> {
    if actor.id != client_id {
        return Err(deny(
            actor.id,
            op,
            "only the owning client may perform this operation".to_string(),
        ));
    }
    Ok(())
}

/// Require that the actor is the engaged freelancer of the resource.
pub fn require_freelancer_owner(
    actor: &Actor,
    freelancer_id: ActorId,
    op: Operation,
) -> Result<(), MarketError> {
    if actor.id != freelancer_id {
        return Err(deny(
            actor.id,
            op,
            "only the engaged freelancer may perform this operation".to_string(),
        ));
    }
    Ok(())
}

/// Require that the actor is one of the two contract parties.
pub fn require_contract_party(
    actor: &Actor,
    client_id: ActorId,
    freelancer_id: ActorId,
    op: Operation,
) -> Result<(), MarketError> {
    if actor.id != client_id && actor.id != freelancer_id {
        return Err(deny(
            actor.id,
            op,
            "only a party to the contract may perform this operation".to_string(),
        ));
    }
    Ok(())
}

/// Reject self-dealing: the actor may not act on both sides of the deal.
///
/// Applied to proposal accept/reject (the submitting freelancer may never
/// decide their own proposal) and proposal submission (a client may not
/// bid on their own job). Checked regardless of the actor's current role.
pub fn deny_self_dealing(
    actor: &Actor,
    counterparty_id: ActorId,
    op: Operation,
) -> Result<(), MarketError> {
    if actor.id == counterparty_id {
        return Err(deny(
            actor.id,
            op,
            "actor may not act on both sides of the engagement".to_string(),
        ));
    }
    Ok(())
}

fn deny(actor: ActorId, op: Operation, reason: String) -> MarketError {
    MarketError::Forbidden {
        actor: actor.to_string(),
        operation: op.as_str().to_string(),
        reason,
    }
}
