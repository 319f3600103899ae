// SPDX-License-Identifier: BUSL-1.1
//! # Engagement Broker
//!
//! In-memory engagement lifecycle coordinator backed by `DashMap`.
//! Owns the keyed stores for jobs, proposals, contracts, milestones, and
//! escrows, and every operation that spans more than one entity.
//!
//! Entity state machines live on the entity structs; the broker adds
//! authorization, existence checks, and cross-entity atomicity. Mutations
//! take the entry write lock (`get_mut`), re-validate the expected current
//! status under the lock, then write, so read-validate-write runs as one
//! unit and a lost race surfaces as INVALID_STATUS or JOB_NOT_OPEN rather
//! than a double apply.
//!
//! Cross-entity operations take locks in a fixed order:
//!
//! ```text
//! jobs → proposals → contracts → milestones → escrows
//! ```
//!
//! The accept path holds the job entry lock across the proposal
//! transition, the contract insertion, and the job closure; proposal
//! submission and job deletion serialize on the same lock, so a job can
//! never gain a proposal while being deleted and at most one proposal per
//! job ever wins.

use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use tracing::{info, warn};

use gig_core::{Actor, Money, Role};

use crate::auth::{
    deny_self_dealing, require_client_owner, require_contract_party, require_freelancer_owner,
    require_role, Operation,
};
use crate::contract::{Contract, ContractId, ContractStatus};
use crate::error::MarketError;
use crate::escrow::{Escrow, EscrowId};
use crate::job::{Job, JobId, JobUpdate, NewJob};
use crate::milestone::{Milestone, MilestoneId, MilestoneStatus, NewMilestone};
use crate::proposal::{NewProposal, Proposal, ProposalId, ProposalStatus};

/// Everything materialized by a successful proposal acceptance.
///
/// The three records were written as one logical unit under the job entry
/// lock: the proposal is ACCEPTED, the contract is ACTIVE, and the job is
/// CLOSED.
#[derive(Debug, Clone)]
pub struct ProposalAcceptance {
    /// The accepted proposal.
    pub proposal: Proposal,
    /// The contract derived from the winning bid.
    pub contract: Contract,
    /// The job, now closed to further proposals.
    pub job: Job,
}

/// Outcome of a milestone approval or explicit release.
#[derive(Debug, Clone)]
pub struct MilestoneApproval {
    /// The milestone after the operation (APPROVED, or PAID when funds
    /// were released).
    pub milestone: Milestone,
    /// The escrow after release. `None` when no release occurred because
    /// the contract has no escrow or its balance cannot cover the amount.
    pub escrow: Option<Escrow>,
}

/// In-memory engagement lifecycle coordinator.
///
/// Thread-safe via `DashMap`; no global lock, unrelated entities never
/// contend.
pub struct EngagementBroker {
    jobs: DashMap<JobId, Job>,
    proposals: DashMap<ProposalId, Proposal>,
    contracts: DashMap<ContractId, Contract>,
    milestones: DashMap<MilestoneId, Milestone>,
    escrows: DashMap<EscrowId, Escrow>,
    /// One escrow per contract; writes go through the contract entry lock.
    escrow_by_contract: DashMap<ContractId, EscrowId>,
}

impl EngagementBroker {
    /// Create a new empty broker.
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
            proposals: DashMap::new(),
            contracts: DashMap::new(),
            milestones: DashMap::new(),
            escrows: DashMap::new(),
            escrow_by_contract: DashMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Jobs
    // -----------------------------------------------------------------------

    /// Post a new job. Client role required.
    pub fn create_job(&self, actor: &Actor, input: NewJob) -> Result<Job, MarketError> {
        require_role(actor, Role::Client, Operation::CreateJob)?;
        let job = Job::create(actor.id, input)?;
        info!(job_id = %job.id, client_id = %job.client_id, "job created");
        self.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    /// Fetch a job by id.
    pub fn get_job(&self, job_id: JobId) -> Result<Job, MarketError> {
        self.jobs
            .get(&job_id)
            .map(|entry| entry.clone())
            .ok_or(MarketError::NotFound {
                entity: "job",
                id: job_id.to_string(),
            })
    }

    /// All jobs, newest first.
    pub fn list_jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.iter().map(|entry| entry.clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Update an open job. Owner only; closed jobs are immutable.
    pub fn update_job(
        &self,
        job_id: JobId,
        actor: &Actor,
        update: JobUpdate,
    ) -> Result<Job, MarketError> {
        let mut entry = self.lock_job(job_id)?;
        require_client_owner(actor, entry.client_id, Operation::UpdateJob)?;
        entry.apply_update(update)?;
        info!(job_id = %job_id, "job updated");
        Ok(entry.clone())
    }

    /// Close a job to further proposals. Owner only.
    pub fn close_job(&self, job_id: JobId, actor: &Actor) -> Result<Job, MarketError> {
        let mut entry = self.lock_job(job_id)?;
        require_client_owner(actor, entry.client_id, Operation::CloseJob)?;
        entry.close()?;
        info!(job_id = %job_id, "job closed");
        Ok(entry.clone())
    }

    /// Delete a job. Owner only; restricted to OPEN jobs with no attached
    /// proposals, so deletion never strands a proposal or contract.
    pub fn delete_job(&self, job_id: JobId, actor: &Actor) -> Result<Job, MarketError> {
        let mut outcome: Result<(), MarketError> = Err(MarketError::NotFound {
            entity: "job",
            id: job_id.to_string(),
        });
        // remove_if runs the predicate under the entry write lock, which
        // proposal submission also takes, so the no-proposals check cannot
        // race a concurrent submit.
        let removed = self.jobs.remove_if(&job_id, |_, job| {
            outcome = (|| {
                require_client_owner(actor, job.client_id, Operation::DeleteJob)?;
                if !job.is_open() {
                    return Err(MarketError::InvalidStatus {
                        entity: "job",
                        id: job_id.to_string(),
                        operation: "delete".to_string(),
                        status: job.status.as_str().to_string(),
                    });
                }
                let attached = self
                    .proposals
                    .iter()
                    .filter(|p| p.job_id == job_id)
                    .count();
                if attached > 0 {
                    return Err(MarketError::PreconditionFailed {
                        entity: "job",
                        id: job_id.to_string(),
                        reason: format!("{attached} proposal(s) attached"),
                    });
                }
                Ok(())
            })();
            outcome.is_ok()
        });
        outcome?;
        let (_, job) = removed.ok_or(MarketError::NotFound {
            entity: "job",
            id: job_id.to_string(),
        })?;
        info!(job_id = %job_id, "job deleted");
        Ok(job)
    }

    // -----------------------------------------------------------------------
    // Proposals
    // -----------------------------------------------------------------------

    /// Submit a proposal against an open job. Freelancer role required;
    /// the job's owner may not bid on their own posting.
    pub fn submit_proposal(
        &self,
        job_id: JobId,
        actor: &Actor,
        input: NewProposal,
    ) -> Result<Proposal, MarketError> {
        require_role(actor, Role::Freelancer, Operation::SubmitProposal)?;
        // Entry write lock even though the job is not mutated: serializes
        // submission against accept and delete on the same job.
        let entry = self.lock_job(job_id)?;
        if !entry.is_open() {
            return Err(MarketError::JobNotOpen {
                job_id: job_id.to_string(),
                status: entry.status.as_str().to_string(),
            });
        }
        deny_self_dealing(actor, entry.client_id, Operation::SubmitProposal)?;
        let proposal = Proposal::submit(&entry, actor.id, input)?;
        info!(
            proposal_id = %proposal.id,
            job_id = %job_id,
            freelancer_id = %actor.id,
            "proposal submitted"
        );
        self.proposals.insert(proposal.id, proposal.clone());
        Ok(proposal)
    }

    /// Fetch a proposal by id.
    pub fn get_proposal(&self, proposal_id: ProposalId) -> Result<Proposal, MarketError> {
        self.proposals
            .get(&proposal_id)
            .map(|entry| entry.clone())
            .ok_or(MarketError::NotFound {
                entity: "proposal",
                id: proposal_id.to_string(),
            })
    }

    /// All proposals bound to a job, oldest first.
    pub fn list_proposals_for_job(&self, job_id: JobId) -> Result<Vec<Proposal>, MarketError> {
        if !self.jobs.contains_key(&job_id) {
            return Err(MarketError::NotFound {
                entity: "job",
                id: job_id.to_string(),
            });
        }
        let mut proposals: Vec<Proposal> = self
            .proposals
            .iter()
            .filter(|p| p.job_id == job_id)
            .map(|p| p.clone())
            .collect();
        proposals.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(proposals)
    }

    /// Accept a proposal: proposal → ACCEPTED, contract created, job →
    /// CLOSED, as one logical unit under the job entry lock.
    ///
    /// The job's OPEN status is the exclusivity gate. Of two concurrent
    /// accepts on proposals for the same job exactly one wins; the loser
    /// observes the closed job and fails JOB_NOT_OPEN. A retried accept on
    /// the winner fails INVALID_STATUS and never mints a second contract.
    /// Sibling PENDING proposals are left untouched.
    pub fn accept_proposal(
        &self,
        proposal_id: ProposalId,
        actor: &Actor,
    ) -> Result<ProposalAcceptance, MarketError> {
        let job_id = self.get_proposal(proposal_id)?.job_id;

        let mut job_entry = self.lock_job(job_id)?;
        let mut proposal_entry =
            self.proposals
                .get_mut(&proposal_id)
                .ok_or(MarketError::NotFound {
                    entity: "proposal",
                    id: proposal_id.to_string(),
                })?;

        require_client_owner(actor, proposal_entry.client_id, Operation::AcceptProposal)?;
        deny_self_dealing(actor, proposal_entry.freelancer_id, Operation::AcceptProposal)?;
        // A retried accept on the winner reports the proposal's terminal
        // status; only a still-PENDING sibling sees the closed job.
        if proposal_entry.status != ProposalStatus::Pending {
            return Err(MarketError::InvalidStatus {
                entity: "proposal",
                id: proposal_id.to_string(),
                operation: "accept".to_string(),
                status: proposal_entry.status.as_str().to_string(),
            });
        }
        if !job_entry.is_open() {
            return Err(MarketError::JobNotOpen {
                job_id: job_id.to_string(),
                status: job_entry.status.as_str().to_string(),
            });
        }

        // Known PENDING under the held lock; cannot fail.
        proposal_entry.accept()?;
        let contract = Contract::from_accepted_proposal(&proposal_entry);
        self.contracts.insert(contract.id, contract.clone());
        // Known open under the held lock; cannot fail.
        job_entry.close()?;

        info!(
            proposal_id = %proposal_id,
            contract_id = %contract.id,
            job_id = %job_id,
            "proposal accepted"
        );
        Ok(ProposalAcceptance {
            proposal: proposal_entry.clone(),
            contract,
            job: job_entry.clone(),
        })
    }

    /// Reject a proposal. Job owner only; never cascades to siblings.
    pub fn reject_proposal(
        &self,
        proposal_id: ProposalId,
        actor: &Actor,
    ) -> Result<Proposal, MarketError> {
        let mut entry = self
            .proposals
            .get_mut(&proposal_id)
            .ok_or(MarketError::NotFound {
                entity: "proposal",
                id: proposal_id.to_string(),
            })?;
        require_client_owner(actor, entry.client_id, Operation::RejectProposal)?;
        deny_self_dealing(actor, entry.freelancer_id, Operation::RejectProposal)?;
        entry.reject()?;
        info!(proposal_id = %proposal_id, "proposal rejected");
        Ok(entry.clone())
    }

    /// Withdraw a proposal. Submitting freelancer only.
    pub fn withdraw_proposal(
        &self,
        proposal_id: ProposalId,
        actor: &Actor,
    ) -> Result<Proposal, MarketError> {
        let mut entry = self
            .proposals
            .get_mut(&proposal_id)
            .ok_or(MarketError::NotFound {
                entity: "proposal",
                id: proposal_id.to_string(),
            })?;
        require_freelancer_owner(actor, entry.freelancer_id, Operation::WithdrawProposal)?;
        entry.withdraw()?;
        info!(proposal_id = %proposal_id, "proposal withdrawn");
        Ok(entry.clone())
    }

    // -----------------------------------------------------------------------
    // Contracts
    // -----------------------------------------------------------------------

    /// Fetch a contract by id.
    pub fn get_contract(&self, contract_id: ContractId) -> Result<Contract, MarketError> {
        self.contracts
            .get(&contract_id)
            .map(|entry| entry.clone())
            .ok_or(MarketError::NotFound {
                entity: "contract",
                id: contract_id.to_string(),
            })
    }

    /// Complete a contract. Client only; every milestone must be APPROVED
    /// or PAID. A contract with no milestones may complete.
    pub fn complete_contract(
        &self,
        contract_id: ContractId,
        actor: &Actor,
    ) -> Result<Contract, MarketError> {
        let mut entry = self.lock_contract(contract_id)?;
        require_client_owner(actor, entry.client_id, Operation::CompleteContract)?;
        let unfinished = self
            .milestones
            .iter()
            .filter(|m| {
                m.contract_id == contract_id
                    && !matches!(
                        m.status,
                        MilestoneStatus::Approved | MilestoneStatus::Paid
                    )
            })
            .count();
        if unfinished > 0 {
            return Err(MarketError::PreconditionFailed {
                entity: "contract",
                id: contract_id.to_string(),
                reason: format!("{unfinished} milestone(s) not yet approved"),
            });
        }
        entry.complete()?;
        info!(contract_id = %contract_id, "contract completed");
        Ok(entry.clone())
    }

    /// Raise a dispute. Either contract party; ACTIVE only.
    pub fn dispute_contract(
        &self,
        contract_id: ContractId,
        actor: &Actor,
    ) -> Result<Contract, MarketError> {
        let mut entry = self.lock_contract(contract_id)?;
        require_contract_party(
            actor,
            entry.client_id,
            entry.freelancer_id,
            Operation::DisputeContract,
        )?;
        entry.dispute()?;
        info!(contract_id = %contract_id, actor_id = %actor.id, "contract disputed");
        Ok(entry.clone())
    }

    // -----------------------------------------------------------------------
    // Milestones
    // -----------------------------------------------------------------------

    /// Add a milestone to an active contract. Client only. An explicit
    /// `order` must be unique within the contract; an omitted `order` gets
    /// the next sequential value.
    pub fn create_milestone(
        &self,
        contract_id: ContractId,
        actor: &Actor,
        input: NewMilestone,
    ) -> Result<Milestone, MarketError> {
        let entry = self.lock_contract(contract_id)?;
        require_client_owner(actor, entry.client_id, Operation::CreateMilestone)?;
        require_contract_active(&entry, "create milestone")?;
        if input.amount.currency != entry.amount.currency {
            return Err(MarketError::Validation {
                field: "amount.currency".to_string(),
                reason: format!(
                    "expected {}, got {}",
                    entry.amount.currency, input.amount.currency
                ),
            });
        }

        // Order assignment runs under the contract entry lock, so two
        // concurrent creates cannot claim the same slot.
        let existing: Vec<(u32, i64)> = self
            .milestones
            .iter()
            .filter(|m| m.contract_id == contract_id)
            .map(|m| (m.order, m.amount.minor_units()))
            .collect();
        let order = match input.order {
            Some(requested) => {
                if existing.iter().any(|(o, _)| *o == requested) {
                    return Err(MarketError::Validation {
                        field: "order".to_string(),
                        reason: format!("order {requested} already taken on this contract"),
                    });
                }
                requested
            }
            None => match existing.iter().map(|(o, _)| *o).max() {
                Some(highest) => {
                    highest
                        .checked_add(1)
                        .ok_or_else(|| MarketError::Validation {
                            field: "order".to_string(),
                            reason: format!("order sequence exhausted at {highest}"),
                        })?
                }
                None => 0,
            },
        };

        let milestone = Milestone::create(contract_id, input, order)?;

        let total: i64 = existing.iter().map(|(_, a)| a).sum::<i64>()
            + milestone.amount.minor_units();
        if total > entry.amount.minor_units() {
            warn!(
                contract_id = %contract_id,
                milestone_total = total,
                contract_amount = %entry.amount,
                "milestone amounts exceed the contract amount"
            );
        }

        info!(
            milestone_id = %milestone.id,
            contract_id = %contract_id,
            order = order,
            "milestone created"
        );
        self.milestones.insert(milestone.id, milestone.clone());
        Ok(milestone)
    }

    /// All milestones of a contract, in order.
    pub fn list_milestones_for_contract(
        &self,
        contract_id: ContractId,
    ) -> Result<Vec<Milestone>, MarketError> {
        if !self.contracts.contains_key(&contract_id) {
            return Err(MarketError::NotFound {
                entity: "contract",
                id: contract_id.to_string(),
            });
        }
        let mut milestones: Vec<Milestone> = self
            .milestones
            .iter()
            .filter(|m| m.contract_id == contract_id)
            .map(|m| m.clone())
            .collect();
        milestones.sort_by_key(|m| m.order);
        Ok(milestones)
    }

    /// Hand in milestone work. Contract freelancer only; contract must be
    /// ACTIVE.
    pub fn submit_milestone(
        &self,
        milestone_id: MilestoneId,
        actor: &Actor,
    ) -> Result<Milestone, MarketError> {
        let contract_id = self.milestone_contract_id(milestone_id)?;
        let contract = self.lock_contract(contract_id)?;
        require_freelancer_owner(actor, contract.freelancer_id, Operation::SubmitMilestone)?;
        require_contract_active(&contract, "submit milestone")?;
        let mut entry = self.lock_milestone(milestone_id)?;
        entry.submit()?;
        info!(milestone_id = %milestone_id, "milestone submitted");
        Ok(entry.clone())
    }

    /// Approve a submitted milestone. Client only; contract must be
    /// ACTIVE.
    ///
    /// Escrow release is a side effect of approval: when the contract's
    /// escrow can cover the milestone amount, the amount is released and
    /// the milestone lands PAID in the same operation. When the escrow is
    /// absent or under-funded the milestone stays APPROVED and the payload
    /// reports that no release occurred; the payout happens later via
    /// [`release_milestone`](Self::release_milestone).
    pub fn approve_milestone(
        &self,
        milestone_id: MilestoneId,
        actor: &Actor,
    ) -> Result<MilestoneApproval, MarketError> {
        let contract_id = self.milestone_contract_id(milestone_id)?;
        let contract = self.lock_contract(contract_id)?;
        require_client_owner(actor, contract.client_id, Operation::ApproveMilestone)?;
        require_contract_active(&contract, "approve milestone")?;
        let mut entry = self.lock_milestone(milestone_id)?;

        // Escrow lock is taken before the milestone mutates so the
        // coverage check stays valid through the release.
        let escrow_id = self.escrow_by_contract.get(&contract_id).map(|e| *e);
        let mut escrow_entry = match escrow_id {
            Some(id) => self.escrows.get_mut(&id),
            None => None,
        };
        let covered = escrow_entry
            .as_deref()
            .map(|e| e.can_cover(&entry.amount))
            .unwrap_or(false);

        entry.approve()?;
        if covered {
            if let Some(escrow) = escrow_entry.as_deref_mut() {
                escrow.release(&entry.amount)?;
                entry.mark_paid()?;
                info!(
                    milestone_id = %milestone_id,
                    escrow_id = %escrow.id,
                    amount = %entry.amount,
                    "milestone approved and paid"
                );
                return Ok(MilestoneApproval {
                    milestone: entry.clone(),
                    escrow: Some(escrow.clone()),
                });
            }
        }

        info!(
            milestone_id = %milestone_id,
            "milestone approved, release deferred until escrow is funded"
        );
        Ok(MilestoneApproval {
            milestone: entry.clone(),
            escrow: None,
        })
    }

    /// Ask for changes on a submitted milestone. Client only; contract
    /// must be ACTIVE.
    pub fn request_revision(
        &self,
        milestone_id: MilestoneId,
        actor: &Actor,
    ) -> Result<Milestone, MarketError> {
        let contract_id = self.milestone_contract_id(milestone_id)?;
        let contract = self.lock_contract(contract_id)?;
        require_client_owner(actor, contract.client_id, Operation::RequestRevision)?;
        require_contract_active(&contract, "request revision")?;
        let mut entry = self.lock_milestone(milestone_id)?;
        entry.request_revision()?;
        info!(milestone_id = %milestone_id, "revision requested");
        Ok(entry.clone())
    }

    /// Pay an APPROVED milestone from escrow. Client only. Allowed while
    /// the contract is ACTIVE or COMPLETED; a dispute freezes payouts.
    pub fn release_milestone(
        &self,
        milestone_id: MilestoneId,
        actor: &Actor,
    ) -> Result<MilestoneApproval, MarketError> {
        let contract_id = self.milestone_contract_id(milestone_id)?;
        let contract = self.lock_contract(contract_id)?;
        require_client_owner(actor, contract.client_id, Operation::ReleaseMilestone)?;
        if contract.status == ContractStatus::Disputed {
            return Err(MarketError::InvalidStatus {
                entity: "contract",
                id: contract_id.to_string(),
                operation: "release milestone".to_string(),
                status: contract.status.as_str().to_string(),
            });
        }
        let mut entry = self.lock_milestone(milestone_id)?;
        if entry.status != MilestoneStatus::Approved {
            return Err(MarketError::InvalidStatus {
                entity: "milestone",
                id: milestone_id.to_string(),
                operation: "release".to_string(),
                status: entry.status.as_str().to_string(),
            });
        }
        let escrow_id =
            self.escrow_by_contract
                .get(&contract_id)
                .map(|e| *e)
                .ok_or(MarketError::PreconditionFailed {
                    entity: "contract",
                    id: contract_id.to_string(),
                    reason: "no escrow has been funded".to_string(),
                })?;
        let mut escrow_entry = self.escrows.get_mut(&escrow_id).ok_or(MarketError::NotFound {
            entity: "escrow",
            id: escrow_id.to_string(),
        })?;

        escrow_entry.release(&entry.amount)?;
        // Checked APPROVED above under the lock; cannot fail.
        entry.mark_paid()?;
        info!(
            milestone_id = %milestone_id,
            escrow_id = %escrow_id,
            amount = %entry.amount,
            "milestone released"
        );
        Ok(MilestoneApproval {
            milestone: entry.clone(),
            escrow: Some(escrow_entry.clone()),
        })
    }

    // -----------------------------------------------------------------------
    // Escrow
    // -----------------------------------------------------------------------

    /// Deposit funds for a contract. Client only; contract must be ACTIVE.
    /// The first deposit creates the contract's single escrow; further
    /// deposits accumulate its balance.
    pub fn fund_escrow(
        &self,
        contract_id: ContractId,
        actor: &Actor,
        amount: Money,
    ) -> Result<Escrow, MarketError> {
        let contract = self.lock_contract(contract_id)?;
        require_client_owner(actor, contract.client_id, Operation::FundEscrow)?;
        require_contract_active(&contract, "fund escrow")?;
        if amount.currency != contract.amount.currency {
            return Err(MarketError::Validation {
                field: "amount.currency".to_string(),
                reason: format!(
                    "expected {}, got {}",
                    contract.amount.currency, amount.currency
                ),
            });
        }
        if !amount.is_positive() {
            return Err(MarketError::Validation {
                field: "amount".to_string(),
                reason: format!("must be positive, got {amount}"),
            });
        }

        // Create-or-reuse runs under the contract entry lock, so two
        // concurrent first deposits cannot mint two escrows.
        let escrow_id = match self.escrow_by_contract.get(&contract_id) {
            Some(id) => *id,
            None => {
                let escrow = Escrow::create(contract_id, contract.amount.currency.clone());
                let id = escrow.id;
                self.escrows.insert(id, escrow);
                self.escrow_by_contract.insert(contract_id, id);
                id
            }
        };
        let mut entry = self.escrows.get_mut(&escrow_id).ok_or(MarketError::NotFound {
            entity: "escrow",
            id: escrow_id.to_string(),
        })?;
        entry.fund(&amount)?;
        info!(
            escrow_id = %escrow_id,
            contract_id = %contract_id,
            amount = %amount,
            balance = entry.balance(),
            "escrow funded"
        );
        Ok(entry.clone())
    }

    /// Fetch an escrow by id.
    pub fn get_escrow(&self, escrow_id: EscrowId) -> Result<Escrow, MarketError> {
        self.escrows
            .get(&escrow_id)
            .map(|entry| entry.clone())
            .ok_or(MarketError::NotFound {
                entity: "escrow",
                id: escrow_id.to_string(),
            })
    }

    /// Fetch the escrow bound to a contract, if one has been created.
    pub fn escrow_for_contract(
        &self,
        contract_id: ContractId,
    ) -> Result<Option<Escrow>, MarketError> {
        if !self.contracts.contains_key(&contract_id) {
            return Err(MarketError::NotFound {
                entity: "contract",
                id: contract_id.to_string(),
            });
        }
        match self.escrow_by_contract.get(&contract_id) {
            Some(id) => {
                let id = *id;
                Ok(self.escrows.get(&id).map(|entry| entry.clone()))
            }
            None => Ok(None),
        }
    }

    /// Release funds directly, outside the milestone flow. Client only.
    /// Blocked while the contract is disputed.
    pub fn release_escrow(
        &self,
        escrow_id: EscrowId,
        actor: &Actor,
        amount: Money,
    ) -> Result<Escrow, MarketError> {
        let contract_id = self.escrow_contract_id(escrow_id)?;
        let contract = self.lock_contract(contract_id)?;
        require_client_owner(actor, contract.client_id, Operation::ReleaseEscrow)?;
        if contract.status == ContractStatus::Disputed {
            return Err(MarketError::InvalidStatus {
                entity: "contract",
                id: contract_id.to_string(),
                operation: "release escrow".to_string(),
                status: contract.status.as_str().to_string(),
            });
        }
        let mut entry = self.escrows.get_mut(&escrow_id).ok_or(MarketError::NotFound {
            entity: "escrow",
            id: escrow_id.to_string(),
        })?;
        entry.release(&amount)?;
        info!(
            escrow_id = %escrow_id,
            amount = %amount,
            balance = entry.balance(),
            "escrow released"
        );
        Ok(entry.clone())
    }

    /// Return the remaining balance to the client. Client only; disallowed
    /// once the escrow is fully RELEASED or still UNFUNDED.
    pub fn refund_escrow(&self, escrow_id: EscrowId, actor: &Actor) -> Result<Escrow, MarketError> {
        let contract_id = self.escrow_contract_id(escrow_id)?;
        let contract = self.lock_contract(contract_id)?;
        require_client_owner(actor, contract.client_id, Operation::RefundEscrow)?;
        drop(contract);
        let mut entry = self.escrows.get_mut(&escrow_id).ok_or(MarketError::NotFound {
            entity: "escrow",
            id: escrow_id.to_string(),
        })?;
        let returned = entry.refund()?;
        info!(escrow_id = %escrow_id, returned = returned, "escrow refunded");
        Ok(entry.clone())
    }

    // -----------------------------------------------------------------------
    // Lock helpers (fixed order: jobs → proposals → contracts → milestones
    // → escrows)
    // -----------------------------------------------------------------------

    fn lock_job(&self, job_id: JobId) -> Result<RefMut<'_, JobId, Job>, MarketError> {
        self.jobs.get_mut(&job_id).ok_or(MarketError::NotFound {
            entity: "job",
            id: job_id.to_string(),
        })
    }

    fn lock_contract(
        &self,
        contract_id: ContractId,
    ) -> Result<RefMut<'_, ContractId, Contract>, MarketError> {
        self.contracts
            .get_mut(&contract_id)
            .ok_or(MarketError::NotFound {
                entity: "contract",
                id: contract_id.to_string(),
            })
    }

    fn lock_milestone(
        &self,
        milestone_id: MilestoneId,
    ) -> Result<RefMut<'_, MilestoneId, Milestone>, MarketError> {
        self.milestones
            .get_mut(&milestone_id)
            .ok_or(MarketError::NotFound {
                entity: "milestone",
                id: milestone_id.to_string(),
            })
    }

    /// Snapshot a milestone's owning contract without holding the
    /// milestone lock, so the contract lock can be taken first.
    fn milestone_contract_id(&self, milestone_id: MilestoneId) -> Result<ContractId, MarketError> {
        self.milestones
            .get(&milestone_id)
            .map(|m| m.contract_id)
            .ok_or(MarketError::NotFound {
                entity: "milestone",
                id: milestone_id.to_string(),
            })
    }

    fn escrow_contract_id(&self, escrow_id: EscrowId) -> Result<ContractId, MarketError> {
        self.escrows
            .get(&escrow_id)
            .map(|e| e.contract_id)
            .ok_or(MarketError::NotFound {
                entity: "escrow",
                id: escrow_id.to_string(),
            })
    }
}

impl Default for EngagementBroker {
    fn default() -> Self {
        Self::new()
    }
}

fn require_contract_active(contract: &Contract, operation: &str) -> Result<(), MarketError> {
    if contract.status != ContractStatus::Active {
        return Err(MarketError::InvalidStatus {
            entity: "contract",
            id: contract.id.to_string(),
            operation: operation.to_string(),
            status: contract.status.as_str().to_string(),
        });
    }
    Ok(())
}
