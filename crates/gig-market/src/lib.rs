// SPDX-License-Identifier: BUSL-1.1
//! # gig-market
//!
//! Engagement lifecycle core for a freelance marketplace: jobs,
//! proposals, contracts, milestones, and escrow, coordinated by an
//! in-memory broker.
//!
//! The flow runs job → proposal → contract → milestones → escrow. A
//! client posts a job; freelancers bid with proposals; accepting a
//! proposal atomically derives a contract and closes the job; the
//! contract is delivered through milestones; milestone approval releases
//! escrowed funds.
//!
//! Each entity owns its own validated state machine; the
//! [`EngagementBroker`] owns the keyed stores, the authorization checks,
//! and the cross-entity atomicity. All transitions are
//! expected-current-status guarded: a retried or stale transition fails
//! with the entity's current status in the error and mutates nothing.
//!
//! ## Modules
//!
//! - [`auth`] — stateless authorization guard
//! - [`broker`] — the lifecycle coordinator and keyed stores
//! - [`contract`] — contract entity and state machine
//! - [`error`] — structured error types with canonical codes
//! - [`escrow`] — escrow accounts and the transaction log
//! - [`job`] — job postings
//! - [`milestone`] — milestone review cycle
//! - [`proposal`] — freelancer bids

pub mod auth;
pub mod broker;
pub mod contract;
pub mod error;
pub mod escrow;
pub mod job;
pub mod milestone;
pub mod proposal;

pub use auth::Operation;
pub use broker::{EngagementBroker, MilestoneApproval, ProposalAcceptance};
pub use contract::{Contract, ContractId, ContractStatus};
pub use error::MarketError;
pub use escrow::{Escrow, EscrowId, EscrowStatus, EscrowTransaction, TransactionType};
pub use job::{Budget, BudgetType, Job, JobId, JobStatus, JobUpdate, NewJob};
pub use milestone::{Milestone, MilestoneId, MilestoneStatus, NewMilestone};
pub use proposal::{NewProposal, Proposal, ProposalId, ProposalStatus};
