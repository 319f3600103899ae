//! End-to-end engagement lifecycle scenarios: job posting through
//! proposals, contract, milestones, and escrow payout.

use gig_core::{Actor, ActorId, Money};
use gig_market::{
    Budget, BudgetType, EngagementBroker, JobUpdate, NewJob, NewMilestone, NewProposal,
};

fn usd(amount: &str) -> Money {
    Money::new(amount, "USD").unwrap()
}

fn job_input(title: &str, amount: &str) -> NewJob {
    NewJob {
        title: title.to_string(),
        description: "See attached brief".to_string(),
        budget: Budget {
            amount: usd(amount),
            budget_type: BudgetType::Fixed,
        },
    }
}

fn bid(amount: &str) -> NewProposal {
    NewProposal {
        cover_letter: "Relevant portfolio attached".to_string(),
        bid_amount: usd(amount),
    }
}

fn milestone(name: &str, amount: &str) -> NewMilestone {
    NewMilestone {
        name: name.to_string(),
        amount: usd(amount),
        due_date: None,
        order: None,
    }
}

#[test]
fn full_engagement_happy_path() {
    let broker = EngagementBroker::new();
    let client = Actor::client(ActorId::new());
    let freelancer = Actor::freelancer(ActorId::new());

    // Post and refine the job.
    let job = broker
        .create_job(&client, job_input("Mobile app rewrite", "2000000"))
        .unwrap();
    broker
        .update_job(
            job.id,
            &client,
            JobUpdate {
                description: Some("Swift and Kotlin, see brief v2".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    // Two bids come in; one wins.
    let rival = Actor::freelancer(ActorId::new());
    let winning = broker.submit_proposal(job.id, &freelancer, bid("1600000")).unwrap();
    let losing = broker.submit_proposal(job.id, &rival, bid("1900000")).unwrap();

    let acceptance = broker.accept_proposal(winning.id, &client).unwrap();
    let contract = acceptance.contract;
    assert_eq!(acceptance.proposal.status.as_str(), "ACCEPTED");
    assert_eq!(acceptance.job.status.as_str(), "CLOSED");
    assert_eq!(contract.amount, usd("1600000"));

    // The losing bid is untouched and its freelancer may withdraw it.
    assert_eq!(broker.get_proposal(losing.id).unwrap().status.as_str(), "PENDING");
    broker.withdraw_proposal(losing.id, &rival).unwrap();

    // Plan the work and fund the whole engagement up front.
    let design = broker.create_milestone(contract.id, &client, milestone("Design", "400000")).unwrap();
    let build = broker.create_milestone(contract.id, &client, milestone("Build", "1200000")).unwrap();
    assert_eq!(design.order, 0);
    assert_eq!(build.order, 1);
    broker.fund_escrow(contract.id, &client, usd("1600000")).unwrap();

    // Design goes through a revision before approval.
    broker.submit_milestone(design.id, &freelancer).unwrap();
    broker.request_revision(design.id, &client).unwrap();
    broker.submit_milestone(design.id, &freelancer).unwrap();
    let paid = broker.approve_milestone(design.id, &client).unwrap();
    assert_eq!(paid.milestone.status.as_str(), "PAID");
    assert_eq!(paid.escrow.as_ref().unwrap().balance(), 1200000);

    // Build is approved first try; escrow drains to zero.
    broker.submit_milestone(build.id, &freelancer).unwrap();
    let paid = broker.approve_milestone(build.id, &client).unwrap();
    let escrow = paid.escrow.unwrap();
    assert_eq!(escrow.balance(), 0);
    assert_eq!(escrow.status.as_str(), "RELEASED");

    // All milestones are paid; the contract may complete.
    let completed = broker.complete_contract(contract.id, &client).unwrap();
    assert_eq!(completed.status.as_str(), "COMPLETED");
}

#[test]
fn losing_accept_after_winner_reports_job_not_open() {
    let broker = EngagementBroker::new();
    let client = Actor::client(ActorId::new());
    let first = Actor::freelancer(ActorId::new());
    let second = Actor::freelancer(ActorId::new());

    let job = broker.create_job(&client, job_input("Logo", "500000")).unwrap();
    let a = broker.submit_proposal(job.id, &first, bid("400000")).unwrap();
    let b = broker.submit_proposal(job.id, &second, bid("350000")).unwrap();

    broker.accept_proposal(a.id, &client).unwrap();
    let err = broker.accept_proposal(b.id, &client).unwrap_err();
    assert_eq!(err.code(), "JOB_NOT_OPEN");

    // Exactly one contract exists and the sibling is still PENDING.
    assert_eq!(broker.get_proposal(b.id).unwrap().status.as_str(), "PENDING");
    broker.reject_proposal(b.id, &client).unwrap();
}

#[test]
fn approval_without_funding_defers_payout() {
    let broker = EngagementBroker::new();
    let client = Actor::client(ActorId::new());
    let freelancer = Actor::freelancer(ActorId::new());

    let job = broker.create_job(&client, job_input("Data pipeline", "900000")).unwrap();
    let proposal = broker.submit_proposal(job.id, &freelancer, bid("900000")).unwrap();
    let contract = broker.accept_proposal(proposal.id, &client).unwrap().contract;
    let m = broker.create_milestone(contract.id, &client, milestone("Ingest", "300000")).unwrap();

    broker.submit_milestone(m.id, &freelancer).unwrap();
    let outcome = broker.approve_milestone(m.id, &client).unwrap();
    assert_eq!(outcome.milestone.status.as_str(), "APPROVED");
    assert!(outcome.escrow.is_none());

    // Partial funding is still not enough; the release reports the gap.
    broker.fund_escrow(contract.id, &client, usd("200000")).unwrap();
    let err = broker.release_milestone(m.id, &client).unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
    assert_eq!(
        broker.escrow_for_contract(contract.id).unwrap().unwrap().balance(),
        200000
    );

    // Topping up unblocks the payout.
    broker.fund_escrow(contract.id, &client, usd("100000")).unwrap();
    let released = broker.release_milestone(m.id, &client).unwrap();
    assert_eq!(released.milestone.status.as_str(), "PAID");
    assert_eq!(released.escrow.unwrap().balance(), 0);
}

#[test]
fn dispute_freezes_payouts_but_allows_refund() {
    let broker = EngagementBroker::new();
    let client = Actor::client(ActorId::new());
    let freelancer = Actor::freelancer(ActorId::new());

    let job = broker.create_job(&client, job_input("Copywriting", "300000")).unwrap();
    let proposal = broker.submit_proposal(job.id, &freelancer, bid("300000")).unwrap();
    let contract = broker.accept_proposal(proposal.id, &client).unwrap().contract;
    let escrow = broker.fund_escrow(contract.id, &client, usd("300000")).unwrap();

    broker.dispute_contract(contract.id, &freelancer).unwrap();
    assert_eq!(broker.get_contract(contract.id).unwrap().status.as_str(), "DISPUTED");

    // No further lifecycle work on a disputed contract.
    let err = broker
        .create_milestone(contract.id, &client, milestone("Late", "100"))
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_STATUS");
    let err = broker.release_escrow(escrow.id, &client, usd("100")).unwrap_err();
    assert_eq!(err.code(), "INVALID_STATUS");
    let err = broker.complete_contract(contract.id, &client).unwrap_err();
    assert_eq!(err.code(), "INVALID_STATUS");

    // The client can still unwind the held funds.
    let refunded = broker.refund_escrow(escrow.id, &client).unwrap();
    assert_eq!(refunded.status.as_str(), "REFUNDED");
    assert_eq!(refunded.balance(), 0);
}

#[test]
fn closed_job_rejects_updates_and_deletion_rules_hold() {
    let broker = EngagementBroker::new();
    let client = Actor::client(ActorId::new());
    let freelancer = Actor::freelancer(ActorId::new());

    // A never-bid-on job can be deleted outright.
    let disposable = broker.create_job(&client, job_input("Draft posting", "1000")).unwrap();
    broker.delete_job(disposable.id, &client).unwrap();
    assert_eq!(broker.get_job(disposable.id).unwrap_err().code(), "NOT_FOUND");

    // A job with history cannot.
    let job = broker.create_job(&client, job_input("Real posting", "1000")).unwrap();
    broker.submit_proposal(job.id, &freelancer, bid("900")).unwrap();
    let err = broker.delete_job(job.id, &client).unwrap_err();
    assert_eq!(err.code(), "PRECONDITION_FAILED");

    broker.close_job(job.id, &client).unwrap();
    let err = broker
        .update_job(
            job.id,
            &client,
            JobUpdate {
                title: Some("renamed".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_STATUS");

    // Closed without acceptance: pending proposals may still be decided.
    let listed = broker.list_proposals_for_job(job.id).unwrap();
    assert_eq!(listed.len(), 1);
    broker.reject_proposal(listed[0].id, &client).unwrap();
}

#[test]
fn contract_with_zero_milestones_may_complete() {
    let broker = EngagementBroker::new();
    let client = Actor::client(ActorId::new());
    let freelancer = Actor::freelancer(ActorId::new());

    let job = broker.create_job(&client, job_input("One-off task", "50000")).unwrap();
    let proposal = broker.submit_proposal(job.id, &freelancer, bid("50000")).unwrap();
    let contract = broker.accept_proposal(proposal.id, &client).unwrap().contract;

    let completed = broker.complete_contract(contract.id, &client).unwrap();
    assert_eq!(completed.status.as_str(), "COMPLETED");
}

#[test]
fn serialized_entities_survive_roundtrip() {
    let broker = EngagementBroker::new();
    let client = Actor::client(ActorId::new());
    let freelancer = Actor::freelancer(ActorId::new());

    let job = broker.create_job(&client, job_input("Roundtrip", "70000")).unwrap();
    let proposal = broker.submit_proposal(job.id, &freelancer, bid("60000")).unwrap();
    let acceptance = broker.accept_proposal(proposal.id, &client).unwrap();

    let json = serde_json::to_string_pretty(&acceptance.contract).unwrap();
    let back: gig_market::Contract = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, acceptance.contract.id);
    assert_eq!(back.amount, acceptance.contract.amount);
    assert_eq!(back.client_id, client.id);
    assert_eq!(back.freelancer_id, freelancer.id);
}
