//! # Job Lifecycle
//!
//! A job is the unit of work a client posts. It is open for proposals
//! until closed, either explicitly by its owner or automatically when one
//! of its proposals is accepted. Once closed a job is immutable.
//!
//! The job's status doubles as the exclusivity gate for proposal
//! acceptance: `accept` is validated against the *job's* OPEN status under
//! the job entry lock, so at most one proposal per job can ever win.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gig_core::{ActorId, Money};

use crate::error::MarketError;

/// A unique identifier for a job posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    /// Create a new random job identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a job identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job:{}", self.0)
    }
}

/// How the job's budget is denominated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BudgetType {
    /// A fixed total price for the engagement.
    Fixed,
    /// An hourly rate.
    Hourly,
}

impl BudgetType {
    /// The canonical string name of this budget type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "FIXED",
            Self::Hourly => "HOURLY",
        }
    }
}

impl std::fmt::Display for BudgetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The advertised budget for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    /// The budget amount.
    pub amount: Money,
    /// Fixed-price or hourly.
    pub budget_type: BudgetType,
}

/// The lifecycle status of a job.
///
/// `Open → Closed` is the only transition; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Accepting proposals.
    Open,
    /// No longer accepting proposals. Terminal state.
    Closed,
}

impl JobStatus {
    /// The canonical string name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Valid target statuses from this status.
    pub fn valid_transitions(&self) -> &'static [JobStatus] {
        match self {
            Self::Open => &[Self::Closed],
            Self::Closed => &[],
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for creating a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    /// Short title of the posting.
    pub title: String,
    /// Full description of the work.
    pub description: String,
    /// Advertised budget.
    pub budget: Budget,
}

/// Partial update to an open job. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobUpdate {
    /// Replacement title.
    pub title: Option<String>,
    /// Replacement description.
    pub description: Option<String>,
    /// Replacement budget.
    pub budget: Option<Budget>,
}

/// A job posting owned by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// The owning client.
    pub client_id: ActorId,
    /// Short title of the posting.
    pub title: String,
    /// Full description of the work.
    pub description: String,
    /// Advertised budget.
    pub budget: Budget,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// When the job was posted (UTC).
    pub created_at: DateTime<Utc>,
    /// When the job was last updated (UTC).
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job in the [`Open`](JobStatus::Open) status.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] if the title is empty or the
    /// budget amount is not strictly positive.
    pub fn create(client_id: ActorId, input: NewJob) -> Result<Self, MarketError> {
        if input.title.trim().is_empty() {
            return Err(MarketError::Validation {
                field: "title".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if !input.budget.amount.is_positive() {
            return Err(MarketError::Validation {
                field: "budget.amount".to_string(),
                reason: format!("must be positive, got {}", input.budget.amount),
            });
        }
        let now = Utc::now();
        Ok(Self {
            id: JobId::new(),
            client_id,
            title: input.title,
            description: input.description,
            budget: input.budget,
            status: JobStatus::Open,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether the job is accepting proposals.
    pub fn is_open(&self) -> bool {
        self.status == JobStatus::Open
    }

    /// Apply a partial update. Only valid while the job is open.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidStatus`] if the job is closed, or
    /// [`MarketError::Validation`] for an empty title or non-positive
    /// budget in the update.
    pub fn apply_update(&mut self, update: JobUpdate) -> Result<(), MarketError> {
        self.require_open("update")?;
        if let Some(title) = &update.title {
            if title.trim().is_empty() {
                return Err(MarketError::Validation {
                    field: "title".to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        if let Some(budget) = &update.budget {
            if !budget.amount.is_positive() {
                return Err(MarketError::Validation {
                    field: "budget.amount".to_string(),
                    reason: format!("must be positive, got {}", budget.amount),
                });
            }
        }
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(budget) = update.budget {
            self.budget = budget;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Transition Open → Closed.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidStatus`] if already closed.
    pub fn close(&mut self) -> Result<(), MarketError> {
        self.require_open("close")?;
        self.status = JobStatus::Closed;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn require_open(&self, operation: &str) -> Result<(), MarketError> {
        if self.status != JobStatus::Open {
            return Err(MarketError::InvalidStatus {
                entity: "job",
                id: self.id.to_string(),
                operation: operation.to_string(),
                status: self.status.as_str().to_string(),
            });
        }
        Ok(())
    }
}
