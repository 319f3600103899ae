//! # Actor Identity
//!
//! The identity layer upstream of this core authenticates requests and
//! hands us a verified `(actor id, role)` pair. Everything here treats
//! that pair as trusted input: no credential validation, no token parsing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for an authenticated actor (client or freelancer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(Uuid);

impl ActorId {
    /// Create a new random actor identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an actor identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "actor:{}", self.0)
    }
}

/// The role an actor holds for the current request.
///
/// An actor who is a client on one engagement may be a freelancer on
/// another; the role is per-request, not per-account. Authorization rules
/// that guard against self-dealing compare actor *ids*, never roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Posts jobs, accepts proposals, funds escrow.
    Client,
    /// Bids on jobs, submits milestone work.
    Freelancer,
}

impl Role {
    /// The canonical string name of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "CLIENT",
            Self::Freelancer => "FREELANCER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A verified actor: the `(id, role)` pair attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The actor's identity.
    pub id: ActorId,
    /// The role the actor holds for this request.
    pub role: Role,
}

impl Actor {
    /// Construct an actor acting in the client role.
    pub fn client(id: ActorId) -> Self {
        Self {
            id,
            role: Role::Client,
        }
    }

    /// Construct an actor acting in the freelancer role.
    pub fn freelancer(id: ActorId) -> Self {
        Self {
            id,
            role: Role::Freelancer,
        }
    }
}
