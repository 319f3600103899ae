//! # gig-core — Shared Primitives
//!
//! Foundation types shared across the Gigline engagement core:
//!
//! - **Actor** ([`actor`]): verified actor identity as supplied by the
//!   identity layer — an opaque [`ActorId`] paired with a [`Role`]. This
//!   crate trusts the pair and performs no credential validation.
//!
//! - **Money** ([`money`]): monetary values as integer minor-unit strings
//!   with an ISO 4217 currency code. Amounts are never floats; all
//!   arithmetic goes through checked `i64` parsing.

pub mod actor;
pub mod money;

pub use actor::{Actor, ActorId, Role};
pub use money::{Money, MoneyError};
