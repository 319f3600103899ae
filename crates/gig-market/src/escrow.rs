//! # Escrow State
//!
//! Tracks funded-but-not-yet-released money for a contract. This core
//! tracks escrow *state* only; real money movement is delegated to a
//! payment-rail collaborator outside this crate.
//!
//! Status machine: `Unfunded → Funded → [Released | Refunded]`, where
//! Funded is re-enterable (staged funding accumulates the balance, partial
//! release reduces it). Released and Refunded are terminal.
//!
//! Every fund/release/refund is appended to the transaction log; the
//! balance is always `funded_total - released_total` and can never go
//! negative because release is guarded by the remaining balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gig_core::money::{format_minor_units, parse_minor_units};
use gig_core::Money;

use crate::contract::ContractId;
use crate::error::MarketError;

/// A unique identifier for an escrow record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscrowId(Uuid);

impl EscrowId {
    /// Create a new random escrow identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an escrow identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EscrowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EscrowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "escrow:{}", self.0)
    }
}

/// The status of an escrow record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscrowStatus {
    /// Created, no funds deposited yet.
    Unfunded,
    /// Holds a positive balance.
    Funded,
    /// Entire funded amount released to the freelancer. Terminal state.
    Released,
    /// Remaining balance returned to the client. Terminal state.
    Refunded,
}

impl EscrowStatus {
    /// The canonical string name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unfunded => "UNFUNDED",
            Self::Funded => "FUNDED",
            Self::Released => "RELEASED",
            Self::Refunded => "REFUNDED",
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released | Self::Refunded)
    }

    /// Valid target statuses from this status.
    pub fn valid_transitions(&self) -> &'static [EscrowStatus] {
        match self {
            Self::Unfunded => &[Self::Funded],
            Self::Funded => &[Self::Released, Self::Refunded],
            Self::Released | Self::Refunded => &[],
        }
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of an escrow transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// Client deposited funds.
    Fund,
    /// Funds released toward the freelancer.
    Release,
    /// Remaining balance returned to the client.
    Refund,
}

/// A recorded escrow transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowTransaction {
    /// Transaction kind.
    pub transaction_type: TransactionType,
    /// Amount involved, in minor units.
    pub amount: String,
    /// Currency code (ISO 4217).
    pub currency: String,
    /// When the transaction occurred (UTC).
    pub timestamp: DateTime<Utc>,
}

/// The holding account tracking funded-but-unreleased money for a contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escrow {
    /// Unique escrow identifier.
    pub id: EscrowId,
    /// The contract this escrow funds.
    pub contract_id: ContractId,
    /// Currency code (ISO 4217), fixed at creation from the contract.
    pub currency: String,
    /// Total deposited over the escrow's lifetime, in minor units.
    pub funded_amount: String,
    /// Total released over the escrow's lifetime, in minor units.
    pub released_amount: String,
    /// Current status.
    pub status: EscrowStatus,
    /// Append-only transaction history.
    pub transactions: Vec<EscrowTransaction>,
    /// When the escrow was created (UTC).
    pub created_at: DateTime<Utc>,
    /// When the escrow was last updated (UTC).
    pub updated_at: DateTime<Utc>,
}

impl Escrow {
    /// Create an empty escrow for a contract, in the
    /// [`Unfunded`](EscrowStatus::Unfunded) status.
    pub fn create(contract_id: ContractId, currency: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EscrowId::new(),
            contract_id,
            currency: currency.into(),
            funded_amount: "0".to_string(),
            released_amount: "0".to_string(),
            status: EscrowStatus::Unfunded,
            transactions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The remaining balance (funded minus released), in minor units.
    pub fn balance(&self) -> i64 {
        let funded = parse_minor_units(&self.funded_amount).unwrap_or(0);
        let released = parse_minor_units(&self.released_amount).unwrap_or(0);
        funded - released
    }

    /// Deposit funds, accumulating the balance.
    ///
    /// Unfunded → Funded on the first deposit; further deposits while
    /// Funded increase the balance rather than erroring (staged funding).
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] for a non-positive amount or a
    /// currency differing from the escrow's, and
    /// [`MarketError::InvalidStatus`] once the escrow is terminal.
    pub fn fund(&mut self, amount: &Money) -> Result<(), MarketError> {
        if self.status.is_terminal() {
            return Err(self.invalid("fund"));
        }
        self.require_currency(amount)?;
        let deposit = amount.minor_units();
        if deposit <= 0 {
            return Err(MarketError::Validation {
                field: "amount".to_string(),
                reason: format!("must be positive, got {amount}"),
            });
        }
        let funded = parse_minor_units(&self.funded_amount)?;
        let total = funded
            .checked_add(deposit)
            .ok_or_else(|| gig_core::MoneyError::Overflow(amount.amount.clone()))?;
        self.funded_amount = format_minor_units(total);
        self.status = EscrowStatus::Funded;
        self.record(TransactionType::Fund, deposit);
        Ok(())
    }

    /// Release funds toward the freelancer.
    ///
    /// Transitions to Released when the balance reaches zero, otherwise
    /// stays Funded with the reduced balance.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InsufficientFunds`] when the requested
    /// amount exceeds the remaining balance (the balance is left
    /// unchanged), [`MarketError::Validation`] for a non-positive amount,
    /// and [`MarketError::InvalidStatus`] unless currently Funded.
    pub fn release(&mut self, amount: &Money) -> Result<(), MarketError> {
        if self.status != EscrowStatus::Funded {
            return Err(self.invalid("release"));
        }
        self.require_currency(amount)?;
        let requested = amount.minor_units();
        if requested <= 0 {
            return Err(MarketError::Validation {
                field: "amount".to_string(),
                reason: format!("must be positive, got {amount}"),
            });
        }
        let remaining = self.balance();
        if requested > remaining {
            return Err(MarketError::InsufficientFunds {
                escrow_id: self.id.to_string(),
                requested: format_minor_units(requested),
                remaining: format_minor_units(remaining),
            });
        }
        let released = parse_minor_units(&self.released_amount)?;
        self.released_amount = format_minor_units(released + requested);
        if self.balance() == 0 {
            self.status = EscrowStatus::Released;
        }
        self.record(TransactionType::Release, requested);
        Ok(())
    }

    /// Return the remaining balance to the client: Funded → Refunded.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidStatus`] unless currently Funded —
    /// in particular, a fully Released escrow can no longer be refunded.
    pub fn refund(&mut self) -> Result<i64, MarketError> {
        if self.status != EscrowStatus::Funded {
            return Err(self.invalid("refund"));
        }
        let remaining = self.balance();
        self.released_amount = self.funded_amount.clone();
        self.status = EscrowStatus::Refunded;
        self.record(TransactionType::Refund, remaining);
        Ok(remaining)
    }

    /// Whether the remaining balance covers `amount`.
    pub fn can_cover(&self, amount: &Money) -> bool {
        self.status == EscrowStatus::Funded
            && amount.currency == self.currency
            && amount.minor_units() <= self.balance()
    }

    fn require_currency(&self, amount: &Money) -> Result<(), MarketError> {
        if amount.currency != self.currency {
            return Err(MarketError::Validation {
                field: "amount.currency".to_string(),
                reason: format!("expected {}, got {}", self.currency, amount.currency),
            });
        }
        Ok(())
    }

    fn record(&mut self, transaction_type: TransactionType, amount: i64) {
        self.transactions.push(EscrowTransaction {
            transaction_type,
            amount: format_minor_units(amount),
            currency: self.currency.clone(),
            timestamp: Utc::now(),
        });
        self.updated_at = Utc::now();
    }

    fn invalid(&self, operation: &str) -> MarketError {
        MarketError::InvalidStatus {
            entity: "escrow",
            id: self.id.to_string(),
            operation: operation.to_string(),
            status: self.status.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn usd(amount: &str) -> Money {
        Money::new(amount, "USD").unwrap()
    }

    fn funded_escrow(amount: &str) -> Escrow {
        let mut escrow = Escrow::create(ContractId::new(), "USD");
        escrow.fund(&usd(amount)).unwrap();
        escrow
    }

    #[test]
    fn create_starts_unfunded() {
        let escrow = Escrow::create(ContractId::new(), "USD");
        assert_eq!(escrow.status, EscrowStatus::Unfunded);
        assert_eq!(escrow.balance(), 0);
    }

    #[test]
    fn fund_transitions_to_funded() {
        let escrow = funded_escrow("800000");
        assert_eq!(escrow.status, EscrowStatus::Funded);
        assert_eq!(escrow.balance(), 800000);
        assert_eq!(escrow.transactions.len(), 1);
    }

    #[test]
    fn refunding_a_funded_escrow_accumulates() {
        let mut escrow = funded_escrow("500000");
        escrow.fund(&usd("300000")).unwrap();
        assert_eq!(escrow.status, EscrowStatus::Funded);
        assert_eq!(escrow.balance(), 800000);
        assert_eq!(escrow.funded_amount, "800000");
    }

    #[test]
    fn fund_rejects_non_positive() {
        let mut escrow = Escrow::create(ContractId::new(), "USD");
        assert!(escrow.fund(&usd("0")).is_err());
        assert!(escrow.fund(&usd("-100")).is_err());
        assert_eq!(escrow.status, EscrowStatus::Unfunded);
    }

    #[test]
    fn fund_rejects_currency_mismatch() {
        let mut escrow = Escrow::create(ContractId::new(), "USD");
        let err = escrow.fund(&Money::new("100", "EUR").unwrap()).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn partial_release_reduces_balance() {
        let mut escrow = funded_escrow("800000");
        escrow.release(&usd("300000")).unwrap();
        assert_eq!(escrow.status, EscrowStatus::Funded);
        assert_eq!(escrow.balance(), 500000);
    }

    #[test]
    fn release_to_zero_transitions_to_released() {
        let mut escrow = funded_escrow("800000");
        escrow.release(&usd("300000")).unwrap();
        escrow.release(&usd("500000")).unwrap();
        assert_eq!(escrow.status, EscrowStatus::Released);
        assert_eq!(escrow.balance(), 0);
        assert!(escrow.status.is_terminal());
    }

    #[test]
    fn over_release_rejected_and_balance_unchanged() {
        let mut escrow = funded_escrow("500000");
        let err = escrow.release(&usd("900000")).unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
        assert_eq!(escrow.balance(), 500000);
        assert_eq!(escrow.status, EscrowStatus::Funded);
    }

    #[test]
    fn release_rejected_when_unfunded() {
        let mut escrow = Escrow::create(ContractId::new(), "USD");
        let err = escrow.release(&usd("100")).unwrap_err();
        assert_eq!(err.code(), "INVALID_STATUS");
    }

    #[test]
    fn refund_returns_remaining_balance() {
        let mut escrow = funded_escrow("800000");
        escrow.release(&usd("300000")).unwrap();
        let returned = escrow.refund().unwrap();
        assert_eq!(returned, 500000);
        assert_eq!(escrow.status, EscrowStatus::Refunded);
        assert_eq!(escrow.balance(), 0);
    }

    #[test]
    fn refund_rejected_once_released() {
        let mut escrow = funded_escrow("100");
        escrow.release(&usd("100")).unwrap();
        let err = escrow.refund().unwrap_err();
        assert_eq!(err.code(), "INVALID_STATUS");
    }

    #[test]
    fn refund_rejected_when_unfunded() {
        let mut escrow = Escrow::create(ContractId::new(), "USD");
        assert!(escrow.refund().is_err());
    }

    #[test]
    fn terminal_statuses_reject_all_operations() {
        let mut escrow = funded_escrow("100");
        escrow.release(&usd("100")).unwrap();
        assert!(escrow.fund(&usd("100")).is_err());
        assert!(escrow.release(&usd("1")).is_err());
        assert!(escrow.refund().is_err());

        let mut escrow = funded_escrow("100");
        escrow.refund().unwrap();
        assert!(escrow.fund(&usd("100")).is_err());
    }

    #[test]
    fn can_cover_checks_balance_and_currency() {
        let escrow = funded_escrow("500000");
        assert!(escrow.can_cover(&usd("500000")));
        assert!(escrow.can_cover(&usd("1")));
        assert!(!escrow.can_cover(&usd("500001")));
        assert!(!escrow.can_cover(&Money::new("1", "EUR").unwrap()));
        assert!(!Escrow::create(ContractId::new(), "USD").can_cover(&usd("1")));
    }

    #[test]
    fn transaction_log_tracks_operations() {
        let mut escrow = funded_escrow("800000");
        escrow.release(&usd("300000")).unwrap();
        escrow.refund().unwrap();
        let kinds: Vec<TransactionType> = escrow
            .transactions
            .iter()
            .map(|t| t.transaction_type)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TransactionType::Fund,
                TransactionType::Release,
                TransactionType::Refund
            ]
        );
        assert_eq!(escrow.transactions[2].amount, "500000");
    }

    #[test]
    fn status_valid_transitions() {
        assert_eq!(
            EscrowStatus::Unfunded.valid_transitions(),
            &[EscrowStatus::Funded]
        );
        let from_funded = EscrowStatus::Funded.valid_transitions();
        assert!(from_funded.contains(&EscrowStatus::Released));
        assert!(from_funded.contains(&EscrowStatus::Refunded));
        assert!(EscrowStatus::Released.valid_transitions().is_empty());
        assert!(EscrowStatus::Refunded.valid_transitions().is_empty());
    }

    #[test]
    fn escrow_serialization_roundtrip() {
        let escrow = funded_escrow("800000");
        let json = serde_json::to_string(&escrow).unwrap();
        let back: Escrow = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, escrow.id);
        assert_eq!(back.status, escrow.status);
        assert_eq!(back.balance(), escrow.balance());
    }

    proptest! {
        /// For any sequence of fund/release amounts, the released total
        /// never exceeds the funded total and the balance never goes
        /// negative, regardless of which releases are rejected.
        #[test]
        fn balance_never_negative(ops in proptest::collection::vec((any::<bool>(), 1i64..1_000_000), 1..40)) {
            let mut escrow = Escrow::create(ContractId::new(), "USD");
            for (is_fund, amount) in ops {
                let money = Money::new(amount.to_string(), "USD").unwrap();
                if is_fund {
                    let _ = escrow.fund(&money);
                } else {
                    let _ = escrow.release(&money);
                }
                let funded = parse_minor_units(&escrow.funded_amount).unwrap();
                let released = parse_minor_units(&escrow.released_amount).unwrap();
                prop_assert!(released <= funded);
                prop_assert!(escrow.balance() >= 0);
            }
        }
    }
}
