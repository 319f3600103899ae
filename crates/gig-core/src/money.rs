//! # Monetary Values
//!
//! Amounts are stored as integer minor-unit strings (cents) with an
//! ISO 4217 currency code. String storage keeps serialized forms exact and
//! rules out float representation of money anywhere in the core; all
//! arithmetic parses to `i64` and is checked.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors arising from monetary value handling.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MoneyError {
    /// Amount string is not a valid integer minor-unit amount.
    #[error("invalid monetary amount: \"{0}\"")]
    InvalidAmount(String),

    /// Two amounts in different currencies were combined.
    #[error("currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch {
        /// The currency required by the operation.
        expected: String,
        /// The currency actually supplied.
        actual: String,
    },

    /// Arithmetic on the amounts overflowed `i64`.
    #[error("monetary arithmetic overflow on amount \"{0}\"")]
    Overflow(String),
}

/// A monetary amount in integer minor units with its currency.
///
/// `amount` is a base-10 integer string, e.g. `"800000"` for 8000.00 USD.
/// Negative amounts are representable (refund deltas) but every public
/// operation in the engagement core validates positivity where required.
///
/// Deserialization goes through [`Money::new`], so a `Money` holds a
/// parseable amount string no matter how it was constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMoney")]
pub struct Money {
    /// Amount in minor units, as a decimal integer string.
    pub amount: String,
    /// ISO 4217 currency code (e.g., "USD").
    pub currency: String,
}

/// Unvalidated wire form of [`Money`].
#[derive(Deserialize)]
struct RawMoney {
    amount: String,
    currency: String,
}

impl TryFrom<RawMoney> for Money {
    type Error = MoneyError;

    fn try_from(raw: RawMoney) -> Result<Self, MoneyError> {
        Money::new(raw.amount, raw.currency)
    }
}

impl Money {
    /// Create a monetary amount, validating the amount string.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::InvalidAmount`] if the amount does not parse
    /// as an `i64` minor-unit value.
    pub fn new(
        amount: impl Into<String>,
        currency: impl Into<String>,
    ) -> Result<Self, MoneyError> {
        let amount = amount.into();
        parse_minor_units(&amount)?;
        Ok(Self {
            amount,
            currency: currency.into(),
        })
    }

    /// The amount in minor units.
    pub fn minor_units(&self) -> i64 {
        // Validated at construction; stored strings always parse.
        self.amount.parse::<i64>().unwrap_or(0)
    }

    /// Whether the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.minor_units() > 0
    }

    /// Require that `other` is denominated in the same currency.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] on a differing currency.
    pub fn require_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                expected: self.currency.clone(),
                actual: other.currency.clone(),
            });
        }
        Ok(())
    }

    /// Add another amount in the same currency.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] or [`MoneyError::Overflow`].
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.require_same_currency(other)?;
        let sum = self
            .minor_units()
            .checked_add(other.minor_units())
            .ok_or_else(|| MoneyError::Overflow(other.amount.clone()))?;
        Ok(Money {
            amount: format_minor_units(sum),
            currency: self.currency.clone(),
        })
    }

    /// A zero amount in the given currency.
    pub fn zero(currency: impl Into<String>) -> Self {
        Self {
            amount: "0".to_string(),
            currency: currency.into(),
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// Parse a minor-unit amount string.
///
/// Invalid strings are rejected rather than silently defaulting to zero,
/// which could mask data corruption in settlement math.
pub fn parse_minor_units(s: &str) -> Result<i64, MoneyError> {
    s.parse::<i64>()
        .map_err(|_| MoneyError::InvalidAmount(s.to_string()))
}

/// Format an `i64` minor-unit amount back to its string form.
pub fn format_minor_units(n: i64) -> String {
    n.to_string()
}
