//! Domain error model.

use thiserror::Error;

use crate::amount::Amount;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic, business failures only (validation, invariants). Locking,
/// storage and payout failures belong to the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Amount was zero or could not be parsed.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Withdrawal exceeds the account's current balance.
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    /// Arithmetic on a balance would leave the representable range.
    #[error("amount overflow")]
    Overflow,

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
