//! Read models built from the audit log.
//!
//! All projections are:
//! - **Rebuildable**: reconstructed by replaying the log from sequence 1
//! - **Idempotent**: safe for at-least-once delivery

pub mod balances;
pub mod conservation;

pub use balances::{AccountTotals, BalanceProjection};
pub use conservation::{BalanceMismatch, ConservationReport, audit_conservation};
