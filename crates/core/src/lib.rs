//! `vault-core` - domain foundation building blocks for the vault ledger.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! account identity, the wei-denominated `Amount`, the domain error model and
//! the aggregate traits the account state machine is written against.

pub mod aggregate;
pub mod amount;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot};
pub use amount::{Amount, ETHER_DECIMALS};
pub use error::{DomainError, DomainResult};
pub use id::AccountId;
pub use value_object::ValueObject;
