//! Vault accounts (event-sourced balance aggregate).
//!
//! Pure domain logic only: no locking, no IO, no persistence concerns.

pub mod account;

pub use account::{
    AccountCommand, Deposit, Deposited, EventKind, LedgerEvent, VaultAccount, Withdraw, Withdrawn,
};
