//! Ledger core: the authoritative per-account balance store.
//!
//! ## Operation Flow
//!
//! ```text
//! deposit:   enter slot → handle → append → apply → leave
//! withdraw:  enter slot → handle → apply (debit) → payout → append → leave
//! ```
//!
//! Every operation runs inside the account's critical section (see
//! [`slot`]). A withdrawal debits the balance before value is released, so a
//! payout that calls back into the ledger observes the reduced balance, and a
//! nested call on the same account is rejected outright. Other threads keep
//! seeing the committed balance until the operation finishes.
//!
//! A payout may operate on other accounts. If one of those is held by another
//! thread the nested call fails with [`LedgerError::Busy`] instead of waiting.
//!
//! ## Failure Semantics
//!
//! - Rejected commands (invalid amount, insufficient balance, re-entry, busy) change
//!   nothing and emit nothing.
//! - A failed payout restores the pre-call account state; no event is emitted.
//! - A failed audit append on deposit leaves the balance untouched. On
//!   withdrawal the value has already left, so the debit stands and the
//!   failure is reported as [`LedgerError::AuditLog`].

mod slot;

pub mod payout;

pub use payout::{InMemoryPayout, LoggingPayout, Payout, PayoutError};

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, warn};

use vault_accounts::{AccountCommand, Deposit, LedgerEvent, VaultAccount, Withdraw};
use vault_core::{AccountId, Aggregate, Amount, DomainError};

use crate::audit_log::{AuditEntry, AuditLog, AuditLogError};
use slot::{AccountSlot, EnterError};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    #[error("reentrant call rejected for account {account}")]
    ReentrancyRejected { account: AccountId },

    #[error("account {account} is busy in another operation")]
    Busy { account: AccountId },

    #[error("balance overflow")]
    Overflow,

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Payout(#[from] PayoutError),

    #[error("audit log: {0}")]
    AuditLog(#[from] AuditLogError),

    #[error("ledger lock poisoned")]
    Poisoned,
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvalidAmount(msg) => LedgerError::InvalidAmount(msg),
            DomainError::InsufficientBalance {
                requested,
                available,
            } => LedgerError::InsufficientBalance {
                requested,
                available,
            },
            DomainError::Overflow => LedgerError::Overflow,
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => LedgerError::Invariant(msg),
        }
    }
}

/// The vault's balance ledger.
///
/// One instance per process, shared by `Arc`. Accounts are created on first
/// deposit; the account map lock is held only to look up or insert a slot, so
/// operations on different accounts never wait on each other.
pub struct Ledger<L> {
    accounts: RwLock<HashMap<AccountId, Arc<AccountSlot>>>,
    audit_log: L,
    payout: Box<dyn Payout>,
}

impl<L> core::fmt::Debug for Ledger<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ledger")
            .field("accounts", &self.read_accounts().len())
            .finish_non_exhaustive()
    }
}

impl<L> Ledger<L> {
    /// Current balance; zero for accounts that never deposited.
    pub fn balance_of(&self, account: AccountId) -> Amount {
        self.read_accounts()
            .get(&account)
            .map_or(Amount::ZERO, |slot| slot.balance())
    }

    /// Sum of all balances currently held.
    pub fn total_held(&self) -> Amount {
        self.read_accounts().values().map(|slot| slot.balance()).sum()
    }

    /// Every account that has ever deposited, in id order.
    pub fn accounts(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self.read_accounts().keys().copied().collect();
        ids.sort();
        ids
    }

    fn read_accounts(&self) -> RwLockReadGuard<'_, HashMap<AccountId, Arc<AccountSlot>>> {
        self.accounts.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<L> Ledger<L>
where
    L: AuditLog,
{
    /// Ledger whose withdrawals are released through [`LoggingPayout`].
    pub fn new(audit_log: L) -> Self {
        Self::with_payout(audit_log, LoggingPayout)
    }

    pub fn with_payout(audit_log: L, payout: impl Payout + 'static) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            audit_log,
            payout: Box::new(payout),
        }
    }

    pub fn audit_log(&self) -> &L {
        &self.audit_log
    }

    /// Credit `amount` to `account` and record a `Deposited` entry.
    pub fn deposit(&self, account: AccountId, amount: Amount) -> Result<AuditEntry, LedgerError> {
        let slot = self.slot_or_insert(account)?;
        let guard = enter(&slot, account)?;

        let command = AccountCommand::Deposit(Deposit {
            account,
            amount,
            occurred_at: Utc::now(),
        });
        let event = decide(&guard.snapshot(), &command).inspect_err(|e| {
            warn!(account = %account, amount = %amount, error = %e, "deposit rejected");
        })?;

        let entry = self.audit_log.append(event.clone()).inspect_err(|e| {
            warn!(account = %account, amount = %amount, error = %e, "deposit not recorded");
        })?;
        guard.update(|state| state.apply(&event));
        guard.commit();

        debug!(account = %account, amount = %amount, sequence = entry.sequence, "deposited");
        Ok(entry)
    }

    /// Debit `amount` from `account` and release it through the configured payout.
    pub fn withdraw(&self, account: AccountId, amount: Amount) -> Result<AuditEntry, LedgerError> {
        self.withdraw_to(account, amount, self.payout.as_ref())
    }

    /// Debit `amount` from `account` and release it through `payout`.
    ///
    /// The payout runs while the account is held. A nested call on the same
    /// thread is rejected with [`LedgerError::ReentrancyRejected`], and a
    /// nested call on an account held elsewhere with [`LedgerError::Busy`]. A
    /// payout that hands the same account to a fresh thread and joins it
    /// deadlocks.
    pub fn withdraw_to(
        &self,
        account: AccountId,
        amount: Amount,
        payout: &dyn Payout,
    ) -> Result<AuditEntry, LedgerError> {
        let command = AccountCommand::Withdraw(Withdraw {
            account,
            amount,
            occurred_at: Utc::now(),
        });

        let Some(slot) = self.slot(account)? else {
            // Unknown account: decide against an empty one without registering it.
            let event = decide(&VaultAccount::empty(account), &command).inspect_err(|e| {
                warn!(account = %account, amount = %amount, error = %e, "withdraw rejected");
            })?;
            return Err(LedgerError::Invariant(format!(
                "{} accepted for an account with no balance",
                event.kind()
            )));
        };
        let guard = enter(&slot, account)?;

        let event = decide(&guard.snapshot(), &command).inspect_err(|e| {
            warn!(account = %account, amount = %amount, error = %e, "withdraw rejected");
        })?;

        guard.update(|state| state.apply(&event));

        if let Err(e) = payout.release(account, amount) {
            guard.rollback();
            warn!(account = %account, amount = %amount, error = %e, "payout failed, debit rolled back");
            return Err(e.into());
        }

        let appended = self.audit_log.append(event);
        // Value has left: the debit stands whether or not the append succeeded.
        guard.commit();
        let entry = appended.inspect_err(|e| {
            error!(
                account = %account,
                amount = %amount,
                error = %e,
                "value released but withdrawal not recorded"
            );
        })?;

        debug!(account = %account, amount = %amount, sequence = entry.sequence, "withdrawn");
        Ok(entry)
    }

    fn slot(&self, account: AccountId) -> Result<Option<Arc<AccountSlot>>, LedgerError> {
        let accounts = self.accounts.read().map_err(|_| LedgerError::Poisoned)?;
        Ok(accounts.get(&account).cloned())
    }

    fn slot_or_insert(&self, account: AccountId) -> Result<Arc<AccountSlot>, LedgerError> {
        if let Some(slot) = self.slot(account)? {
            return Ok(slot);
        }
        let mut accounts = self.accounts.write().map_err(|_| LedgerError::Poisoned)?;
        Ok(Arc::clone(
            accounts
                .entry(account)
                .or_insert_with(|| Arc::new(AccountSlot::new(account))),
        ))
    }
}

fn enter(slot: &AccountSlot, account: AccountId) -> Result<slot::SlotGuard<'_>, LedgerError> {
    slot.enter().map_err(|e| match e {
        EnterError::Reentrant => {
            warn!(account = %account, "reentrant call rejected");
            LedgerError::ReentrancyRejected { account }
        }
        EnterError::Busy => {
            warn!(account = %account, "account busy, nested call rejected");
            LedgerError::Busy { account }
        }
        EnterError::Poisoned => LedgerError::Poisoned,
    })
}

/// Run the aggregate's decision and require exactly one event.
fn decide(account: &VaultAccount, command: &AccountCommand) -> Result<LedgerEvent, LedgerError> {
    let events = account.handle(command)?;
    let [event] = <[LedgerEvent; 1]>::try_from(events).map_err(|events| {
        LedgerError::Invariant(format!("expected one event, got {}", events.len()))
    })?;
    Ok(event)
}
