use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vault_core::{AccountId, Aggregate, AggregateRoot, Amount, DomainError};
use vault_events::Event;

/// Direction of a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Deposit,
    Withdraw,
}

impl EventKind {
    pub const ALL: [EventKind; 2] = [EventKind::Deposit, EventKind::Withdraw];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Deposit => "deposit",
            EventKind::Withdraw => "withdraw",
        }
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deposit" | "deposited" => Ok(EventKind::Deposit),
            "withdraw" | "withdrawn" => Ok(EventKind::Withdraw),
            other => Err(DomainError::validation(format!(
                "unknown event kind '{other}' (expected deposit or withdraw)"
            ))),
        }
    }
}

/// Command: credit value contributed by the account holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub account: AccountId,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// Command: debit value to be released back to the account holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdraw {
    pub account: AccountId,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountCommand {
    Deposit(Deposit),
    Withdraw(Withdraw),
}

/// Event: Deposited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposited {
    pub account: AccountId,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Withdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawn {
    pub account: AccountId,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    Deposited(Deposited),
    Withdrawn(Withdrawn),
}

impl LedgerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LedgerEvent::Deposited(_) => EventKind::Deposit,
            LedgerEvent::Withdrawn(_) => EventKind::Withdraw,
        }
    }

    pub fn account(&self) -> AccountId {
        match self {
            LedgerEvent::Deposited(e) => e.account,
            LedgerEvent::Withdrawn(e) => e.account,
        }
    }

    pub fn amount(&self) -> Amount {
        match self {
            LedgerEvent::Deposited(e) => e.amount,
            LedgerEvent::Withdrawn(e) => e.amount,
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::Deposited(_) => "vault.account.deposited",
            LedgerEvent::Withdrawn(_) => "vault.account.withdrawn",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::Deposited(e) => e.occurred_at,
            LedgerEvent::Withdrawn(e) => e.occurred_at,
        }
    }
}

/// Aggregate root: one account's balance held by the vault.
///
/// The balance is never negative: `handle` refuses any withdrawal larger than
/// it, and `apply` only ever sees events `handle` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultAccount {
    id: AccountId,
    balance: Amount,
    version: u64,
}

impl VaultAccount {
    /// Empty aggregate (zero balance, no history).
    pub fn empty(id: AccountId) -> Self {
        Self {
            id,
            balance: Amount::ZERO,
            version: 0,
        }
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    fn ensure_account(&self, account: AccountId) -> Result<(), DomainError> {
        if account != self.id {
            return Err(DomainError::invariant(format!(
                "command for account {account} routed to account {}",
                self.id
            )));
        }
        Ok(())
    }

    fn handle_deposit(&self, cmd: &Deposit) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_account(cmd.account)?;

        if cmd.amount.is_zero() {
            return Err(DomainError::invalid_amount("deposit amount must be positive"));
        }
        self.balance
            .checked_add(cmd.amount)
            .ok_or(DomainError::Overflow)?;

        Ok(vec![LedgerEvent::Deposited(Deposited {
            account: cmd.account,
            amount: cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_withdraw(&self, cmd: &Withdraw) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_account(cmd.account)?;

        if cmd.amount.is_zero() {
            return Err(DomainError::invalid_amount("withdraw amount must be positive"));
        }
        if cmd.amount > self.balance {
            return Err(DomainError::InsufficientBalance {
                requested: cmd.amount,
                available: self.balance,
            });
        }

        Ok(vec![LedgerEvent::Withdrawn(Withdrawn {
            account: cmd.account,
            amount: cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }
}

impl AggregateRoot for VaultAccount {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for VaultAccount {
    type Command = AccountCommand;
    type Event = LedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            // Bounds were checked in `handle`.
            LedgerEvent::Deposited(e) => self.balance = self.balance.saturating_add(e.amount),
            LedgerEvent::Withdrawn(e) => self.balance = self.balance.saturating_sub(e.amount),
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AccountCommand::Deposit(cmd) => self.handle_deposit(cmd),
            AccountCommand::Withdraw(cmd) => self.handle_withdraw(cmd),
        }
    }
}
