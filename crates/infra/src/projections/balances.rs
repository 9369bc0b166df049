//! Per-account balance read model rebuilt from the audit log.

use std::collections::BTreeMap;

use serde::Serialize;

use vault_accounts::LedgerEvent;
use vault_core::{AccountId, Amount};
use vault_events::{EventEnvelope, Projection};

use crate::audit_log::{AuditLog, AuditLogError, EventFilter};

/// Running totals of one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccountTotals {
    pub deposited: Amount,
    pub withdrawn: Amount,
}

impl AccountTotals {
    pub fn balance(&self) -> Amount {
        self.deposited.saturating_sub(self.withdrawn)
    }
}

/// Balance projection over the `Deposited`/`Withdrawn` feed.
///
/// Idempotent: envelopes at or below the cursor are ignored, so it can be fed
/// from both a live bus subscription and a replay without double counting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceProjection {
    accounts: BTreeMap<AccountId, AccountTotals>,
    cursor: u64,
}

impl BalanceProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh projection from every entry in `log`.
    pub fn rebuild_from<L: AuditLog>(log: &L) -> Result<Self, AuditLogError> {
        let mut projection = Self::new();
        projection.catch_up(log)?;
        Ok(projection)
    }

    /// Apply every entry committed after the cursor; returns how many were applied.
    pub fn catch_up<L: AuditLog>(&mut self, log: &L) -> Result<usize, AuditLogError> {
        let mut applied = 0;
        for entry in log.events(EventFilter::all().from_sequence(self.cursor + 1))? {
            self.apply(&entry?.to_envelope());
            applied += 1;
        }
        Ok(applied)
    }

    pub fn totals(&self, account: AccountId) -> AccountTotals {
        self.accounts.get(&account).copied().unwrap_or_default()
    }

    pub fn balance_of(&self, account: AccountId) -> Amount {
        self.totals(account).balance()
    }

    pub fn accounts(&self) -> impl Iterator<Item = (AccountId, AccountTotals)> + '_ {
        self.accounts.iter().map(|(id, totals)| (*id, *totals))
    }

    pub fn total_deposited(&self) -> Amount {
        self.accounts.values().map(|t| t.deposited).sum()
    }

    pub fn total_withdrawn(&self) -> Amount {
        self.accounts.values().map(|t| t.withdrawn).sum()
    }
}

impl Projection for BalanceProjection {
    type Ev = LedgerEvent;

    fn apply(&mut self, envelope: &EventEnvelope<LedgerEvent>) {
        if envelope.sequence_number() <= self.cursor {
            return;
        }

        let totals = self.accounts.entry(envelope.account_id()).or_default();
        match envelope.payload() {
            LedgerEvent::Deposited(e) => totals.deposited = totals.deposited.saturating_add(e.amount),
            LedgerEvent::Withdrawn(e) => totals.withdrawn = totals.withdrawn.saturating_add(e.amount),
        }
        self.cursor = envelope.sequence_number();
    }

    fn cursor(&self) -> u64 {
        self.cursor
    }
}
