//! Conservation audit: the live ledger checked against a replay of its log.

use serde::Serialize;
use tracing::{info, warn};

use vault_core::{AccountId, Amount};
use vault_events::Projection;

use crate::audit_log::{AuditLog, AuditLogError};
use crate::ledger::Ledger;

use super::balances::BalanceProjection;

/// An account whose live balance differs from its replayed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceMismatch {
    pub account: AccountId,
    pub ledger: Amount,
    pub replayed: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConservationReport {
    /// Audit log head the replay covered.
    pub head: u64,
    pub accounts_checked: usize,
    pub total_deposited: Amount,
    pub total_withdrawn: Amount,
    /// Sum of live ledger balances.
    pub total_held: Amount,
    pub mismatches: Vec<BalanceMismatch>,
}

impl ConservationReport {
    /// Value held never exceeds deposits minus withdrawals, and every account
    /// agrees with its replay.
    pub fn holds(&self) -> bool {
        self.mismatches.is_empty()
            && self.total_held <= self.total_deposited.saturating_sub(self.total_withdrawn)
    }
}

/// Replay the ledger's audit log and compare it with the live balances.
///
/// Run against a quiescent ledger for an exact answer; operations committed
/// while the audit runs can show up as transient mismatches.
pub fn audit_conservation<L: AuditLog>(ledger: &Ledger<L>) -> Result<ConservationReport, AuditLogError> {
    let projection = BalanceProjection::rebuild_from(ledger.audit_log())?;

    let mut accounts: Vec<AccountId> = ledger.accounts();
    accounts.extend(projection.accounts().map(|(id, _)| id));
    accounts.sort();
    accounts.dedup();

    let mismatches: Vec<BalanceMismatch> = accounts
        .iter()
        .filter_map(|&account| {
            let live = ledger.balance_of(account);
            let replayed = projection.balance_of(account);
            (live != replayed).then_some(BalanceMismatch {
                account,
                ledger: live,
                replayed,
            })
        })
        .collect();

    let report = ConservationReport {
        head: projection.cursor(),
        accounts_checked: accounts.len(),
        total_deposited: projection.total_deposited(),
        total_withdrawn: projection.total_withdrawn(),
        total_held: ledger.total_held(),
        mismatches,
    };

    if report.holds() {
        info!(head = report.head, accounts = report.accounts_checked, "conservation audit passed");
    } else {
        warn!(
            head = report.head,
            mismatches = report.mismatches.len(),
            total_held = %report.total_held,
            "conservation audit failed"
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit_log::{AuditEntry, EventFilter, InMemoryAuditLog};
    use vault_accounts::LedgerEvent;

    fn ether(s: &str) -> Amount {
        Amount::parse_ether(s).unwrap()
    }

    #[test]
    fn healthy_ledger_conserves_value() {
        let ledger = Ledger::new(InMemoryAuditLog::new());
        let a = AccountId::new();
        let b = AccountId::new();
        ledger.deposit(a, ether("1.0")).unwrap();
        ledger.deposit(b, ether("0.5")).unwrap();
        ledger.withdraw(a, ether("0.4")).unwrap();

        let report = audit_conservation(&ledger).unwrap();

        assert!(report.holds());
        assert_eq!(report.head, 3);
        assert_eq!(report.accounts_checked, 2);
        assert_eq!(report.total_held, ether("1.1"));
        assert_eq!(report.total_deposited, ether("1.5"));
        assert_eq!(report.total_withdrawn, ether("0.4"));
    }

    /// Records deposits but fails every withdrawal append.
    struct LossyLog {
        inner: InMemoryAuditLog,
    }

    impl AuditLog for LossyLog {
        fn append(&self, event: LedgerEvent) -> Result<AuditEntry, AuditLogError> {
            match event {
                LedgerEvent::Withdrawn(_) => Err(AuditLogError::SequenceExhausted),
                other => self.inner.append(other),
            }
        }

        fn page(&self, filter: &EventFilter, after: u64, limit: usize) -> Result<Vec<AuditEntry>, AuditLogError> {
            self.inner.page(filter, after, limit)
        }

        fn head(&self) -> Result<u64, AuditLogError> {
            self.inner.head()
        }
    }

    #[test]
    fn unrecorded_withdrawal_is_reported() {
        let ledger = Ledger::new(LossyLog {
            inner: InMemoryAuditLog::new(),
        });
        let a = AccountId::new();
        ledger.deposit(a, ether("1.0")).unwrap();
        assert!(ledger.withdraw(a, ether("0.3")).is_err());

        let report = audit_conservation(&ledger).unwrap();

        // The value left, so the ledger holds less than the log accounts for.
        assert_eq!(
            report.mismatches,
            vec![BalanceMismatch {
                account: a,
                ledger: ether("0.7"),
                replayed: ether("1.0"),
            }]
        );
        assert!(!report.holds());
    }
}
