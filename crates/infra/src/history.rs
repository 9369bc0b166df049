//! History reconstruction.
//!
//! An account's history is rebuilt from two independently fetched sub-logs,
//! its deposits and its withdrawals. Either fetch may fail; the merge then
//! returns what is available and records which side is missing.

use core::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use vault_accounts::EventKind;
use vault_core::{AccountId, Amount};

use crate::audit_log::{AuditEntry, AuditLog, AuditLogError, EventFilter};

/// Presentation order of a history view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    /// Canonical audit order, oldest first.
    #[serde(rename = "asc")]
    Ascending,
    /// Newest first.
    #[default]
    #[serde(rename = "desc")]
    Descending,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            other => Err(HistoryError::InvalidOrder(other.to_string())),
        }
    }
}

/// One balance change as shown in a history view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sequence: u64,
    pub event_id: Uuid,
    pub kind: EventKind,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

impl From<&AuditEntry> for HistoryEntry {
    fn from(entry: &AuditEntry) -> Self {
        use vault_events::Event;

        Self {
            sequence: entry.sequence,
            event_id: entry.event_id,
            kind: entry.kind(),
            amount: entry.amount(),
            occurred_at: entry.event.occurred_at(),
        }
    }
}

/// Merged, ordered history of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryView {
    pub entries: Vec<HistoryEntry>,
    pub order: SortOrder,
    /// Sub-logs that could not be fetched; empty when the view is complete.
    pub missing: Vec<EventKind>,
}

impl HistoryView {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history source unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    AuditLog(#[from] AuditLogError),

    #[error("invalid sort order '{0}' (expected asc or desc)")]
    InvalidOrder(String),
}

/// Merge the two sub-logs of one account.
///
/// `None` marks a sub-log that could not be fetched. Entries are ordered by
/// sequence and duplicate sequence numbers are kept once.
pub fn merge(
    deposits: Option<Vec<HistoryEntry>>,
    withdrawals: Option<Vec<HistoryEntry>>,
    order: SortOrder,
) -> HistoryView {
    let mut missing = Vec::new();
    let mut entries = Vec::new();

    for (kind, part) in [(EventKind::Deposit, deposits), (EventKind::Withdraw, withdrawals)] {
        match part {
            Some(part) => entries.extend(part),
            None => missing.push(kind),
        }
    }

    entries.sort_by_key(|e| e.sequence);
    entries.dedup_by_key(|e| e.sequence);
    if order == SortOrder::Descending {
        entries.reverse();
    }

    HistoryView {
        entries,
        order,
        missing,
    }
}

/// Where an account's sub-logs are fetched from.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch(&self, account: AccountId, kind: EventKind) -> Result<Vec<HistoryEntry>, HistoryError>;
}

/// History source reading straight from an audit log.
#[derive(Debug, Clone)]
pub struct AuditLogSource<L> {
    log: L,
}

impl<L> AuditLogSource<L> {
    pub fn new(log: L) -> Self {
        Self { log }
    }
}

#[async_trait]
impl<L> HistorySource for AuditLogSource<L>
where
    L: AuditLog,
{
    async fn fetch(&self, account: AccountId, kind: EventKind) -> Result<Vec<HistoryEntry>, HistoryError> {
        let cursor = self.log.events(EventFilter::for_account(account).kind(kind))?;
        cursor
            .map(|entry| entry.map(|e| HistoryEntry::from(&e)).map_err(HistoryError::from))
            .collect()
    }
}

/// Rebuilds account histories from a [`HistorySource`].
///
/// Both sub-logs are fetched concurrently. Dropping the returned future
/// abandons both fetches; every call returns an independent snapshot.
#[derive(Debug, Clone)]
pub struct HistoryReconstructor<S> {
    source: S,
    order: SortOrder,
}

impl<S> HistoryReconstructor<S>
where
    S: HistorySource,
{
    pub fn new(source: S, order: SortOrder) -> Self {
        Self { source, order }
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub async fn reconstruct(&self, account: AccountId) -> HistoryView {
        self.reconstruct_ordered(account, self.order).await
    }

    pub async fn reconstruct_ordered(&self, account: AccountId, order: SortOrder) -> HistoryView {
        let (deposits, withdrawals) = tokio::join!(
            self.source.fetch(account, EventKind::Deposit),
            self.source.fetch(account, EventKind::Withdraw),
        );

        merge(
            available(account, EventKind::Deposit, deposits),
            available(account, EventKind::Withdraw, withdrawals),
            order,
        )
    }
}

fn available(
    account: AccountId,
    kind: EventKind,
    fetched: Result<Vec<HistoryEntry>, HistoryError>,
) -> Option<Vec<HistoryEntry>> {
    fetched
        .inspect_err(|e| warn!(account = %account, kind = %kind, error = %e, "history sub-log unavailable"))
        .ok()
}
