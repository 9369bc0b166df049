use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use std::sync::Arc;

use vault_accounts::{EventKind, LedgerEvent};
use vault_core::{AccountId, Amount};
use vault_events::{Event, EventEnvelope};

use super::query::{EventCursor, EventFilter};

/// A committed audit entry (assigned a sequence number).
///
/// ## Sequence Numbers
///
/// Assigned by the log at append time and:
/// - **Global**: one sequence across all accounts, like a block height
/// - **Gap-free**: the n-th committed entry has sequence `n`, starting at 1
/// - **Immutable**: once assigned, never reused or changed
///
/// Write order is the only valid order. `recorded_at` is informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub event_id: Uuid,
    pub sequence: u64,

    pub event_type: String,
    pub event_version: u32,
    pub recorded_at: DateTime<Utc>,

    pub event: LedgerEvent,
}

impl AuditEntry {
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }

    pub fn account(&self) -> AccountId {
        self.event.account()
    }

    pub fn amount(&self) -> Amount {
        self.event.amount()
    }

    /// Convert into an envelope for publication on an event bus.
    pub fn to_envelope(&self) -> EventEnvelope<LedgerEvent> {
        EventEnvelope::new(
            self.event_id,
            self.account(),
            self.event_type.clone(),
            self.sequence,
            self.event.clone(),
        )
    }
}

impl From<&AuditEntry> for EventEnvelope<LedgerEvent> {
    fn from(entry: &AuditEntry) -> Self {
        entry.to_envelope()
    }
}

/// Audit log operation error.
///
/// Infrastructure failures only; a rejected deposit or withdrawal never
/// reaches the log.
#[derive(Debug, Error)]
pub enum AuditLogError {
    #[error("audit log lock poisoned")]
    Poisoned,

    #[error("sequence space exhausted")]
    SequenceExhausted,

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Append-only record of every balance change.
///
/// ## Design
///
/// - **Append-only**: there is no update or delete.
/// - **Sequenced**: `append` assigns `head() + 1`.
/// - **Atomic per entry**: an entry is either fully visible to readers or not
///   at all.
///
/// Readers use [`AuditLog::events`], a lazy cursor built on the
/// [`AuditLog::page`] primitive so any backend that can serve ranged pages
/// gets the cursor for free.
pub trait AuditLog: Send + Sync {
    /// Append one event and return the committed entry.
    fn append(&self, event: LedgerEvent) -> Result<AuditEntry, AuditLogError>;

    /// Entries matching `filter` with `sequence > after`, ascending, at most `limit`.
    fn page(
        &self,
        filter: &EventFilter,
        after: u64,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, AuditLogError>;

    /// Latest assigned sequence number (0 for an empty log).
    fn head(&self) -> Result<u64, AuditLogError>;

    /// Lazy, finite, restartable view over the entries matching `filter`.
    ///
    /// The upper bound is frozen at `min(filter.to_sequence, head())` when the
    /// cursor is created; later appends are not observed by it.
    fn events(&self, filter: EventFilter) -> Result<EventCursor<'_, Self>, AuditLogError>
    where
        Self: Sized,
    {
        filter.validate()?;
        let head = self.head()?;
        Ok(EventCursor::new(self, filter, head))
    }
}

impl<L> AuditLog for Arc<L>
where
    L: AuditLog + ?Sized,
{
    fn append(&self, event: LedgerEvent) -> Result<AuditEntry, AuditLogError> {
        (**self).append(event)
    }

    fn page(
        &self,
        filter: &EventFilter,
        after: u64,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, AuditLogError> {
        (**self).page(filter, after, limit)
    }

    fn head(&self) -> Result<u64, AuditLogError> {
        (**self).head()
    }
}

impl AuditEntry {
    /// Build the committed form of `event` at `sequence`.
    pub fn commit(event: LedgerEvent, sequence: u64) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            sequence,
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            recorded_at: Utc::now(),
            event,
        }
    }
}
