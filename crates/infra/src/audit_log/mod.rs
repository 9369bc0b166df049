//! Audit log: the append-only, sequenced record of every balance change.

pub mod in_memory;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryAuditLog;
pub use query::{DEFAULT_PAGE_SIZE, EventCursor, EventFilter, Pagination};
pub use r#trait::{AuditEntry, AuditLog, AuditLogError};

use vault_accounts::LedgerEvent;
use vault_events::{EventBus, EventEnvelope};

/// Audit log decorator that publishes every committed entry to an event bus.
///
/// Publication happens only after the append succeeded. A failed publish is
/// logged and otherwise ignored: the entry is already committed and bus
/// consumers recover by reading the log.
///
/// Library-level composition: the HTTP service wires the plain log.
#[derive(Debug)]
pub struct PublishingAuditLog<L, B> {
    log: L,
    bus: B,
}

impl<L, B> PublishingAuditLog<L, B> {
    pub fn new(log: L, bus: B) -> Self {
        Self { log, bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_parts(self) -> (L, B) {
        (self.log, self.bus)
    }
}

impl<L, B> AuditLog for PublishingAuditLog<L, B>
where
    L: AuditLog,
    B: EventBus<EventEnvelope<LedgerEvent>>,
{
    fn append(&self, event: LedgerEvent) -> Result<AuditEntry, AuditLogError> {
        let entry = self.log.append(event)?;

        if let Err(err) = self.bus.publish(entry.to_envelope()) {
            tracing::warn!(
                sequence = entry.sequence,
                account = %entry.account(),
                error = ?err,
                "failed to publish committed audit entry"
            );
        }

        Ok(entry)
    }

    fn page(
        &self,
        filter: &EventFilter,
        after: u64,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, AuditLogError> {
        self.log.page(filter, after, limit)
    }

    fn head(&self) -> Result<u64, AuditLogError> {
        self.log.head()
    }
}
