use std::sync::RwLock;

use vault_accounts::LedgerEvent;

use super::query::EventFilter;
use super::r#trait::{AuditEntry, AuditLog, AuditLogError};

/// In-memory append-only audit log.
///
/// Entry `n` (1-based sequence) lives at index `n - 1`, so ranged reads start
/// by index instead of scanning from the beginning.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditLog for InMemoryAuditLog {
    fn append(&self, event: LedgerEvent) -> Result<AuditEntry, AuditLogError> {
        let mut entries = self.entries.write().map_err(|_| AuditLogError::Poisoned)?;

        let sequence = u64::try_from(entries.len())
            .ok()
            .and_then(|len| len.checked_add(1))
            .ok_or(AuditLogError::SequenceExhausted)?;

        let entry = AuditEntry::commit(event, sequence);
        entries.push(entry.clone());

        Ok(entry)
    }

    fn page(
        &self,
        filter: &EventFilter,
        after: u64,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, AuditLogError> {
        filter.validate()?;
        let entries = self.entries.read().map_err(|_| AuditLogError::Poisoned)?;

        let start = usize::try_from(after).unwrap_or(usize::MAX).min(entries.len());
        let end = filter
            .to_sequence
            .and_then(|to| usize::try_from(to).ok())
            .map_or(entries.len(), |to| to.min(entries.len()));
        if start >= end {
            return Ok(vec![]);
        }

        Ok(entries[start..end]
            .iter()
            .filter(|e| filter.matches(e))
            .take(limit)
            .cloned()
            .collect())
    }

    fn head(&self) -> Result<u64, AuditLogError> {
        let entries = self.entries.read().map_err(|_| AuditLogError::Poisoned)?;
        Ok(entries.len() as u64)
    }
}
