//! Audit log reads: filters, pagination and the lazy event cursor.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use vault_accounts::EventKind;
use vault_core::AccountId;

use super::r#trait::{AuditEntry, AuditLog, AuditLogError};

/// Page size used by cursors unless overridden.
pub const DEFAULT_PAGE_SIZE: usize = 64;

/// Pagination parameters for ranged reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of entries to return.
    pub limit: u32,
    /// Return entries strictly after this sequence number.
    pub after: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { limit: 50, after: 0 }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, after: Option<u64>) -> Self {
        Self {
            limit: limit.unwrap_or(50).clamp(1, 1000),
            after: after.unwrap_or(0),
        }
    }
}

/// Filter criteria for audit reads. Every field is optional; bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub account: Option<AccountId>,
    pub kind: Option<EventKind>,
    pub from_sequence: Option<u64>,
    pub to_sequence: Option<u64>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_account(account: AccountId) -> Self {
        Self {
            account: Some(account),
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn from_sequence(mut self, sequence: u64) -> Self {
        self.from_sequence = Some(sequence);
        self
    }

    pub fn to_sequence(mut self, sequence: u64) -> Self {
        self.to_sequence = Some(sequence);
        self
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.account.is_none_or(|a| a == entry.account())
            && self.kind.is_none_or(|k| k == entry.kind())
            && self.from_sequence.is_none_or(|from| entry.sequence >= from)
            && self.to_sequence.is_none_or(|to| entry.sequence <= to)
    }

    pub fn validate(&self) -> Result<(), AuditLogError> {
        if let (Some(from), Some(to)) = (self.from_sequence, self.to_sequence) {
            if from > to {
                return Err(AuditLogError::InvalidQuery(format!(
                    "from_sequence {from} is after to_sequence {to}"
                )));
            }
        }
        Ok(())
    }

    fn start_after(&self) -> u64 {
        self.from_sequence.unwrap_or(1).saturating_sub(1)
    }
}

/// Lazy, finite, restartable iterator over audit entries.
///
/// - **Lazy**: entries are pulled from the log one page at a time.
/// - **Finite**: the upper bound is frozen when the cursor is created.
/// - **Restartable**: [`EventCursor::restart`] rewinds to the first match.
///
/// Yields `Err` at most once (a failed page read ends the iteration).
pub struct EventCursor<'a, L: ?Sized> {
    log: &'a L,
    filter: EventFilter,
    upper: u64,
    position: u64,
    buffer: VecDeque<AuditEntry>,
    page_size: usize,
    exhausted: bool,
}

impl<'a, L> EventCursor<'a, L>
where
    L: AuditLog + ?Sized,
{
    pub(crate) fn new(log: &'a L, mut filter: EventFilter, head: u64) -> Self {
        let upper = filter.to_sequence.map_or(head, |to| to.min(head));
        filter.to_sequence = Some(upper);
        let position = filter.start_after();

        Self {
            log,
            filter,
            upper,
            position,
            buffer: VecDeque::new(),
            page_size: DEFAULT_PAGE_SIZE,
            exhausted: false,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Highest sequence number this cursor can yield.
    pub fn upper_bound(&self) -> u64 {
        self.upper
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Rewind to the first matching entry. The frozen upper bound is kept.
    pub fn restart(&mut self) {
        self.position = self.filter.start_after();
        self.buffer.clear();
        self.exhausted = false;
    }
}

impl<L> Clone for EventCursor<'_, L>
where
    L: ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            log: self.log,
            filter: self.filter.clone(),
            upper: self.upper,
            position: self.position,
            buffer: self.buffer.clone(),
            page_size: self.page_size,
            exhausted: self.exhausted,
        }
    }
}

impl<L> Iterator for EventCursor<'_, L>
where
    L: AuditLog + ?Sized,
{
    type Item = Result<AuditEntry, AuditLogError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Some(Ok(entry));
            }
            if self.exhausted || self.position >= self.upper {
                return None;
            }

            match self.log.page(&self.filter, self.position, self.page_size) {
                Ok(page) => {
                    if page.len() < self.page_size {
                        self.exhausted = true;
                    }
                    match page.last() {
                        Some(last) => self.position = last.sequence,
                        None => return None,
                    }
                    self.buffer.extend(page);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
