use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vault_core::AccountId;

/// Envelope for a committed event, carrying its position in the audit log.
///
/// This is the unit published to subscribers once an append has succeeded.
///
/// - `sequence_number` is the global, gap-free audit position (1, 2, 3, ...).
/// - `account_id` is the account whose balance the event changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    account_id: AccountId,
    event_type: String,

    /// Monotonically increasing position in the audit log.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        account_id: AccountId,
        event_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            account_id,
            event_type: event_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
