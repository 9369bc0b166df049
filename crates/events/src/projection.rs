use crate::{Event, EventEnvelope};

/// A projection builds a read model from the append-only audit log.
///
/// Read models are disposable: the log is the source of truth, and any
/// projection can be cleared and rebuilt by replaying it from sequence 1.
///
/// ## Idempotency
///
/// Events may be delivered more than once (bus redelivery, replay after
/// live delivery). Applying an envelope whose `sequence_number` was already
/// applied must be a no-op; tracking the highest applied sequence is enough
/// because the log is gap-free and totally ordered.
pub trait Projection {
    type Ev: Event;

    /// Apply a single committed event to the read model.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);

    /// Highest sequence number applied so far (0 when empty).
    fn cursor(&self) -> u64;
}
