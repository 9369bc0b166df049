//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus distributes committed audit entries to in-process consumers such as
//! balance projections. The HTTP service reads the audit log directly and
//! does not wire a bus; embedders compose one through `PublishingAuditLog`.
//! It is not a store: the audit log is the source of truth and a
//! consumer that misses messages rebuilds from it.
//!
//! Delivery is at-least-once; consumers must be idempotent (projections skip
//! sequence numbers they have already seen).

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to an event stream.
///
/// Each subscription gets a copy of every message published after it was
/// created (broadcast semantics). Intended for a single consuming thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently queued without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Transport-agnostic pub/sub.
///
/// ```text
/// Ledger → Audit Log (append) → Event Bus (publish) → Consumers
/// ```
///
/// Messages are published only after the append succeeded, so a failed
/// publication never loses an event.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
