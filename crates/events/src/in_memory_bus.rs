//! In-process event bus.

use std::sync::{Mutex, mpsc};

use crate::bus::{EventBus, Subscription};

#[derive(Debug, PartialEq, Eq)]
pub enum InMemoryBusError {
    /// Publish failed due to internal lock poisoning.
    Poisoned,
}

/// In-memory pub/sub bus.
///
/// Fan-out over `std::sync::mpsc`; subscribers whose receiver was dropped are
/// pruned on the next publish.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscribers as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut subs = self.subscribers.lock().map_err(|_| InMemoryBusError::Poisoned)?;

        subs.retain(|tx| tx.send(message.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // A poisoned lock still yields a subscription; it just never receives.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_receives_every_message() {
        let bus = InMemoryEventBus::<u64>::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(1).unwrap();
        bus.publish(2).unwrap();

        assert_eq!(a.drain(), vec![1, 2]);
        assert_eq!(b.drain(), vec![1, 2]);
    }

    #[test]
    fn late_subscribers_only_see_later_messages() {
        let bus = InMemoryEventBus::<u64>::new();
        bus.publish(1).unwrap();
        let sub = bus.subscribe();
        bus.publish(2).unwrap();

        assert_eq!(sub.drain(), vec![2]);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = InMemoryEventBus::<u64>::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(7).unwrap();

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.try_recv().unwrap(), 7);
    }
}
