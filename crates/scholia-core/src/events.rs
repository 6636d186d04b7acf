//! In-process publish/subscribe backed by a `tokio::sync::broadcast` channel.
//!
//! Every component that reports something to the outside (the gateway's
//! error channel, a thread's lifecycle events, the annotator) owns an
//! [`EventHub`] over its own event enum. Subscribing returns a receiver;
//! dropping the receiver is the unsubscribe.

use tokio::sync::broadcast;

use crate::TRACING_TARGET_EVENTS;

/// Publish/subscribe hub for a single event type.
///
/// Cloning the hub yields another handle to the same channel.
#[derive(Clone)]
pub struct EventHub<E> {
    sender: broadcast::Sender<E>,
}

impl<E> std::fmt::Debug for EventHub<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl<E: Clone + Send + 'static> EventHub<E> {
    /// Default number of buffered events per subscriber.
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Creates a hub with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a hub buffering up to `capacity` events per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to all events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    /// Emits an event, returning how many subscribers received it.
    ///
    /// Emitting without subscribers is not an error.
    pub fn emit(&self, event: E) -> usize {
        match self.sender.send(event) {
            Ok(delivered) => delivered,
            Err(_) => {
                tracing::trace!(
                    target: TRACING_TARGET_EVENTS,
                    "Event dropped, no subscribers"
                );
                0
            }
        }
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E: Clone + Send + 'static> Default for EventHub<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;

    #[test]
    fn emit_without_subscribers_is_harmless() {
        let hub = EventHub::<u32>::new();
        assert_eq!(hub.emit(1), 0);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn subscribers_receive_events_in_order() {
        let hub = EventHub::<&'static str>::new();
        let mut first = hub.subscribe();
        let mut second = hub.clone().subscribe();

        assert_eq!(hub.emit("saved"), 2);
        assert_eq!(hub.emit("cancel"), 2);

        assert_eq!(first.try_recv().unwrap(), "saved");
        assert_eq!(first.try_recv().unwrap(), "cancel");
        assert_eq!(second.try_recv().unwrap(), "saved");
    }

    #[test]
    fn dropping_the_receiver_unsubscribes() {
        let hub = EventHub::<u8>::new();
        let receiver = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);

        drop(receiver);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn late_subscribers_miss_earlier_events() {
        let hub = EventHub::<u8>::new();
        hub.emit(1);

        let mut receiver = hub.subscribe();
        assert!(matches!(receiver.try_recv(), Err(TryRecvError::Empty)));
    }
}
