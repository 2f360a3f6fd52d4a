//! Registered subscribers and the type-erased delivery path.

use super::types::Subscriber;
use crate::types::{Message, SubscriberId, Topic};
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Registration numbers are process-wide so descriptors from one bus can
/// never match a handle on another.
static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_serial() -> u64 {
    NEXT_SERIAL.fetch_add(1, Ordering::Relaxed)
}

/// A published value bound to its topic. Lives for one publish call and
/// the deliveries it spawns.
#[derive(Clone)]
pub(crate) struct Envelope {
    topic: Topic,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Envelope {
    pub(crate) fn new<T: Message>(message: Arc<T>) -> Self {
        Self {
            topic: Topic::of::<T>(),
            payload: message,
        }
    }

    pub(crate) fn topic(&self) -> Topic {
        self.topic
    }
}

/// Object-safe view of a [`Handle`], so handles of every message type can
/// share one registry map.
pub(crate) trait Deliver: Send + Sync {
    fn id(&self) -> SubscriberId;

    fn topic(&self) -> Topic;

    fn serial(&self) -> u64;

    /// Hand one message to the consumer. May block.
    fn deliver(&self, envelope: Envelope);
}

/// One registered consumer bound to a topic and an id.
pub(crate) struct Handle<T> {
    id: SubscriberId,
    topic: Topic,
    serial: u64,
    subscriber: Subscriber<T>,
}

impl<T: Message> Handle<T> {
    pub(crate) fn new(id: SubscriberId, serial: u64, subscriber: Subscriber<T>) -> Self {
        Self {
            id,
            topic: Topic::of::<T>(),
            serial,
            subscriber,
        }
    }
}

impl<T: Message> Deliver for Handle<T> {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn topic(&self) -> Topic {
        self.topic
    }

    fn serial(&self) -> u64 {
        self.serial
    }

    fn deliver(&self, envelope: Envelope) {
        let message = match envelope.payload.downcast::<T>() {
            Ok(message) => message,
            Err(_) => {
                error!(
                    topic = %self.topic,
                    got = %envelope.topic,
                    id = %self.id,
                    "envelope routed to a subscriber of another topic"
                );
                return;
            }
        };

        match &self.subscriber {
            Subscriber::Direct(receiver) => receiver.receive(message),
            Subscriber::Queue(sender) => {
                if sender.send(message).is_err() {
                    debug!(topic = %self.topic, id = %self.id, "queue receiver dropped, message discarded");
                }
            }
        }
    }
}
