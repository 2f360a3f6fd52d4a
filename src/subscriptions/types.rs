//! Subscriber shapes and the descriptors handed back to callers.

use crate::error::{BusError, Result};
use crate::types::{Message, SubscriberId, Topic};
use crossbeam_channel::Sender;
use serde::Serialize;
use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

/// A consumer that takes messages one at a time.
///
/// `receive` runs on a delivery thread, never on the publisher's thread.
/// It may block; that only holds up its own delivery.
pub trait Receiver<T>: Send + Sync {
    fn receive(&self, message: Arc<T>);
}

impl<T, F> Receiver<T> for F
where
    F: Fn(Arc<T>) + Send + Sync,
{
    fn receive(&self, message: Arc<T>) {
        self(message)
    }
}

/// The two consumer shapes the bus can deliver to.
pub enum Subscriber<T> {
    /// Delivery calls [`Receiver::receive`].
    Direct(Arc<dyn Receiver<T>>),
    /// Delivery sends into the channel. A full bounded channel blocks the
    /// delivery thread until there is room or the receiving side is dropped.
    Queue(Sender<Arc<T>>),
}

impl<T: Message> Subscriber<T> {
    /// Wrap a receiver.
    pub fn direct<R: Receiver<T> + 'static>(receiver: R) -> Self {
        Subscriber::Direct(Arc::new(receiver))
    }

    /// Wrap a receiver that is also held elsewhere.
    pub fn shared<R: Receiver<T> + 'static>(receiver: Arc<R>) -> Self {
        Subscriber::Direct(receiver)
    }

    /// Wrap the sending half of a channel.
    pub fn queue(sender: Sender<Arc<T>>) -> Self {
        Subscriber::Queue(sender)
    }

    /// Recover a subscriber from an arbitrary value.
    ///
    /// Accepts a `Subscriber<T>`, a `Sender<Arc<T>>` or an
    /// `Arc<dyn Receiver<T>>`. Anything else is
    /// [`BusError::UnsupportedSubscriberKind`].
    ///
    /// Trait impls cannot be discovered at runtime, so a concrete
    /// `Arc<R>` or a bare closure is rejected even though it implements
    /// [`Receiver<T>`]. Coerce it to `Arc<dyn Receiver<T>>` first, or use
    /// [`Subscriber::direct`].
    pub fn from_any<S: Any>(consumer: S) -> Result<Self> {
        let boxed: Box<dyn Any> = Box::new(consumer);

        let boxed = match boxed.downcast::<Subscriber<T>>() {
            Ok(subscriber) => return Ok(*subscriber),
            Err(other) => other,
        };
        let boxed = match boxed.downcast::<Sender<Arc<T>>>() {
            Ok(sender) => return Ok(Subscriber::Queue(*sender)),
            Err(other) => other,
        };
        match boxed.downcast::<Arc<dyn Receiver<T>>>() {
            Ok(receiver) => Ok(Subscriber::Direct(*receiver)),
            Err(_) => Err(BusError::UnsupportedSubscriberKind {
                topic: Topic::of::<T>().name(),
                got: type_name::<S>().to_string(),
            }),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Subscriber::Direct(_) => "direct",
            Subscriber::Queue(_) => "queue",
        }
    }
}

impl<T> From<Sender<Arc<T>>> for Subscriber<T> {
    fn from(sender: Sender<Arc<T>>) -> Self {
        Subscriber::Queue(sender)
    }
}

impl<T> From<Arc<dyn Receiver<T>>> for Subscriber<T> {
    fn from(receiver: Arc<dyn Receiver<T>>) -> Self {
        Subscriber::Direct(receiver)
    }
}

impl<T> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subscriber::Direct(_) => f.write_str("Subscriber::Direct"),
            Subscriber::Queue(tx) => f
                .debug_struct("Subscriber::Queue")
                .field("len", &tx.len())
                .field("capacity", &tx.capacity())
                .finish(),
        }
    }
}

/// Names a registered subscriber so it can be removed later.
///
/// Does not own the subscriber. A descriptor whose subscriber is already
/// gone is inert: unsubscribing it again does nothing, even if its id has
/// since been handed to someone else.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    pub(crate) id: SubscriberId,
    pub(crate) topic: Topic,
    /// Process-unique registration number, never reused.
    pub(crate) serial: u64,
}

impl Descriptor {
    /// The id assigned at subscribe time.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// The topic the subscriber listens on.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Descriptor({}#{})", self.topic, self.id)
    }
}

/// Subscriber count for one topic.
#[derive(Clone, Debug, Serialize)]
pub struct TopicStats {
    pub topic: &'static str,
    pub subscribers: usize,
}

/// Point-in-time view of a registry.
#[derive(Clone, Debug, Serialize)]
pub struct RegistryStats {
    /// Topics with at least one subscriber, sorted by name.
    pub topics: Vec<TopicStats>,
    /// Ids of all active subscribers, sorted.
    pub live_ids: Vec<SubscriberId>,
    /// Number of ids ever minted.
    pub high_water_mark: u64,
    /// Released ids waiting for reuse.
    pub free_ids: usize,
}
