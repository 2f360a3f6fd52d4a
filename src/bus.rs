//! The bus handle: publish, subscribe, unsubscribe.

use crate::error::Result;
use crate::subscriptions::{Descriptor, Envelope, RegistryStats, Subscriber, SubscriptionManager};
use crate::types::{Message, SubscriberId, Topic};
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{trace, warn};

/// Bus configuration.
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Name given to delivery threads.
    /// Default: "pubsub-deliver"
    pub thread_name: String,

    /// Stack size for delivery threads (None = platform default).
    pub stack_size: Option<usize>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            thread_name: "pubsub-deliver".to_string(),
            stack_size: None,
        }
    }
}

/// Registry state plus publish counters.
#[derive(Clone, Debug, Serialize)]
pub struct BusStats {
    #[serde(flatten)]
    pub registry: RegistryStats,
    /// Publish calls, including those nobody listened to.
    pub messages_published: u64,
    /// Delivery threads started.
    pub deliveries_dispatched: u64,
}

struct BusInner {
    config: BusConfig,
    subscriptions: SubscriptionManager,
    messages_published: AtomicU64,
    deliveries_dispatched: AtomicU64,
}

/// An in-process publish/subscribe bus.
///
/// Messages are routed by their Rust type. Each publish starts one
/// detached delivery thread per current subscriber of that type and
/// returns without waiting for any of them:
/// - A slow or blocked subscriber only stalls its own delivery
/// - Delivery failures are never reported to the publisher
/// - Nothing is retained for subscribers that register later
///
/// Cloning is cheap and every clone refers to the same registry.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

impl Bus {
    /// Create a bus with default configuration.
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Create a bus with custom configuration.
    pub fn with_config(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                config,
                subscriptions: SubscriptionManager::new(),
                messages_published: AtomicU64::new(0),
                deliveries_dispatched: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    // --- Publishing ---

    /// Publish a message to every current subscriber of its type.
    ///
    /// Returns the number of deliveries started. That is not an
    /// acknowledgment: a started delivery may still block or be discarded.
    pub fn publish<T: Message>(&self, message: T) -> usize {
        self.publish_arc(Arc::new(message))
    }

    /// Publish a message that is already behind an `Arc`.
    pub fn publish_arc<T: Message>(&self, message: Arc<T>) -> usize {
        let envelope = Envelope::new(message);
        let topic = envelope.topic();

        // Handles are copied out so delivery never runs under the lock
        let handles = self.inner.subscriptions.snapshot(topic);
        self.inner.messages_published.fetch_add(1, Ordering::Relaxed);

        let mut dispatched = 0;
        for handle in handles {
            let id = handle.id();
            let envelope = envelope.clone();
            match self.spawn_delivery(move || handle.deliver(envelope)) {
                Ok(()) => dispatched += 1,
                Err(e) => {
                    warn!(topic = %topic, id = %id, error = %e, "failed to spawn delivery thread, message dropped");
                }
            }
        }

        self.inner
            .deliveries_dispatched
            .fetch_add(dispatched as u64, Ordering::Relaxed);
        trace!(topic = %topic, dispatched, "published");
        dispatched
    }

    /// Start a detached delivery thread.
    fn spawn_delivery<F>(&self, f: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut builder = thread::Builder::new().name(self.inner.config.thread_name.clone());
        if let Some(size) = self.inner.config.stack_size {
            builder = builder.stack_size(size);
        }
        builder.spawn(f).map(|_| ())
    }

    // --- Subscriptions ---

    /// Subscribe a consumer to messages of type `T`.
    ///
    /// Accepts a [`Subscriber`] or anything that converts into one, such
    /// as a `crossbeam_channel::Sender<Arc<T>>`.
    pub fn subscribe<T: Message>(&self, subscriber: impl Into<Subscriber<T>>) -> Descriptor {
        self.inner.subscriptions.subscribe(subscriber.into())
    }

    /// Subscribe a consumer whose shape is checked at runtime.
    ///
    /// Fails with [`BusError::UnsupportedSubscriberKind`] if `consumer` is
    /// neither a receiver nor a channel for `T`.
    ///
    /// [`BusError::UnsupportedSubscriberKind`]: crate::BusError::UnsupportedSubscriberKind
    pub fn subscribe_any<T: Message, S: Any>(&self, consumer: S) -> Result<Descriptor> {
        self.inner.subscriptions.subscribe_any::<T, S>(consumer)
    }

    /// Remove a subscriber. No-op if it is already gone.
    ///
    /// The bus drops its handle, including the `Sender` of a queue
    /// subscriber. If that was the last sender, the channel disconnects
    /// once in-flight deliveries finish.
    pub fn unsubscribe(&self, descriptor: &Descriptor) {
        self.inner.subscriptions.unsubscribe(descriptor)
    }

    // --- Introspection ---

    /// Number of subscribers for messages of type `T`.
    pub fn subscriber_count<T: Message>(&self) -> usize {
        self.inner.subscriptions.subscriber_count(Topic::of::<T>())
    }

    /// Ids of all active subscribers, sorted.
    pub fn active_ids(&self) -> Vec<SubscriberId> {
        self.inner.subscriptions.active_ids()
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            registry: self.inner.subscriptions.stats(),
            messages_published: self.inner.messages_published.load(Ordering::Relaxed),
            deliveries_dispatched: self.inner.deliveries_dispatched.load(Ordering::Relaxed),
        }
    }

    /// True if both handles refer to the same bus.
    pub fn same_bus(&self, other: &Bus) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("topics", &self.inner.subscriptions.topic_count())
            .field("config", &self.inner.config)
            .finish()
    }
}
