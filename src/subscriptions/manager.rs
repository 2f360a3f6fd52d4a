//! Subscription registry: topic → active handles, plus id allocation.

use crate::error::Result;
use crate::types::{Message, SubscriberId, Topic};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::allocator::IdAllocator;
use super::handle::{next_serial, Deliver, Handle};
use super::types::{Descriptor, RegistryStats, Subscriber, TopicStats};

/// State guarded by the registry lock.
#[derive(Default)]
struct Registry {
    /// Active handles, grouped by topic and keyed by id.
    topics: HashMap<Topic, HashMap<SubscriberId, Arc<dyn Deliver>>>,
    /// Id allocator shared by every topic.
    ids: IdAllocator,
}

impl Registry {
    fn live_ids(&self) -> Vec<SubscriberId> {
        let mut ids: Vec<SubscriberId> = self
            .topics
            .values()
            .flat_map(|handles| handles.keys().copied())
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// Manages subscriptions for one bus.
///
/// Subscribe and unsubscribe take the write lock. Publishing only takes
/// the read lock long enough to copy out the handles of one topic, so
/// concurrent publishes never wait on each other.
pub struct SubscriptionManager {
    registry: RwLock<Registry>,
}

impl SubscriptionManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
        }
    }

    /// Register a subscriber for messages of type `T`.
    pub fn subscribe<T: Message>(&self, subscriber: Subscriber<T>) -> Descriptor {
        let topic = Topic::of::<T>();
        let serial = next_serial();
        let kind = subscriber.kind();

        let id = {
            let mut registry = self.registry.write();
            let id = registry.ids.allocate();
            let handle: Arc<dyn Deliver> = Arc::new(Handle::new(id, serial, subscriber));
            registry.topics.entry(topic).or_default().insert(id, handle);
            id
        };

        debug!(topic = %topic, id = %id, kind, "subscribed");
        Descriptor { id, topic, serial }
    }

    /// Register a consumer whose shape is only known at runtime.
    ///
    /// See [`Subscriber::from_any`] for the accepted shapes.
    pub fn subscribe_any<T: Message, S: Any>(&self, consumer: S) -> Result<Descriptor> {
        let subscriber = Subscriber::<T>::from_any(consumer)?;
        Ok(self.subscribe(subscriber))
    }

    /// Remove a subscriber and recycle its id.
    ///
    /// Unknown or already removed descriptors are ignored. The handle is
    /// dropped, so a queue whose only sender was given to the manager
    /// disconnects after any in-flight delivery.
    pub fn unsubscribe(&self, descriptor: &Descriptor) {
        let mut registry = self.registry.write();

        let Some(handles) = registry.topics.get_mut(&descriptor.topic) else {
            return;
        };
        match handles.get(&descriptor.id) {
            Some(handle) if handle.serial() == descriptor.serial => {}
            _ => return,
        }
        handles.remove(&descriptor.id);
        if handles.is_empty() {
            registry.topics.remove(&descriptor.topic);
        }
        registry.ids.release(descriptor.id);
        drop(registry);

        debug!(topic = %descriptor.topic, id = %descriptor.id, "unsubscribed");
    }

    /// Copy out the current handles for a topic.
    pub(crate) fn snapshot(&self, topic: Topic) -> Vec<Arc<dyn Deliver>> {
        let registry = self.registry.read();
        registry
            .topics
            .get(&topic)
            .map(|handles| handles.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of subscribers on a topic.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.registry
            .read()
            .topics
            .get(&topic)
            .map_or(0, HashMap::len)
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.registry.read().topics.len()
    }

    /// Ids of all active subscribers, sorted.
    pub fn active_ids(&self) -> Vec<SubscriberId> {
        self.registry.read().live_ids()
    }

    /// Snapshot of registry state.
    pub fn stats(&self) -> RegistryStats {
        let registry = self.registry.read();

        let mut topics: Vec<TopicStats> = registry
            .topics
            .iter()
            .map(|(topic, handles)| TopicStats {
                topic: topic.name(),
                subscribers: handles.len(),
            })
            .collect();
        topics.sort_by(|a, b| a.topic.cmp(b.topic));

        RegistryStats {
            topics,
            live_ids: registry.live_ids(),
            high_water_mark: registry.ids.high_water_mark(),
            free_ids: registry.ids.free_count(),
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
