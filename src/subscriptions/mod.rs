//! Subscriber registry for the bus.
//!
//! This module holds everything between "a consumer wants messages of type
//! `T`" and "this message reaches that consumer":
//! - Consumer shapes: a [`Receiver`] callback or a crossbeam channel
//! - Id allocation with reuse of released ids
//! - The topic → handle registry behind one read/write lock
//!
//! # Example
//!
//! ```ignore
//! let manager = SubscriptionManager::new();
//!
//! let (tx, rx) = crossbeam_channel::unbounded::<Arc<u32>>();
//! let descriptor = manager.subscribe(Subscriber::queue(tx));
//! assert_eq!(descriptor.id(), SubscriberId(0));
//!
//! manager.unsubscribe(&descriptor);
//! ```

mod allocator;
mod handle;
mod manager;
mod types;

pub(crate) use handle::Envelope;
pub use allocator::IdAllocator;
pub use manager::SubscriptionManager;
pub use types::{Descriptor, Receiver, RegistryStats, Subscriber, TopicStats};
