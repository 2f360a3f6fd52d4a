//! # Typed Pub/Sub
//!
//! An in-process publish/subscribe bus where the message type is the topic.
//!
//! ## Core Concepts
//!
//! - **Topics**: Derived from the Rust type of a message; every `T` has one
//! - **Subscribers**: A [`Receiver`] callback or a crossbeam channel
//! - **Descriptors**: Returned by `subscribe`, used to unsubscribe
//! - **Fan-out**: Each publish starts one detached delivery thread per
//!   subscriber and returns immediately
//!
//! Delivery is fire-and-forget. There is no acknowledgment, no replay for
//! late subscribers and no back-pressure: a subscriber with a full bounded
//! channel holds on to its delivery thread until it drains, without
//! slowing down the publisher or other subscribers.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use typed_pubsub::Bus;
//!
//! let bus = Bus::new();
//!
//! let (tx, rx) = crossbeam_channel::bounded::<Arc<u32>>(16);
//! let descriptor = bus.subscribe(tx);
//!
//! bus.publish(7u32);
//! assert_eq!(*rx.recv()?, 7);
//!
//! bus.unsubscribe(&descriptor);
//! ```

pub mod bus;
pub mod error;
pub mod isolation;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use bus::{Bus, BusConfig, BusStats};
pub use error::{BusError, Result};
pub use isolation::{isolate, IsolationGuard, ISOLATE_ENV};
pub use subscriptions::{
    Descriptor, IdAllocator, Receiver, RegistryStats, Subscriber, SubscriptionManager, TopicStats,
};
pub use types::{Message, SubscriberId, Topic};
