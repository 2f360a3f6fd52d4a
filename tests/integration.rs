//! Integration tests for publish/subscribe behavior.

use crossbeam_channel::{bounded, unbounded, RecvTimeoutError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use typed_pubsub::{Bus, Receiver, Subscriber, SubscriberId};

const WAIT: Duration = Duration::from_secs(10);

/// Poll `f` until it returns true or the timeout expires.
fn eventually(timeout: Duration, mut f: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if f() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    f()
}

/// Receiver that remembers the last message.
#[derive(Default)]
struct LastValue<T> {
    value: Mutex<Option<T>>,
}

impl<T: Clone> LastValue<T> {
    fn read(&self) -> Option<T> {
        self.value.lock().clone()
    }
}

impl<T: Clone + Send + Sync> Receiver<T> for LastValue<T> {
    fn receive(&self, message: Arc<T>) {
        *self.value.lock() = Some((*message).clone());
    }
}

#[derive(Debug, Clone, PartialEq)]
struct OrderPlaced {
    order_id: u64,
    amount: u64,
}

#[derive(Debug, Clone, PartialEq)]
struct OrderCancelled {
    order_id: u64,
}

// --- Realistic Workflow Tests ---

#[test]
fn test_queue_and_direct_subscribers_with_unsubscribe() {
    let bus = Bus::new();

    let (tx, rx) = bounded::<Arc<i32>>(1);
    let recv = Arc::new(LastValue::<i32>::default());

    // The test keeps its own sender so the channel stays open after unsubscribe
    let queue_descriptor = bus.subscribe(tx.clone());
    let direct_descriptor = bus.subscribe(Subscriber::<i32>::shared(Arc::clone(&recv)));
    assert_ne!(queue_descriptor.id(), direct_descriptor.id());

    bus.publish(1i32);

    assert_eq!(*rx.recv_timeout(WAIT).unwrap(), 1);
    assert!(eventually(WAIT, || recv.read() == Some(1)));

    bus.unsubscribe(&queue_descriptor);
    assert_eq!(bus.publish(2i32), 1);

    assert!(eventually(WAIT, || recv.read() == Some(2)));
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(1)),
        Err(RecvTimeoutError::Timeout)
    );
    drop(tx);
}

#[test]
fn test_unsubscribe_closes_channel_when_bus_held_last_sender() {
    let bus = Bus::new();
    let (tx, rx) = bounded::<Arc<i32>>(1);
    let descriptor = bus.subscribe(tx);

    bus.publish(1i32);
    assert_eq!(*rx.recv_timeout(WAIT).unwrap(), 1);

    bus.unsubscribe(&descriptor);
    assert_eq!(rx.recv_timeout(WAIT), Err(RecvTimeoutError::Disconnected));
}

#[test]
fn test_messages_only_reach_their_topic() {
    let bus = Bus::new();

    let (placed_tx, placed_rx) = unbounded::<Arc<OrderPlaced>>();
    let (cancelled_tx, cancelled_rx) = unbounded::<Arc<OrderCancelled>>();
    bus.subscribe(placed_tx);
    bus.subscribe(cancelled_tx);

    bus.publish(OrderPlaced {
        order_id: 1,
        amount: 250,
    });

    let placed = placed_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(placed.order_id, 1);
    assert_eq!(placed.amount, 250);
    assert!(cancelled_rx
        .recv_timeout(Duration::from_millis(500))
        .is_err());

    bus.publish(OrderCancelled { order_id: 1 });
    assert_eq!(cancelled_rx.recv_timeout(WAIT).unwrap().order_id, 1);
    assert!(placed_rx.recv_timeout(Duration::from_millis(500)).is_err());
}

#[test]
fn test_every_subscriber_gets_every_message() {
    let bus = Bus::new();

    let receivers: Vec<_> = (0..8)
        .map(|_| {
            let (tx, rx) = unbounded::<Arc<u64>>();
            bus.subscribe(tx);
            rx
        })
        .collect();

    for i in 0..10u64 {
        assert_eq!(bus.publish(i), 8);
    }

    for rx in &receivers {
        let mut seen: Vec<u64> = (0..10).map(|_| *rx.recv_timeout(WAIT).unwrap()).collect();
        // No ordering across deliveries, only completeness
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }
}

#[test]
fn test_closure_subscriber() {
    let bus = Bus::new();
    let total = Arc::new(Mutex::new(0u64));

    let sink = Arc::clone(&total);
    bus.subscribe(Subscriber::<OrderPlaced>::direct(move |m: Arc<OrderPlaced>| {
        *sink.lock() += m.amount;
    }));

    bus.publish(OrderPlaced {
        order_id: 1,
        amount: 10,
    });
    bus.publish(OrderPlaced {
        order_id: 2,
        amount: 32,
    });

    assert!(eventually(WAIT, || *total.lock() == 42));
}

#[test]
fn test_blocked_subscriber_does_not_stall_others() {
    let bus = Bus::new();

    // Never drained, capacity one: later deliveries block on their threads
    let (stuck_tx, _stuck_rx) = bounded::<Arc<u32>>(1);
    bus.subscribe(stuck_tx);

    let (tx, rx) = unbounded::<Arc<u32>>();
    bus.subscribe(tx);

    let start = Instant::now();
    for i in 0..20u32 {
        bus.publish(i);
    }
    assert!(start.elapsed() < WAIT);

    let mut seen: Vec<u32> = (0..20).map(|_| *rx.recv_timeout(WAIT).unwrap()).collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..20).collect::<Vec<_>>());
}

#[test]
fn test_blocking_receiver_does_not_block_publisher() {
    let bus = Bus::new();
    let (release_tx, release_rx) = bounded::<()>(0);
    let (done_tx, done_rx) = unbounded::<u32>();

    bus.subscribe(Subscriber::<u32>::direct(move |m: Arc<u32>| {
        let _ = release_rx.recv();
        let _ = done_tx.send(*m);
    }));

    let start = Instant::now();
    assert_eq!(bus.publish(5u32), 1);
    assert!(start.elapsed() < Duration::from_secs(5));

    release_tx.send(()).unwrap();
    assert_eq!(done_rx.recv_timeout(WAIT).unwrap(), 5);
}

#[test]
fn test_late_subscriber_misses_earlier_messages() {
    let bus = Bus::new();
    bus.publish(1u16);

    let (tx, rx) = unbounded::<Arc<u16>>();
    bus.subscribe(tx);
    assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());

    bus.publish(2u16);
    assert_eq!(*rx.recv_timeout(WAIT).unwrap(), 2);
}

#[test]
fn test_descriptor_id_reuse() {
    let bus = Bus::new();
    let (tx, _rx) = bounded::<Arc<i32>>(0);

    for _ in 0..1000 {
        let descriptor = bus.subscribe(tx.clone());
        assert_eq!(descriptor.id(), SubscriberId(0));
        bus.unsubscribe(&descriptor);
    }
    assert_eq!(bus.stats().registry.high_water_mark, 1);
}

#[test]
fn test_ids_reused_in_release_order() {
    let bus = Bus::new();
    let (tx, _rx) = unbounded::<Arc<i32>>();

    let a = bus.subscribe(tx.clone());
    let b = bus.subscribe(tx.clone());
    let c = bus.subscribe(tx.clone());
    assert_eq!(
        [a.id(), b.id(), c.id()],
        [SubscriberId(0), SubscriberId(1), SubscriberId(2)]
    );

    bus.unsubscribe(&b);
    bus.unsubscribe(&a);

    assert_eq!(bus.subscribe(tx.clone()).id(), SubscriberId(1));
    assert_eq!(bus.subscribe(tx.clone()).id(), SubscriberId(0));
    assert_eq!(bus.subscribe(tx).id(), SubscriberId(3));
}

#[test]
fn test_stats_json() {
    let bus = Bus::new();
    let (tx, _rx) = unbounded::<Arc<OrderPlaced>>();
    bus.subscribe(tx);
    bus.publish(OrderPlaced {
        order_id: 1,
        amount: 1,
    });

    let json = serde_json::to_value(bus.stats()).unwrap();
    assert_eq!(json["messages_published"], 1);
    assert_eq!(json["deliveries_dispatched"], 1);
    assert_eq!(json["live_ids"], serde_json::json!([0]));
    assert_eq!(json["high_water_mark"], 1);
    assert_eq!(json["topics"][0]["subscribers"], 1);
    assert!(json["topics"][0]["topic"]
        .as_str()
        .unwrap()
        .ends_with("OrderPlaced"));
}
