//! Subscriber id allocation with reuse.

use crate::types::SubscriberId;
use std::collections::VecDeque;

/// Hands out small subscriber ids and recycles released ones.
///
/// Freed ids are reused oldest-first before a fresh id is minted, so the
/// high-water mark tracks peak concurrency rather than total churn.
/// Not synchronized; the manager keeps it under its write lock.
#[derive(Debug, Default)]
pub struct IdAllocator {
    /// Next never-used id.
    next: u64,
    /// Released ids, in release order.
    freed: VecDeque<u64>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id.
    pub fn allocate(&mut self) -> SubscriberId {
        if let Some(id) = self.freed.pop_front() {
            return SubscriberId(id);
        }
        let id = self.next;
        self.next += 1;
        SubscriberId(id)
    }

    /// Return an id for reuse.
    ///
    /// The caller guarantees `id` is currently allocated.
    pub fn release(&mut self, id: SubscriberId) {
        debug_assert!(id.0 < self.next, "released id {} was never allocated", id);
        self.freed.push_back(id.0);
    }

    /// Number of ids ever minted.
    pub fn high_water_mark(&self) -> u64 {
        self.next
    }

    /// Number of released ids waiting for reuse.
    pub fn free_count(&self) -> usize {
        self.freed.len()
    }

    /// Number of ids currently handed out.
    pub fn live_count(&self) -> u64 {
        self.next - self.freed.len() as u64
    }
}
