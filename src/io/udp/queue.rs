// src/io/udp/queue.rs
//
// FIFO between the receive thread (producer) and the host's poll loop (consumer).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::io::CanFrame;

/// Thread-safe frame queue. Cloning shares the same underlying queue.
///
/// The lock is held only for a single push, pop or clear.
#[derive(Clone, Default)]
pub struct ReceiveQueue {
    inner: Arc<Mutex<VecDeque<CanFrame>>>,
}

impl ReceiveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<CanFrame>> {
        // A panic while holding the lock cannot leave a VecDeque half-updated
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, frame: CanFrame) {
        self.lock().push_back(frame);
    }

    /// Pop the oldest frame, or `None` when empty. Never blocks on I/O.
    pub fn pop(&self) -> Option<CanFrame> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every queued frame, returning how many were discarded.
    pub fn clear(&self) -> usize {
        let mut queue = self.lock();
        let dropped = queue.len();
        queue.clear();
        dropped
    }
}

// ============================================================================
// Tests
// ============================================================================
