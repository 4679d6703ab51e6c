//! Pending bus actions
//!
//! A fixed-capacity FIFO. Appending to a full queue evicts the oldest entry,
//! so the newest requests always survive. Evictions are counted.

use std::collections::VecDeque;

use tracing::{trace, warn};

use crate::telegram::LONG_PAYLOAD_MAX_SIZE;

/// Default number of queued actions
pub const DEFAULT_ACTION_QUEUE_CAPACITY: usize = 16;

/// What the scheduler should do with the target object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Send a read request for the object's address
    ReadRequest,
    /// Store the value locally, then send it if the object transmits
    WriteRequest,
    /// Answer a read request with the object's value
    ResponseRequest,
}

/// Value carried by a write action
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ActionValue {
    None,
    Short(u8),
    Long {
        data: [u8; LONG_PAYLOAD_MAX_SIZE],
        len: usize,
    },
}

impl ActionValue {
    /// Long value from a slice, clamped to the long payload capacity
    pub fn long(src: &[u8]) -> Self {
        let len = src.len().min(LONG_PAYLOAD_MAX_SIZE);
        let mut data = [0u8; LONG_PAYLOAD_MAX_SIZE];
        data[..len].copy_from_slice(&src[..len]);
        ActionValue::Long { data, len }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ActionValue::None => &[],
            ActionValue::Short(v) => std::slice::from_ref(v),
            ActionValue::Long { data, len } => &data[..*len],
        }
    }
}

impl std::fmt::Debug for ActionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionValue::None => f.write_str("None"),
            ActionValue::Short(v) => write!(f, "Short({v:#04X})"),
            ActionValue::Long { .. } => write!(f, "Long({:02X?})", self.as_bytes()),
        }
    }
}

/// One queued action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub index: usize,
    pub value: ActionValue,
}

impl PendingAction {
    pub fn read(index: usize) -> Self {
        Self {
            kind: ActionKind::ReadRequest,
            index,
            value: ActionValue::None,
        }
    }

    pub fn response(index: usize) -> Self {
        Self {
            kind: ActionKind::ResponseRequest,
            index,
            value: ActionValue::None,
        }
    }

    pub fn write(index: usize, value: u8) -> Self {
        Self {
            kind: ActionKind::WriteRequest,
            index,
            value: ActionValue::Short(value),
        }
    }

    pub fn write_long(index: usize, value: &[u8]) -> Self {
        Self {
            kind: ActionKind::WriteRequest,
            index,
            value: ActionValue::long(value),
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Entries currently queued
    pub len: usize,
    /// Highest number of entries seen at once
    pub high_water: usize,
    /// Entries evicted by an append on a full queue
    pub lost: u64,
}

/// Bounded overwrite-oldest FIFO
#[derive(Debug, Clone)]
pub struct ActionQueue<T = PendingAction> {
    buffer: VecDeque<T>,
    capacity: usize,
    high_water: usize,
    lost: u64,
}

impl<T> ActionQueue<T> {
    /// Queue holding at most `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            high_water: 0,
            lost: 0,
        }
    }

    /// Always succeeds; evicts the oldest entry when full
    pub fn append(&mut self, item: T) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
            self.lost += 1;
            warn!(
                "Action queue full ({}), oldest entry dropped, {} lost so far",
                self.capacity, self.lost
            );
        }
        self.buffer.push_back(item);
        self.high_water = self.high_water.max(self.buffer.len());
        trace!("Action queued, {} pending", self.buffer.len());
    }

    /// Oldest surviving entry
    pub fn pop(&mut self) -> Option<T> {
        self.buffer.pop_front()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            len: self.buffer.len(),
            high_water: self.high_water,
            lost: self.lost,
        }
    }
}

impl<T> Default for ActionQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_ACTION_QUEUE_CAPACITY)
    }
}
