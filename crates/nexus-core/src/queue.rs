//! Bounded FIFO task queue.
//!
//! Producers never block: a push into a full queue fails immediately with
//! [`QueueError::Full`]. Consumers block on a condition variable until an
//! item arrives, the queue is resumed, or the queue is closed.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use thiserror::Error;

/// Push rejection. The rejected item(s) are handed back.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError<T> {
    #[error("queue full at {capacity} items")]
    Full { capacity: usize, rejected: T },

    #[error("queue closed")]
    Closed { rejected: T },
}

impl<T> QueueError<T> {
    pub fn into_rejected(self) -> T {
        match self {
            QueueError::Full { rejected, .. } | QueueError::Closed { rejected } => rejected,
        }
    }
}

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
    paused: bool,
}

/// Multi-producer, multi-consumer bounded FIFO.
pub struct BoundedQueue<T> {
    capacity: usize,
    inner: Mutex<Inner<T>>,
    available: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
                paused: false,
            }),
            available: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Enqueue without blocking.
    pub fn try_push(&self, item: T) -> Result<usize, QueueError<T>> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(QueueError::Closed { rejected: item });
        }
        if inner.items.len() >= self.capacity {
            return Err(QueueError::Full {
                capacity: self.capacity,
                rejected: item,
            });
        }
        inner.items.push_back(item);
        let depth = inner.items.len();
        drop(inner);

        self.available.notify_one();
        Ok(depth)
    }

    /// Enqueue every item or none of them.
    pub fn try_push_batch(&self, items: Vec<T>) -> Result<usize, QueueError<Vec<T>>> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(QueueError::Closed { rejected: items });
        }
        if inner.items.len() + items.len() > self.capacity {
            return Err(QueueError::Full {
                capacity: self.capacity,
                rejected: items,
            });
        }
        let count = items.len();
        inner.items.extend(items);
        let depth = inner.items.len();
        drop(inner);

        match count {
            0 => {}
            1 => {
                self.available.notify_one();
            }
            _ => {
                self.available.notify_all();
            }
        }
        Ok(depth)
    }

    /// Block until an item is available. `None` once the queue is closed.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return None;
            }
            if !inner.paused {
                if let Some(item) = inner.items.pop_front() {
                    return Some(item);
                }
            }
            self.available.wait(&mut inner);
        }
    }

    /// Stop consumers from taking items. Producers are unaffected.
    pub fn pause(&self) {
        self.inner.lock().paused = true;
    }

    pub fn resume(&self) {
        self.inner.lock().paused = false;
        self.available.notify_all();
    }

    /// Close the queue, wake every consumer, and return the items that were
    /// never dequeued, in FIFO order.
    pub fn close(&self) -> Vec<T> {
        let mut inner = self.inner.lock();
        inner.closed = true;
        let drained = inner.items.drain(..).collect();
        drop(inner);

        self.available.notify_all();
        drained
    }
}
