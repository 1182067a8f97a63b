//! Reusable buffer pools.
//!
//! A [`BufferPool`] pre-allocates a fixed number of equally sized blocks and
//! hands them out as [`PooledBuffer`] guards. Dropping (or explicitly
//! releasing) a guard returns the block to the free list. Requests larger
//! than the block size, or arriving while every block is in use, fall back to
//! an ordinary allocation that is simply freed on drop.
//!
//! The free list sits behind a single `parking_lot::Mutex` held only for a
//! `Vec::pop`/`Vec::push`, so acquire/release never block on each other for
//! longer than that and cannot deadlock.

use parking_lot::Mutex;
use serde::Serialize;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Pool statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PoolStats {
    pub block_size: usize,
    pub total_blocks: usize,
    pub free_blocks: usize,
    pub in_use_blocks: usize,
    pub total_acquisitions: u64,
    pub total_releases: u64,
    pub fallback_allocations: u64,
}

impl PoolStats {
    /// Share of pooled blocks currently handed out.
    pub fn utilization_percent(&self) -> f64 {
        if self.total_blocks == 0 {
            return 0.0;
        }
        self.in_use_blocks as f64 / self.total_blocks as f64 * 100.0
    }
}

/// Sized free-list of reusable `Vec<T>` blocks.
pub struct BufferPool<T> {
    block_size: usize,
    total_blocks: usize,
    free: Mutex<Vec<Vec<T>>>,
    in_use: AtomicUsize,
    acquisitions: AtomicU64,
    releases: AtomicU64,
    fallbacks: AtomicU64,
}

impl<T: Clone + Default> BufferPool<T> {
    /// Pre-allocate `num_blocks` blocks of `block_size` elements each.
    pub fn new(block_size: usize, num_blocks: usize) -> Self {
        let free = (0..num_blocks)
            .map(|_| Vec::with_capacity(block_size))
            .collect();

        Self {
            block_size,
            total_blocks: num_blocks,
            free: Mutex::new(free),
            in_use: AtomicUsize::new(0),
            acquisitions: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Acquire a buffer of exactly `len` default-initialized elements.
    pub fn acquire(&self, len: usize) -> PooledBuffer<'_, T> {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);

        let block = if len <= self.block_size {
            self.free.lock().pop()
        } else {
            None
        };

        match block {
            Some(mut buf) => {
                self.in_use.fetch_add(1, Ordering::Relaxed);
                buf.resize(len, T::default());
                PooledBuffer {
                    buf,
                    pool: self,
                    pooled: true,
                }
            }
            None => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                PooledBuffer {
                    buf: vec![T::default(); len],
                    pool: self,
                    pooled: false,
                }
            }
        }
    }

    /// Return a buffer to the pool. Equivalent to dropping it.
    pub fn release(&self, buffer: PooledBuffer<'_, T>) {
        drop(buffer);
    }

    fn give_back(&self, mut buf: Vec<T>) {
        buf.clear();
        self.free.lock().push(buf);
        self.in_use.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            block_size: self.block_size,
            total_blocks: self.total_blocks,
            free_blocks: self.free.lock().len(),
            in_use_blocks: self.in_use.load(Ordering::Relaxed),
            total_acquisitions: self.acquisitions.load(Ordering::Relaxed),
            total_releases: self.releases.load(Ordering::Relaxed),
            fallback_allocations: self.fallbacks.load(Ordering::Relaxed),
        }
    }
}

/// A buffer on loan from a [`BufferPool`].
pub struct PooledBuffer<'a, T: Clone + Default> {
    buf: Vec<T>,
    pool: &'a BufferPool<T>,
    pooled: bool,
}

impl<T: Clone + Default> PooledBuffer<'_, T> {
    /// Whether this buffer came from the free list rather than a fallback
    /// allocation.
    pub fn is_pooled(&self) -> bool {
        self.pooled
    }
}

impl<T: Clone + Default> Deref for PooledBuffer<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.buf
    }
}

impl<T: Clone + Default> DerefMut for PooledBuffer<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.buf
    }
}

impl<T: Clone + Default> Drop for PooledBuffer<'_, T> {
    fn drop(&mut self) {
        self.pool.releases.fetch_add(1, Ordering::Relaxed);
        if self.pooled {
            self.pool.give_back(std::mem::take(&mut self.buf));
        }
    }
}

/// The pools shared by all workers: raw bytes for payload and hash scratch,
/// `f64` blocks for matrix backing storage.
pub struct BufferPools {
    pub bytes: BufferPool<u8>,
    pub floats: BufferPool<f64>,
}

impl BufferPools {
    pub fn new(block_size: usize, num_blocks: usize) -> Self {
        Self {
            bytes: BufferPool::new(block_size, num_blocks),
            floats: BufferPool::new(block_size, num_blocks),
        }
    }
}

impl Default for BufferPools {
    fn default() -> Self {
        Self::new(16_384, 32)
    }
}
