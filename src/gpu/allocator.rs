//! Device buffer pool.
//!
//! Free buffers are kept in per-length free lists. `acquire` pops from the
//! list for the requested bucket when one is available and only falls back
//! to a device allocation otherwise; `release` pushes the buffer back onto
//! the list for its own byte length. Nothing is handed back to the device
//! until [`BufferPool::trim`] is called.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::BucketPolicy;
use crate::error::Result;
use crate::gpu::device::{Device, RawBuffer};

/// Pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Buffers currently handed out to value types.
    pub owned: usize,

    /// Buffers sitting in the free lists.
    pub free: usize,

    /// Most buffers the pool has had allocated at once (owned + free).
    pub high_water: usize,

    /// Acquisitions served by a device allocation.
    pub fresh: u64,

    /// Acquisitions served from a free list.
    pub reused: u64,

    /// Buffers returned to the device by `trim`.
    pub trimmed: u64,
}

impl PoolStats {
    /// Buffers the pool is responsible for, owned or free.
    pub fn allocated(&self) -> usize {
        self.owned + self.free
    }
}

/// Free-list allocator over a [`Device`].
#[derive(Debug, Default)]
pub struct BufferPool {
    /// How request sizes map to buckets.
    policy: BucketPolicy,

    /// Free buffers keyed by byte length.
    free: HashMap<usize, Vec<RawBuffer>>,

    stats: PoolStats,
}

impl BufferPool {
    pub fn new(policy: BucketPolicy) -> Self {
        Self {
            policy,
            free: HashMap::new(),
            stats: PoolStats::default(),
        }
    }

    pub fn policy(&self) -> BucketPolicy {
        self.policy
    }

    /// Take a buffer of at least `bytes` bytes, reusing a free one of the
    /// same bucket when possible.
    pub fn acquire(&mut self, bytes: usize, device: &mut dyn Device) -> Result<RawBuffer> {
        let bucket = self.policy.bucket_for(bytes);

        if let Some(buffer) = self.free.get_mut(&bucket).and_then(Vec::pop) {
            self.stats.free -= 1;
            self.stats.owned += 1;
            self.stats.reused += 1;
            debug!(bytes, bucket, buffer = %buffer.id(), "Reused pooled buffer");
            return Ok(buffer);
        }

        let buffer = device.allocate(bucket)?;
        self.stats.owned += 1;
        self.stats.fresh += 1;
        self.stats.high_water = self.stats.high_water.max(self.stats.allocated());
        debug!(bytes, bucket, buffer = %buffer.id(), "Allocated device buffer");
        Ok(buffer)
    }

    /// Put a buffer back on the free list for its byte length.
    pub fn release(&mut self, buffer: RawBuffer) {
        debug!(bytes = buffer.byte_len(), buffer = %buffer.id(), "Released buffer to pool");
        self.stats.owned = self.stats.owned.saturating_sub(1);
        self.stats.free += 1;
        self.free.entry(buffer.byte_len()).or_default().push(buffer);
    }

    /// Return every free buffer to the device. Returns how many were freed.
    ///
    /// A buffer the device refuses is dropped from the pool and the error
    /// returned; buffers not yet freed go back on their free lists.
    pub fn trim(&mut self, device: &mut dyn Device) -> Result<usize> {
        let mut pending: Vec<RawBuffer> = self.free.drain().flat_map(|(_, list)| list).collect();
        let mut freed = 0;
        while let Some(buffer) = pending.pop() {
            let id = buffer.id();
            self.stats.free -= 1;
            if let Err(err) = device.free(buffer) {
                warn!(buffer = %id, error = %err, "Device rejected pooled buffer during trim");
                for rest in pending {
                    self.free.entry(rest.byte_len()).or_default().push(rest);
                }
                return Err(err);
            }
            self.stats.trimmed += 1;
            freed += 1;
        }
        debug!(freed, "Trimmed buffer pool");
        Ok(freed)
    }

    /// Number of free buffers waiting in the bucket for `bytes`.
    pub fn free_in_bucket(&self, bytes: usize) -> usize {
        self.free
            .get(&self.policy.bucket_for(bytes))
            .map_or(0, Vec::len)
    }

    /// Number of distinct non-empty buckets.
    pub fn bucket_count(&self) -> usize {
        self.free.values().filter(|list| !list.is_empty()).count()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}
