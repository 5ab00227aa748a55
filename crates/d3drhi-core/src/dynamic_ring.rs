//! Dynamic vertex/index buffer ring used by user-pointer draws.
//!
//! Each binding kind owns a small pool of driver buffers picked round-robin
//! and a running append offset. Appends map with no-overwrite until the
//! offset would run past the configured capacity; then the offset restarts at
//! zero and the map discards, so regions still read by in-flight draws are
//! never overwritten in place.

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, RhiError};
use crate::stats::RhiStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferBinding {
    Vertex,
    Index,
}

impl BufferBinding {
    fn index(self) -> usize {
        match self {
            BufferBinding::Vertex => 0,
            BufferBinding::Index => 1,
        }
    }
}

impl fmt::Display for BufferBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BufferBinding::Vertex => "vertex",
            BufferBinding::Index => "index",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapMode {
    NoOverwrite,
    Discard,
}

/// Driver operations backing the ring.
pub trait DynamicBufferDevice {
    type Buffer: Clone + fmt::Debug;

    fn create_dynamic_buffer(
        &mut self,
        binding: BufferBinding,
        byte_width: u32,
    ) -> Result<Self::Buffer>;

    /// Map `buffer` with `mode`, copy `data` to byte `offset`, unmap.
    fn write_dynamic_buffer(
        &mut self,
        buffer: &Self::Buffer,
        mode: MapMode,
        offset: u32,
        data: &[u8],
    ) -> Result<()>;
}

/// Placement of one append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingAllocation<B> {
    pub buffer: B,
    pub offset: u32,
    pub map_mode: MapMode,
}

struct Pool<B> {
    buffers: Vec<Option<(B, u32)>>,
    cursor: usize,
    offset: u32,
}

impl<B> Pool<B> {
    fn new(len: usize) -> Self {
        Self {
            buffers: (0..len.max(1)).map(|_| None).collect(),
            cursor: 0,
            offset: 0,
        }
    }
}

pub struct DynamicBufferRing<B> {
    capacity: u32,
    pools: [Pool<B>; 2],
    stats: Option<Arc<RhiStats>>,
}

impl<B: Clone + fmt::Debug> DynamicBufferRing<B> {
    /// `capacity` is the per-buffer size in bytes; `num_buffers` the pool
    /// length per binding kind (at least one).
    pub fn new(capacity: u32, num_buffers: usize) -> Self {
        Self {
            capacity,
            pools: [Pool::new(num_buffers), Pool::new(num_buffers)],
            stats: None,
        }
    }

    pub fn with_stats(mut self, stats: Arc<RhiStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Current append offset for `binding`.
    pub fn offset(&self, binding: BufferBinding) -> u32 {
        self.pools[binding.index()].offset
    }

    /// Returns the pool buffer at the cursor, recreating it when missing or
    /// smaller than `count * stride`, then advances the cursor.
    pub fn ensure_buffer_size<D>(
        &mut self,
        device: &mut D,
        count: u32,
        stride: u32,
        binding: BufferBinding,
    ) -> Result<B>
    where
        D: DynamicBufferDevice<Buffer = B>,
    {
        let size_needed = count.saturating_mul(stride);
        let capacity = self.capacity;
        let pool = &mut self.pools[binding.index()];
        let slot = &mut pool.buffers[pool.cursor];

        let reusable = match slot {
            Some((buffer, width)) if *width >= size_needed => Some(buffer.clone()),
            _ => None,
        };
        let buffer = match reusable {
            Some(buffer) => buffer,
            None => {
                let width = size_needed.max(capacity);
                let buffer = device.create_dynamic_buffer(binding, width)?;
                tracing::debug!(
                    %binding,
                    index = pool.cursor,
                    byte_width = width,
                    "created dynamic buffer"
                );
                *slot = Some((buffer.clone(), width));
                buffer
            }
        };

        pool.cursor = (pool.cursor + 1) % pool.buffers.len();
        Ok(buffer)
    }

    /// Appends `data` (exactly `count * stride` bytes) and returns where it
    /// landed.
    pub fn fill_buffer<D>(
        &mut self,
        device: &mut D,
        count: u32,
        stride: u32,
        data: &[u8],
        binding: BufferBinding,
    ) -> Result<RingAllocation<B>>
    where
        D: DynamicBufferDevice<Buffer = B>,
    {
        let size = count as usize * stride as usize;
        if data.len() != size {
            return Err(RhiError::DataSizeMismatch {
                what: "dynamic buffer",
                expected: size,
                actual: data.len(),
            });
        }
        let size = size as u32;

        let current = self.pools[binding.index()].offset;
        let wraps = u64::from(current) + u64::from(size) > u64::from(self.capacity);
        let (offset, map_mode) = if wraps {
            (0, MapMode::Discard)
        } else {
            (current, MapMode::NoOverwrite)
        };

        let buffer = self.ensure_buffer_size(device, count, stride, binding)?;
        device.write_dynamic_buffer(&buffer, map_mode, offset, data)?;

        // Ring state only moves once the write has landed.
        if wraps {
            tracing::debug!(%binding, offset = current, size, "dynamic ring wrapped");
            if let Some(stats) = &self.stats {
                stats.inc_ring_discards();
            }
        }
        self.pools[binding.index()].offset = offset + size;
        Ok(RingAllocation {
            buffer,
            offset,
            map_mode,
        })
    }
}

impl<B> fmt::Debug for DynamicBufferRing<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicBufferRing")
            .field("capacity", &self.capacity)
            .field("vertex_offset", &self.pools[0].offset)
            .field("index_offset", &self.pools[1].offset)
            .finish()
    }
}
