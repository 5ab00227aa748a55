//! Shadowed constant buffers.
//!
//! Shader parameter writes land in a CPU copy and widen a dirty range; the
//! dispatcher commits dirty buffers right before each draw and rebinds only
//! the slots that were actually uploaded.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::device::ShaderStage;
use crate::error::{Result, RhiError};
use crate::stats::RhiStats;

/// Constant buffer slots per shader stage.
pub const MAX_CONSTANT_BUFFER_SLOTS: u32 = 14;

/// Driver side of a constant buffer.
pub trait ConstantBufferDevice {
    type Buffer: Clone + fmt::Debug;

    fn create_constant_buffer(&mut self, size: u32) -> Result<Self::Buffer>;

    /// Writes `data` at byte `offset` of `buffer`.
    fn update_constant_buffer(
        &mut self,
        buffer: &Self::Buffer,
        offset: u32,
        data: &[u8],
    ) -> Result<()>;
}

#[derive(Debug)]
pub struct ConstantBuffer<B> {
    buffer: B,
    shadow: Vec<u8>,
    dirty: Option<Range<u32>>,
}

impl<B: Clone + fmt::Debug> ConstantBuffer<B> {
    pub fn new(buffer: B, size: u32) -> Self {
        Self {
            buffer,
            shadow: vec![0; size as usize],
            dirty: None,
        }
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn size(&self) -> u32 {
        self.shadow.len() as u32
    }

    pub fn shadow(&self) -> &[u8] {
        &self.shadow
    }

    pub fn dirty_range(&self) -> Option<Range<u32>> {
        self.dirty.clone()
    }

    /// Copies `data` into the shadow at `offset` and widens the dirty range.
    pub fn update_constant(&mut self, data: &[u8], offset: u32) -> Result<()> {
        let end = u64::from(offset) + data.len() as u64;
        if end > self.shadow.len() as u64 {
            return Err(RhiError::ConstantBufferOverflow {
                buffer_size: self.size(),
                write_end: end,
            });
        }
        if data.is_empty() {
            return Ok(());
        }
        let end = end as u32;
        self.shadow[offset as usize..end as usize].copy_from_slice(data);
        self.dirty = Some(match self.dirty.take() {
            Some(r) => r.start.min(offset)..r.end.max(end),
            None => offset..end,
        });
        Ok(())
    }

    /// Uploads the dirty range, or the whole shadow when `discard_all`.
    /// Returns whether anything was uploaded; clean buffers never upload.
    pub fn commit_constants_to_device<D>(
        &mut self,
        device: &mut D,
        discard_all: bool,
    ) -> Result<bool>
    where
        D: ConstantBufferDevice<Buffer = B>,
    {
        let Some(dirty) = self.dirty.clone() else {
            return Ok(false);
        };
        let range = if discard_all { 0..self.size() } else { dirty };
        device.update_constant_buffer(
            &self.buffer,
            range.start,
            &self.shadow[range.start as usize..range.end as usize],
        )?;
        self.dirty = None;
        Ok(true)
    }
}

/// Per-stage constant buffer slots, created on first write.
pub struct ConstantBufferSet<B> {
    buffer_size: u32,
    stages: [Vec<Option<ConstantBuffer<B>>>; 6],
    discard_shared_constants: bool,
    stats: Option<Arc<RhiStats>>,
}

impl<B: Clone + fmt::Debug> ConstantBufferSet<B> {
    pub fn new(buffer_size: u32) -> Self {
        Self {
            buffer_size,
            stages: std::array::from_fn(|_| {
                (0..MAX_CONSTANT_BUFFER_SLOTS).map(|_| None).collect()
            }),
            discard_shared_constants: false,
            stats: None,
        }
    }

    pub fn with_stats(mut self, stats: Arc<RhiStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// The next non-compute commit rewrites whole buffers. Set whenever the
    /// bound shader state changes.
    pub fn mark_discard_shared_constants(&mut self) {
        self.discard_shared_constants = true;
    }

    pub fn discard_shared_constants(&self) -> bool {
        self.discard_shared_constants
    }

    pub fn get(&self, stage: ShaderStage, slot: u32) -> Option<&ConstantBuffer<B>> {
        self.stages[stage.index()].get(slot as usize)?.as_ref()
    }

    pub fn update_constant<D>(
        &mut self,
        device: &mut D,
        stage: ShaderStage,
        slot: u32,
        offset: u32,
        data: &[u8],
    ) -> Result<()>
    where
        D: ConstantBufferDevice<Buffer = B>,
    {
        if slot >= MAX_CONSTANT_BUFFER_SLOTS {
            return Err(RhiError::ConstantBufferSlotOutOfRange {
                stage,
                slot,
                max: MAX_CONSTANT_BUFFER_SLOTS - 1,
            });
        }
        let entry = &mut self.stages[stage.index()][slot as usize];
        let cb = match entry.take() {
            Some(cb) => cb,
            None => {
                let buffer = device.create_constant_buffer(self.buffer_size)?;
                tracing::debug!(%stage, slot, size = self.buffer_size, "created constant buffer");
                ConstantBuffer::new(buffer, self.buffer_size)
            }
        };
        entry.insert(cb).update_constant(data, offset)
    }

    /// Commits one stage; `bind` runs for every slot that was uploaded.
    pub fn commit_stage<D>(
        &mut self,
        device: &mut D,
        stage: ShaderStage,
        discard_all: bool,
        mut bind: impl FnMut(&mut D, ShaderStage, u32, &B) -> Result<()>,
    ) -> Result<()>
    where
        D: ConstantBufferDevice<Buffer = B>,
    {
        for (slot, cb) in self.stages[stage.index()].iter_mut().enumerate() {
            let Some(cb) = cb else { continue };
            if cb.commit_constants_to_device(device, discard_all)? {
                if let Some(stats) = &self.stats {
                    stats.inc_constant_buffer_uploads();
                }
                bind(device, stage, slot as u32, &cb.buffer)?;
            }
        }
        Ok(())
    }

    /// Commits the graphics stages in bind order: vertex, then hull and
    /// domain only while tessellating, then geometry and pixel. Clears the
    /// shared-constant discard flag afterwards.
    pub fn commit_non_compute<D>(
        &mut self,
        device: &mut D,
        tessellating: bool,
        mut bind: impl FnMut(&mut D, ShaderStage, u32, &B) -> Result<()>,
    ) -> Result<()>
    where
        D: ConstantBufferDevice<Buffer = B>,
    {
        let discard = self.discard_shared_constants;
        self.commit_stage(device, ShaderStage::Vertex, discard, &mut bind)?;
        if tessellating {
            self.commit_stage(device, ShaderStage::Hull, discard, &mut bind)?;
            self.commit_stage(device, ShaderStage::Domain, discard, &mut bind)?;
        }
        self.commit_stage(device, ShaderStage::Geometry, discard, &mut bind)?;
        self.commit_stage(device, ShaderStage::Pixel, discard, &mut bind)?;
        self.discard_shared_constants = false;
        Ok(())
    }

    /// Compute constants are always rewritten whole.
    pub fn commit_compute<D>(
        &mut self,
        device: &mut D,
        bind: impl FnMut(&mut D, ShaderStage, u32, &B) -> Result<()>,
    ) -> Result<()>
    where
        D: ConstantBufferDevice<Buffer = B>,
    {
        self.commit_stage(device, ShaderStage::Compute, true, bind)
    }
}

impl<B> fmt::Debug for ConstantBufferSet<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let allocated: usize = self
            .stages
            .iter()
            .map(|s| s.iter().filter(|cb| cb.is_some()).count())
            .sum();
        f.debug_struct("ConstantBufferSet")
            .field("buffer_size", &self.buffer_size)
            .field("allocated", &allocated)
            .field("discard_shared_constants", &self.discard_shared_constants)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Uploads {
        next: u32,
        log: Vec<(u32, u32, usize)>,
    }

    impl ConstantBufferDevice for Uploads {
        type Buffer = u32;

        fn create_constant_buffer(&mut self, _size: u32) -> Result<u32> {
            self.next += 1;
            Ok(self.next)
        }

        fn update_constant_buffer(&mut self, buffer: &u32, offset: u32, data: &[u8]) -> Result<()> {
            self.log.push((*buffer, offset, data.len()));
            Ok(())
        }
    }

    #[test]
    fn dirty_range_widens() {
        let mut dev = Uploads::default();
        let mut cb = ConstantBuffer::new(7u32, 256);
        cb.update_constant(&[1; 16], 64).unwrap();
        cb.update_constant(&[2; 8], 16).unwrap();
        assert_eq!(cb.dirty_range(), Some(16..80));

        assert!(cb.commit_constants_to_device(&mut dev, false).unwrap());
        assert_eq!(dev.log, vec![(7, 16, 64)]);
        assert!(!cb.commit_constants_to_device(&mut dev, true).unwrap());
        assert_eq!(dev.log.len(), 1);
    }

    #[test]
    fn discard_uploads_whole_buffer() {
        let mut dev = Uploads::default();
        let mut cb = ConstantBuffer::new(1u32, 128);
        cb.update_constant(&[1; 4], 32).unwrap();
        assert!(cb.commit_constants_to_device(&mut dev, true).unwrap());
        assert_eq!(dev.log, vec![(1, 0, 128)]);
    }

    #[test]
    fn overflow_is_an_error() {
        let mut cb = ConstantBuffer::new(1u32, 64);
        assert!(matches!(
            cb.update_constant(&[0; 16], 56),
            Err(RhiError::ConstantBufferOverflow {
                buffer_size: 64,
                write_end: 72
            })
        ));
        assert_eq!(cb.dirty_range(), None);
    }

    #[test]
    fn commit_order_and_tessellation_gating() {
        let mut dev = Uploads::default();
        let mut set = ConstantBufferSet::new(64);
        for stage in [
            ShaderStage::Pixel,
            ShaderStage::Domain,
            ShaderStage::Geometry,
            ShaderStage::Hull,
            ShaderStage::Vertex,
        ] {
            set.update_constant(&mut dev, stage, 0, 0, &[1; 4]).unwrap();
        }

        let mut bound = Vec::new();
        set.commit_non_compute(&mut dev, false, |_, stage, slot, _| {
            bound.push((stage, slot));
            Ok(())
        })
        .unwrap();
        assert_eq!(
            bound,
            vec![
                (ShaderStage::Vertex, 0),
                (ShaderStage::Geometry, 0),
                (ShaderStage::Pixel, 0),
            ]
        );

        bound.clear();
        set.commit_non_compute(&mut dev, true, |_, stage, slot, _| {
            bound.push((stage, slot));
            Ok(())
        })
        .unwrap();
        assert_eq!(
            bound,
            vec![(ShaderStage::Hull, 0), (ShaderStage::Domain, 0)]
        );
    }

    #[test]
    fn discard_flag_clears_after_commit() {
        let mut dev = Uploads::default();
        let mut set = ConstantBufferSet::new(64);
        set.update_constant(&mut dev, ShaderStage::Vertex, 2, 8, &[1; 4])
            .unwrap();
        set.mark_discard_shared_constants();
        set.commit_non_compute(&mut dev, false, |_, _, _, _| Ok(()))
            .unwrap();
        assert!(!set.discard_shared_constants());
        assert_eq!(dev.log, vec![(1, 0, 64)]);
    }

    #[test]
    fn slot_range_is_checked() {
        let mut dev = Uploads::default();
        let mut set = ConstantBufferSet::<u32>::new(64);
        assert!(matches!(
            set.update_constant(&mut dev, ShaderStage::Pixel, 14, 0, &[0; 4]),
            Err(RhiError::ConstantBufferSlotOutOfRange { slot: 14, .. })
        ));
    }
}
