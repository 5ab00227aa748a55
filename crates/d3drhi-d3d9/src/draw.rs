//! Draw submission: buffer draws with manual instance replication and
//! user-pointer draws straight from client memory.

use d3drhi_core::topology::{d3d9_topology, vertex_count_for_primitive_count};
use d3drhi_core::{
    GraphicsDevice, IndexedDraw, IndexedDrawUp, PrimitiveType, Result, RhiError,
    MAX_VERTEX_STREAMS,
};

use crate::driver::{D3D9Driver, IndexFormat, StreamFrequency};
use crate::rhi::D3D9Rhi;

/// A user-pointer draw between its begin and end calls. The vertex and index
/// data live in the dispatcher's scratch buffer.
#[derive(Debug, Clone, Copy)]
pub(crate) enum PendingDrawUp {
    Vertices {
        primitive: PrimitiveType,
        num_primitives: u32,
        vertex_stride: u32,
    },
    Indexed {
        draw: IndexedDrawUp,
        vertex_len: usize,
    },
}

fn leading_bytes<'a>(what: &'static str, data: &'a [u8], len: usize) -> Result<&'a [u8]> {
    data.get(..len).ok_or(RhiError::DataSizeMismatch {
        what,
        expected: len,
        actual: data.len(),
    })
}

fn check_index_stride(stride: u32) -> Result<()> {
    if matches!(stride, 2 | 4) {
        Ok(())
    } else {
        Err(RhiError::InvalidIndexStride(stride))
    }
}

impl<D: D3D9Driver> D3D9Rhi<D> {
    /// Counts the draw, then reports whether it has to be dropped because the
    /// device is lost.
    fn count_draw(&mut self, primitive: PrimitiveType, num_primitives: u32) -> bool {
        self.stats.inc_draw_calls();
        self.stats
            .add_primitives(num_primitives, primitive.is_line());
        if self.is_device_lost() {
            self.stats.inc_draws_skipped_device_lost();
            tracing::warn!(%primitive, num_primitives, "device lost, draw skipped");
            return true;
        }
        false
    }

    fn clear_pending_instances(&mut self) {
        self.instancing_mask = 0;
        self.pending_streams = Default::default();
        self.pending_num_instances = 1;
    }

    /// Redraws instances `1..n` after the first one has been drawn, pointing
    /// every instance stream at the next element with a zero stride.
    fn draw_remaining_instances(&mut self, mut draw: impl FnMut(&mut D)) {
        for instance in 1..self.pending_num_instances {
            for stream in 0..MAX_VERTEX_STREAMS {
                if self.instancing_mask & (1 << stream) == 0 {
                    continue;
                }
                if let Some(pending) = self.pending_streams[stream as usize] {
                    self.driver.set_stream_source(
                        stream,
                        Some(pending.buffer),
                        pending.offset + pending.stride * instance,
                        0,
                    );
                }
            }
            draw(&mut self.driver);
        }
        if self.pending_num_instances > 1 {
            tracing::trace!(instances = self.pending_num_instances, "replicated instances");
        }
        self.clear_pending_instances();
    }

    pub(crate) fn submit_draw(
        &mut self,
        primitive: PrimitiveType,
        base_vertex_index: u32,
        num_primitives: u32,
    ) -> Result<()> {
        let topology = d3d9_topology(primitive)?;
        if self.count_draw(primitive, num_primitives) {
            self.clear_pending_instances();
            return Ok(());
        }
        if num_primitives == 0 {
            self.clear_pending_instances();
            return Ok(());
        }
        let draw = move |driver: &mut D| {
            driver.draw_primitive(topology, base_vertex_index, num_primitives)
        };
        draw(&mut self.driver);
        self.draw_remaining_instances(draw);
        tracing::trace!(%primitive, num_primitives, "draw");
        Ok(())
    }

    pub(crate) fn submit_indexed_draw(&mut self, draw: &IndexedDraw) -> Result<()> {
        let index_buffer = self.resources.index_buffer(draw.index_buffer)?;
        let topology = d3d9_topology(draw.primitive)?;
        if self.count_draw(draw.primitive, draw.num_primitives) {
            self.clear_pending_instances();
            return Ok(());
        }
        self.driver.set_indices(index_buffer.buffer);
        if draw.num_primitives == 0 {
            self.clear_pending_instances();
            return Ok(());
        }
        let draw = *draw;
        let issue = move |driver: &mut D| {
            driver.draw_indexed_primitive(
                topology,
                draw.base_vertex_index,
                draw.min_index,
                draw.num_vertices,
                draw.start_index,
                draw.num_primitives,
            )
        };
        issue(&mut self.driver);
        self.draw_remaining_instances(issue);
        tracing::trace!(
            primitive = %draw.primitive,
            num_primitives = draw.num_primitives,
            "indexed draw"
        );
        Ok(())
    }

    pub(crate) fn submit_draw_up(
        &mut self,
        primitive: PrimitiveType,
        num_primitives: u32,
        vertex_data: &[u8],
        vertex_stride: u32,
    ) -> Result<()> {
        let topology = d3d9_topology(primitive)?;
        let vertex_count = vertex_count_for_primitive_count(num_primitives, primitive)?;
        let vertices = leading_bytes(
            "vertex",
            vertex_data,
            vertex_count as usize * vertex_stride as usize,
        )?;
        if self.count_draw(primitive, num_primitives) {
            return Ok(());
        }
        self.driver
            .set_stream_source_freq(0, StreamFrequency::PerVertex);
        if num_primitives > 0 {
            self.driver
                .draw_primitive_up(topology, num_primitives, vertices, vertex_stride);
        }
        Ok(())
    }

    pub(crate) fn submit_indexed_draw_up(
        &mut self,
        draw: &IndexedDrawUp,
        index_data: &[u8],
        vertex_data: &[u8],
    ) -> Result<()> {
        check_index_stride(draw.index_stride)?;
        let topology = d3d9_topology(draw.primitive)?;
        let index_count = vertex_count_for_primitive_count(draw.num_primitives, draw.primitive)?;
        let vertices = leading_bytes(
            "vertex",
            vertex_data,
            draw.num_vertices as usize * draw.vertex_stride as usize,
        )?;
        let indices = leading_bytes(
            "index",
            index_data,
            index_count as usize * draw.index_stride as usize,
        )?;
        if self.count_draw(draw.primitive, draw.num_primitives) {
            return Ok(());
        }
        self.driver
            .set_stream_source_freq(0, StreamFrequency::PerVertex);
        if draw.num_primitives > 0 {
            self.driver.draw_indexed_primitive_up(
                topology,
                draw.min_vertex_index,
                draw.num_vertices,
                draw.num_primitives,
                indices,
                IndexFormat::from_stride(draw.index_stride),
                vertices,
                draw.vertex_stride,
            );
        }
        Ok(())
    }

    pub(crate) fn begin_draw_up(
        &mut self,
        primitive: PrimitiveType,
        num_primitives: u32,
        num_vertices: u32,
        vertex_stride: u32,
    ) -> Result<&mut [u8]> {
        if self.pending_draw_up.is_some() {
            return Err(RhiError::DrawUpAlreadyPending("begin_draw_primitive_up"));
        }
        self.pending_draw_up = Some(PendingDrawUp::Vertices {
            primitive,
            num_primitives,
            vertex_stride,
        });
        self.draw_up_scratch.clear();
        self.draw_up_scratch
            .resize(num_vertices as usize * vertex_stride as usize, 0);
        Ok(&mut self.draw_up_scratch)
    }

    pub(crate) fn end_draw_up(&mut self) -> Result<()> {
        let Some(PendingDrawUp::Vertices {
            primitive,
            num_primitives,
            vertex_stride,
        }) = self.pending_draw_up
        else {
            return Err(RhiError::DrawUpNotPending("end_draw_primitive_up"));
        };
        self.pending_draw_up = None;

        let scratch = std::mem::take(&mut self.draw_up_scratch);
        let result = self.submit_draw_up(primitive, num_primitives, &scratch, vertex_stride);
        self.draw_up_scratch = scratch;
        result
    }

    pub(crate) fn begin_indexed_draw_up(
        &mut self,
        draw: &IndexedDrawUp,
    ) -> Result<(&mut [u8], &mut [u8])> {
        if self.pending_draw_up.is_some() {
            return Err(RhiError::DrawUpAlreadyPending(
                "begin_draw_indexed_primitive_up",
            ));
        }
        check_index_stride(draw.index_stride)?;
        let index_count = vertex_count_for_primitive_count(draw.num_primitives, draw.primitive)?;
        let vertex_len = draw.num_vertices as usize * draw.vertex_stride as usize;
        let index_len = index_count as usize * draw.index_stride as usize;

        self.pending_draw_up = Some(PendingDrawUp::Indexed {
            draw: *draw,
            vertex_len,
        });
        self.draw_up_scratch.clear();
        self.draw_up_scratch.resize(vertex_len + index_len, 0);
        Ok(self.draw_up_scratch.split_at_mut(vertex_len))
    }

    pub(crate) fn end_indexed_draw_up(&mut self) -> Result<()> {
        let Some(PendingDrawUp::Indexed { draw, vertex_len }) = self.pending_draw_up else {
            return Err(RhiError::DrawUpNotPending("end_draw_indexed_primitive_up"));
        };
        self.pending_draw_up = None;

        let scratch = std::mem::take(&mut self.draw_up_scratch);
        let (vertices, indices) = scratch.split_at(vertex_len);
        let result = self.submit_indexed_draw_up(&draw, indices, vertices);
        self.draw_up_scratch = scratch;
        result
    }
}

#[cfg(test)]
mod tests {
    use d3drhi_core::{RhiConfig, StreamSource};

    use super::*;
    use crate::recording::{D3D9Call, RecordingDriver};

    fn rhi() -> D3D9Rhi<RecordingDriver> {
        D3D9Rhi::new(RecordingDriver::new(), RhiConfig::default())
    }

    #[test]
    fn nested_begin_is_rejected() {
        let mut rhi = rhi();
        rhi.begin_draw_primitive_up(PrimitiveType::TriangleList, 1, 3, 16)
            .unwrap();
        assert!(matches!(
            rhi.begin_draw_indexed_primitive_up(&IndexedDrawUp {
                primitive: PrimitiveType::TriangleList,
                min_vertex_index: 0,
                num_vertices: 3,
                num_primitives: 1,
                index_stride: 2,
                vertex_stride: 16,
            }),
            Err(RhiError::DrawUpAlreadyPending(_))
        ));
        rhi.end_draw_primitive_up().unwrap();
        assert!(matches!(
            rhi.end_draw_primitive_up(),
            Err(RhiError::DrawUpNotPending(_))
        ));
    }

    #[test]
    fn quad_list_is_unknown_on_d3d9() {
        let mut rhi = rhi();
        assert!(matches!(
            rhi.draw_primitive(PrimitiveType::QuadList, 0, 1),
            Err(RhiError::UnknownPrimitiveType { .. })
        ));
        assert_eq!(rhi.stats().snapshot().draw_calls, 0);
    }

    #[test]
    fn zero_primitive_up_draw_only_resets_frequency() {
        let mut rhi = rhi();
        rhi.draw_primitive_up(PrimitiveType::TriangleList, 0, &[], 12)
            .unwrap();
        assert!(!rhi.driver().calls().iter().any(D3D9Call::is_draw));
        assert!(rhi
            .driver()
            .calls()
            .contains(&D3D9Call::SetStreamSourceFreq {
                stream: 0,
                frequency: StreamFrequency::PerVertex,
            }));
    }

    #[test]
    fn skipped_draw_drops_pending_instances() {
        let mut rhi = D3D9Rhi::new(
            RecordingDriver::new(),
            RhiConfig {
                supports_vertex_instancing: false,
                ..RhiConfig::default()
            },
        );
        let vb = rhi.create_vertex_buffer(256).unwrap();
        rhi.set_stream_source(
            1,
            &StreamSource {
                use_instance_index: true,
                num_instances: 4,
                ..StreamSource::per_vertex(vb, 16)
            },
        )
        .unwrap();
        rhi.driver_mut()
            .set_cooperative_level(crate::driver::CooperativeLevel::DeviceLost);
        rhi.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();
        assert_eq!(rhi.pending_num_instances, 1);
        assert_eq!(rhi.instancing_mask, 0);
    }
}
