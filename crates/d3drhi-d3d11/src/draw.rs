//! Draw submission: buffer draws, user-pointer draws through the dynamic
//! ring, and compute dispatch.

use d3drhi_core::dynamic_ring::BufferBinding;
use d3drhi_core::topology::{d3d11_topology, vertex_count_for_primitive_count};
use d3drhi_core::{
    IndexedDraw, IndexedDrawUp, PrimitiveTopology, PrimitiveType, Result, RhiError, ShaderId,
    ShaderStage,
};

use crate::driver::{D3D11Driver, IndexFormat};
use crate::rhi::D3D11Rhi;

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

/// The leading `len` bytes of `data`.
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

impl<D: D3D11Driver> D3D11Rhi<D> {
    fn topology(&self, primitive: PrimitiveType) -> Result<PrimitiveTopology> {
        d3d11_topology(primitive, self.using_tessellation)
    }

    fn count_draw(&self, primitive: PrimitiveType, num_primitives: u32) {
        self.stats.inc_draw_calls();
        self.stats
            .add_primitives(num_primitives, primitive.is_line());
    }

    /// Uploads dirty graphics constants and binds the buffers that changed.
    fn commit_graphics_constants(&mut self) -> Result<()> {
        self.constant_buffers.commit_non_compute(
            &mut self.driver,
            self.using_tessellation,
            |driver, stage, slot, buffer| {
                driver.set_constant_buffer(stage, slot, Some(*buffer));
                Ok(())
            },
        )
    }

    pub(crate) fn submit_draw(
        &mut self,
        primitive: PrimitiveType,
        base_vertex_index: u32,
        num_primitives: u32,
    ) -> Result<()> {
        let topology = self.topology(primitive)?;
        let vertex_count = vertex_count_for_primitive_count(num_primitives, primitive)?;
        self.count_draw(primitive, num_primitives);
        self.commit_graphics_constants()?;
        self.driver.ia_set_primitive_topology(topology);
        if self.pending_num_instances > 1 {
            self.driver.draw_instanced(
                vertex_count,
                self.pending_num_instances,
                base_vertex_index,
                0,
            );
        } else {
            self.driver.draw(vertex_count, base_vertex_index);
        }
        tracing::trace!(%primitive, vertex_count, instances = self.pending_num_instances, "draw");
        Ok(())
    }

    pub(crate) fn submit_indexed_draw(&mut self, draw: &IndexedDraw) -> Result<()> {
        let index_buffer = self.resources.index_buffer(draw.index_buffer)?;
        let topology = self.topology(draw.primitive)?;
        let index_count = vertex_count_for_primitive_count(draw.num_primitives, draw.primitive)?;
        self.count_draw(draw.primitive, draw.num_primitives);
        self.commit_graphics_constants()?;
        self.driver.ia_set_index_buffer(
            index_buffer.buffer,
            IndexFormat::from_stride(index_buffer.stride),
            0,
        );
        self.driver.ia_set_primitive_topology(topology);
        if self.pending_num_instances > 1 {
            self.driver.draw_indexed_instanced(
                index_count,
                self.pending_num_instances,
                draw.start_index,
                draw.base_vertex_index,
                0,
            );
        } else {
            self.driver
                .draw_indexed(index_count, draw.start_index, draw.base_vertex_index);
        }
        tracing::trace!(
            primitive = %draw.primitive,
            index_count,
            instances = self.pending_num_instances,
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
        let topology = self.topology(primitive)?;
        let vertex_count = vertex_count_for_primitive_count(num_primitives, primitive)?;
        let vertices = leading_bytes(
            "vertex",
            vertex_data,
            vertex_count as usize * vertex_stride as usize,
        )?;
        let allocation = self.dynamic_buffers.fill_buffer(
            &mut self.driver,
            vertex_count,
            vertex_stride,
            vertices,
            BufferBinding::Vertex,
        )?;

        self.count_draw(primitive, num_primitives);
        self.commit_graphics_constants()?;
        self.driver.ia_set_vertex_buffer(
            0,
            Some(allocation.buffer),
            vertex_stride,
            allocation.offset,
        );
        self.driver.ia_set_primitive_topology(topology);
        self.driver.draw(vertex_count, 0);
        Ok(())
    }

    pub(crate) fn submit_indexed_draw_up(
        &mut self,
        draw: &IndexedDrawUp,
        index_data: &[u8],
        vertex_data: &[u8],
    ) -> Result<()> {
        check_index_stride(draw.index_stride)?;
        let topology = self.topology(draw.primitive)?;
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

        let vertex_allocation = self.dynamic_buffers.fill_buffer(
            &mut self.driver,
            draw.num_vertices,
            draw.vertex_stride,
            vertices,
            BufferBinding::Vertex,
        )?;
        let index_allocation = self.dynamic_buffers.fill_buffer(
            &mut self.driver,
            index_count,
            draw.index_stride,
            indices,
            BufferBinding::Index,
        )?;

        self.count_draw(draw.primitive, draw.num_primitives);
        self.commit_graphics_constants()?;
        self.driver.ia_set_vertex_buffer(
            0,
            Some(vertex_allocation.buffer),
            draw.vertex_stride,
            vertex_allocation.offset,
        );
        self.driver.ia_set_index_buffer(
            index_allocation.buffer,
            IndexFormat::from_stride(draw.index_stride),
            index_allocation.offset,
        );
        self.driver.ia_set_primitive_topology(topology);
        self.driver
            .draw_indexed(index_count, 0, draw.min_vertex_index as i32);
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

    /// Binds `shader`, commits compute constants, dispatches, and unbinds
    /// the compute shader again.
    pub(crate) fn dispatch_compute(
        &mut self,
        shader: ShaderId,
        thread_groups: [u32; 3],
    ) -> Result<()> {
        let handle = self.resources.shader(shader, ShaderStage::Compute)?;
        self.driver.set_shader(ShaderStage::Compute, Some(handle));
        self.constant_buffers
            .commit_compute(&mut self.driver, |driver, stage, slot, buffer| {
                driver.set_constant_buffer(stage, slot, Some(*buffer));
                Ok(())
            })?;
        self.driver.dispatch(thread_groups);
        self.driver.set_shader(ShaderStage::Compute, None);
        Ok(())
    }
}
