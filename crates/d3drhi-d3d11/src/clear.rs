//! Clears. Whole-target clears go through the native clear calls; clears
//! restricted by the viewport or scissor draw a full-screen quad with the
//! configured clear shaders and put the pipeline back afterwards.

use d3drhi_core::state::{
    BlendStateDesc, ColorWriteMask, CompareFunction, DepthStateDesc, LinearColor,
    RasterizerStateDesc, StencilFaceDesc, StencilOp, StencilStateDesc,
    MAX_SIMULTANEOUS_RENDER_TARGETS,
};
use d3drhi_core::state_cache::{BlendKey, DepthStencilKey, RasterizerKey};
use d3drhi_core::{ClearValues, PrimitiveType, Result, RhiError, ShaderStage};

use crate::driver::{D3D11Driver, DsvHandle};
use crate::resources::BoundShaderState;
use crate::rhi::{D3D11Rhi, SAMPLE_MASK_ALL};

/// Pixel shader constant buffer slot the clear colour is written to.
const CLEAR_COLOR_BUFFER_INDEX: u32 = 0;
const CLEAR_VERTEX_STRIDE: u32 = 16;

const GRAPHICS_STAGES: [ShaderStage; 5] = [
    ShaderStage::Vertex,
    ShaderStage::Hull,
    ShaderStage::Domain,
    ShaderStage::Geometry,
    ShaderStage::Pixel,
];

fn clear_stencil_state(stencil: Option<u32>) -> StencilStateDesc {
    let Some(value) = stencil else {
        return StencilStateDesc::default();
    };
    StencilStateDesc {
        enable_front_stencil: true,
        front: StencilFaceDesc {
            test: CompareFunction::Always,
            fail_op: StencilOp::Replace,
            depth_fail_op: StencilOp::Replace,
            pass_op: StencilOp::Replace,
        },
        read_mask: 0xff,
        write_mask: 0xff,
        stencil_ref: value,
        ..StencilStateDesc::default()
    }
}

/// Triangle strip covering clip space at depth `z`.
fn clear_quad(z: f32) -> [[f32; 4]; 4] {
    [
        [-1.0, 1.0, z, 1.0],
        [1.0, 1.0, z, 1.0],
        [-1.0, -1.0, z, 1.0],
        [1.0, -1.0, z, 1.0],
    ]
}

impl<D: D3D11Driver> D3D11Rhi<D> {
    /// Size of the surface a clear writes: colour target 0, else the depth
    /// surface.
    fn clear_target_size(&self) -> Result<Option<(u32, u32)>> {
        self.color_surfaces[0]
            .or(self.depth_surface)
            .map(|id| {
                self.resources
                    .surface(id)
                    .map(|surface| (surface.desc.width, surface.desc.height))
            })
            .transpose()
    }

    fn writable_depth_stencil_view(&self) -> Result<Option<DsvHandle>> {
        match self.depth_surface {
            Some(id) => Ok(self.resources.surface(id)?.views.depth_stencil),
            None => Ok(None),
        }
    }

    fn clear_needs_draw(&self) -> Result<bool> {
        if self.scissor_enable {
            return Ok(true);
        }
        let (Some(viewport), Some((width, height))) = (self.viewport, self.clear_target_size()?)
        else {
            return Ok(false);
        };
        if viewport.min_x > 0 || viewport.min_y > 0 {
            return Ok(true);
        }
        let (w, h) = (viewport.width(), viewport.height());
        Ok((w < width || h < height) && w > 1 && h > 1)
    }

    pub(crate) fn clear_targets(&mut self, values: &ClearValues) -> Result<()> {
        // Read-only DSVs cannot be cleared.
        let change_dst = values.clears_depth_or_stencil()
            && self.depth_stencil_is_read_only
            && self.depth_surface.is_some();

        if self.clear_needs_draw()? {
            self.clear_with_draw(values, change_dst)
        } else {
            self.clear_with_views(values, change_dst)
        }
    }

    fn clear_with_views(&mut self, values: &ClearValues, change_dst: bool) -> Result<()> {
        if let (Some(color), Some(rtv)) = (values.color, self.render_targets[0]) {
            self.driver.clear_render_target_view(rtv, color.to_array());
        }
        if values.clears_depth_or_stencil() {
            let dsv = if change_dst {
                self.writable_depth_stencil_view()?
            } else {
                self.depth_stencil_view
            };
            if let Some(dsv) = dsv {
                self.driver.clear_depth_stencil_view(
                    dsv,
                    values.depth,
                    values.stencil.map(|stencil| stencil as u8),
                );
            }
        }
        Ok(())
    }

    fn clear_with_draw(&mut self, values: &ClearValues, change_dst: bool) -> Result<()> {
        let clear_shaders = self
            .clear_shader_state
            .ok_or(RhiError::MissingClearShaders)?;
        let clear_shaders = self.resources.bound_shader_state(clear_shaders)?;
        let using_tessellation = self.using_tessellation;

        tracing::trace!(?values, change_dst, "clearing with a quad");
        let drawn = self.draw_clear_quad(values, change_dst, &clear_shaders);
        let restored = self.restore_after_clear(change_dst, using_tessellation);
        drawn.and(restored)
    }

    fn draw_clear_quad(
        &mut self,
        values: &ClearValues,
        change_dst: bool,
        clear_shaders: &BoundShaderState,
    ) -> Result<()> {
        if let Some(id) = self.depth_surface {
            self.unset_texture_references(id)?;
        }

        let color_write_masks = if values.color.is_some() && self.render_targets[0].is_some() {
            self.color_write_masks
        } else {
            [ColorWriteMask::empty(); MAX_SIMULTANEOUS_RENDER_TARGETS]
        };
        let blend = self.blend_state(BlendKey {
            desc: BlendStateDesc::default(),
            color_write_masks,
        })?;
        self.driver
            .om_set_blend_state(blend, [0.0; 4], SAMPLE_MASK_ALL);

        let depth = DepthStateDesc {
            enable_depth_write: values.depth.is_some(),
            depth_test: CompareFunction::Always,
        };
        let depth_stencil = self.depth_stencil_state(DepthStencilKey::new(
            depth,
            clear_stencil_state(values.stencil),
        ))?;
        // Without a stencil clear the test is off; keep the caller's reference.
        let stencil_ref = values.stencil.unwrap_or(self.stencil.stencil_ref);
        self.driver
            .om_set_depth_stencil_state(depth_stencil, stencil_ref);

        let rasterizer = self.rasterizer_state(RasterizerKey {
            desc: RasterizerStateDesc::default(),
            scissor_enable: self.scissor_enable,
            multisample_enable: self.render_target_is_multisample,
        })?;
        self.driver.rs_set_state(rasterizer);

        if change_dst {
            let writable = self.writable_depth_stencil_view()?;
            self.driver
                .om_set_render_targets(&self.render_targets, writable);
        }

        self.bind_shader_state(clear_shaders);
        let color = values.color.unwrap_or(LinearColor::TRANSPARENT).to_array();
        self.constant_buffers.update_constant(
            &mut self.driver,
            ShaderStage::Pixel,
            CLEAR_COLOR_BUFFER_INDEX,
            0,
            bytemuck::cast_slice(&color),
        )?;

        let quad = clear_quad(values.depth.unwrap_or(0.0));
        self.submit_draw_up(
            PrimitiveType::TriangleStrip,
            2,
            bytemuck::cast_slice(&quad),
            CLEAR_VERTEX_STRIDE,
        )
    }

    /// Rebinds everything the clear quad overrode. Every step runs; the
    /// first failure is returned.
    fn restore_after_clear(&mut self, change_dst: bool, using_tessellation: bool) -> Result<()> {
        if change_dst {
            self.driver
                .om_set_render_targets(&self.render_targets, self.depth_stencil_view);
        }

        let shaders = match self.bound_shader_state {
            Some(id) => self
                .resources
                .bound_shader_state(id)
                .map(|state| self.bind_shader_state(&state)),
            None => {
                self.driver.ia_set_input_layout(None);
                for stage in GRAPHICS_STAGES {
                    self.driver.set_shader(stage, None);
                }
                Ok(())
            }
        };
        self.using_tessellation = using_tessellation;

        let depth_stencil = self.apply_depth_stencil_state();
        let blend = self.apply_blend_state();
        let rasterizer = self.apply_rasterizer_state();
        shaders.and(depth_stencil).and(blend).and(rasterizer)
    }
}
