//! Render target binding and clears.

use d3drhi_core::{Backend, ClearValues, Result, RhiError, SurfaceId, SurfaceUsage, Viewport};

use crate::consts::{D3DVERTEXTEXTURESAMPLER0, NUM_PIXEL_SAMPLERS, NUM_VERTEX_SAMPLERS};
use crate::driver::{ClearFlags, D3D9Driver, SurfaceHandle};
use crate::rhi::{slot_bit, D3D9Rhi};

/// D3D9 devices expose at most four simultaneous colour targets.
pub(crate) const MAX_D3D9_RENDER_TARGETS: u32 = 4;

impl<D: D3D9Driver> D3D9Rhi<D> {
    fn color_surface(&self, id: SurfaceId) -> Result<SurfaceHandle> {
        let surface = self.resources.surface(id)?;
        if !surface.desc.usage.contains(SurfaceUsage::RENDER_TARGET) {
            return Err(RhiError::NotRenderTarget(id.0));
        }
        Ok(surface.handles.surface)
    }

    fn depth_stencil_surface(&self, id: SurfaceId) -> Result<SurfaceHandle> {
        let surface = self.resources.surface(id)?;
        if !surface.desc.usage.contains(SurfaceUsage::DEPTH_STENCIL) {
            return Err(RhiError::NotDepthStencil(id.0));
        }
        Ok(surface.handles.surface)
    }

    /// Unbinds every texture slot that may still reference a surface about
    /// to become a target.
    pub(crate) fn unset_textures(&mut self) {
        for slot in 0..NUM_PIXEL_SAMPLERS {
            if self.bound_pixel_textures & slot_bit(slot) != 0 {
                self.driver.set_texture(slot, None);
            }
        }
        for slot in 0..NUM_VERTEX_SAMPLERS {
            if self.bound_vertex_textures & slot_bit(slot) != 0 {
                self.driver.set_texture(D3DVERTEXTEXTURESAMPLER0 + slot, None);
            }
        }
        self.bound_pixel_textures = 0;
        self.bound_vertex_textures = 0;
    }

    /// A null colour target renders to the back buffer.
    pub(crate) fn bind_render_target(
        &mut self,
        color: Option<SurfaceId>,
        depth_stencil: Option<SurfaceId>,
    ) -> Result<()> {
        let color_id = match color.or(self.back_buffer) {
            Some(id) => id,
            None => {
                return Err(RhiError::Unsupported {
                    backend: Backend::D3D9,
                    what: "null colour target without a back buffer",
                })
            }
        };
        let color_handle = self.color_surface(color_id)?;
        let depth_handle = depth_stencil
            .map(|id| self.depth_stencil_surface(id))
            .transpose()?;

        self.unset_textures();
        self.driver.set_render_target(0, Some(color_handle));
        self.driver.set_depth_stencil_surface(depth_handle);
        self.stats.inc_render_target_rebinds();
        tracing::debug!(
            color = ?color,
            depth_stencil = ?depth_stencil,
            back_buffer = ?self.back_buffer,
            "render targets rebound"
        );

        if let Some(back_buffer) = self.back_buffer {
            if color.is_none() || color == Some(back_buffer) {
                let desc = self.resources.surface(back_buffer)?.desc;
                self.apply_viewport(&Viewport::full(desc.width, desc.height));
            }
        }
        Ok(())
    }

    pub(crate) fn bind_mrt_render_target(
        &mut self,
        color: Option<SurfaceId>,
        target_index: u32,
    ) -> Result<()> {
        if target_index >= MAX_D3D9_RENDER_TARGETS {
            return Err(RhiError::RenderTargetIndexOutOfRange {
                index: target_index,
                max: MAX_D3D9_RENDER_TARGETS - 1,
            });
        }
        // Target 0 can never be empty; it falls back to the back buffer.
        let color = if target_index == 0 {
            color.or(self.back_buffer)
        } else {
            color
        };
        let handle = color.map(|id| self.color_surface(id)).transpose()?;
        if target_index == 0 && handle.is_none() {
            return Err(RhiError::Unsupported {
                backend: Backend::D3D9,
                what: "null colour target without a back buffer",
            });
        }

        self.unset_textures();
        self.driver.set_render_target(target_index, handle);
        self.stats.inc_render_target_rebinds();
        tracing::debug!(target_index, color = ?color, "mrt target rebound");
        Ok(())
    }

    /// Native clear of whatever is bound. Depth defaults to the far plane
    /// and stencil to zero when only some aspects are cleared.
    pub(crate) fn clear_targets(&mut self, values: &ClearValues) {
        let mut flags = ClearFlags::empty();
        flags.set(ClearFlags::TARGET, values.color.is_some());
        flags.set(ClearFlags::ZBUFFER, values.depth.is_some());
        flags.set(ClearFlags::STENCIL, values.stencil.is_some());
        if flags.is_empty() {
            return;
        }
        let color = values.color.map_or(0, |color| color.to_d3dcolor());
        self.driver.clear(
            flags,
            color,
            values.depth.unwrap_or(1.0),
            values.stencil.unwrap_or(0),
        );
    }
}

#[cfg(test)]
mod tests {
    use d3drhi_core::state::LinearColor;
    use d3drhi_core::{GraphicsDevice, RhiConfig, SurfaceDesc, SurfaceFormat};

    use super::*;
    use crate::recording::{D3D9Call, RecordingDriver};

    fn rhi() -> D3D9Rhi<RecordingDriver> {
        D3D9Rhi::new(RecordingDriver::new(), RhiConfig::default())
    }

    #[test]
    fn null_colour_without_back_buffer_is_rejected() {
        let mut rhi = rhi();
        assert!(matches!(
            rhi.set_render_target(None, None),
            Err(RhiError::Unsupported { .. })
        ));
    }

    #[test]
    fn depth_only_clear_leaves_colour_alone() {
        let mut rhi = rhi();
        rhi.clear(&ClearValues {
            color: None,
            depth: Some(0.5),
            stencil: None,
        })
        .unwrap();
        assert_eq!(
            rhi.driver().calls().last(),
            Some(&D3D9Call::Clear {
                flags: ClearFlags::ZBUFFER,
                color: 0,
                depth: 0.5,
                stencil: 0,
            })
        );
    }

    #[test]
    fn empty_clear_is_a_no_op() {
        let mut rhi = rhi();
        rhi.clear(&ClearValues::default()).unwrap();
        assert!(rhi.driver().calls().is_empty());
    }

    #[test]
    fn colour_clear_packs_d3dcolor() {
        let mut rhi = rhi();
        rhi.clear(&ClearValues::color(LinearColor::new(1.0, 0.0, 0.0, 1.0)))
            .unwrap();
        assert!(matches!(
            rhi.driver().calls().last(),
            Some(D3D9Call::Clear {
                flags: ClearFlags::TARGET,
                color: 0xFFFF_0000,
                ..
            })
        ));
    }

    #[test]
    fn depth_surface_as_colour_target_is_rejected() {
        let mut rhi = rhi();
        let depth = rhi.create_surface(&SurfaceDesc::depth_stencil(8, 8)).unwrap();
        let color = rhi
            .create_surface(&SurfaceDesc::render_target(8, 8, SurfaceFormat::Rgba8Unorm))
            .unwrap();
        assert!(matches!(
            rhi.set_render_target(Some(depth), None),
            Err(RhiError::NotRenderTarget(_))
        ));
        assert!(matches!(
            rhi.set_render_target(Some(color), Some(color)),
            Err(RhiError::NotDepthStencil(_))
        ));
    }
}
