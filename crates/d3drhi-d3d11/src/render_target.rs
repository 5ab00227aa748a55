//! Output merger bindings: colour targets, the depth-stencil view and its
//! read-only variant.

use d3drhi_core::state::{DepthStateDesc, MAX_SIMULTANEOUS_RENDER_TARGETS};
use d3drhi_core::{Result, RhiError, ShaderStage, SurfaceId, Viewport};

use crate::driver::{D3D11Driver, DsvHandle, RtvHandle};
use crate::resources::Surface;
use crate::rhi::{render_target_slot, D3D11Rhi};

/// The read-only DSV when `read_only` and the surface has one, otherwise the
/// writable DSV.
pub(crate) fn depth_stencil_view(surface: &Surface, read_only: bool) -> Option<DsvHandle> {
    if read_only {
        surface
            .views
            .read_only_depth_stencil
            .or(surface.views.depth_stencil)
    } else {
        surface.views.depth_stencil
    }
}

impl<D: D3D11Driver> D3D11Rhi<D> {
    fn render_target_view(&self, color: Option<SurfaceId>) -> Result<Option<RtvHandle>> {
        let Some(id) = color else {
            return Ok(None);
        };
        let view = self
            .resources
            .surface(id)?
            .views
            .render_target
            .ok_or(RhiError::NotRenderTarget(id.0))?;
        Ok(Some(view))
    }

    /// Unbinds every shader resource slot the surface was last sampled from
    /// so it can be bound as a target.
    pub(crate) fn unset_texture_references(&mut self, id: SurfaceId) -> Result<()> {
        let surface = self.resources.surface_mut(id)?;
        for stage in ShaderStage::ALL {
            for slot in surface.bound_srv_slots[stage.index()].drain(..) {
                self.driver.set_shader_resource(stage, slot, None);
            }
        }
        Ok(())
    }

    fn rebind_render_targets(&mut self) {
        self.driver
            .om_set_render_targets(&self.render_targets, self.depth_stencil_view);
        self.stats.inc_render_target_rebinds();
    }

    pub(crate) fn bind_render_target(
        &mut self,
        color: Option<SurfaceId>,
        depth_stencil: Option<SurfaceId>,
    ) -> Result<()> {
        let rtv = self.render_target_view(color)?;
        let dsv = match depth_stencil {
            Some(id) => {
                let surface = self.resources.surface(id)?;
                if surface.views.depth_stencil.is_none() {
                    return Err(RhiError::NotDepthStencil(id.0));
                }
                self.depth_stencil_is_read_only = !self.depth.enable_depth_write;
                depth_stencil_view(surface, self.depth_stencil_is_read_only)
            }
            None => None,
        };

        let mrt_bound = self.render_targets[1..].iter().any(Option::is_some);
        if rtv != self.render_targets[0] || dsv != self.depth_stencil_view || mrt_bound {
            if let Some(id) = color {
                self.unset_texture_references(id)?;
            }
            if let Some(id) = depth_stencil {
                self.unset_texture_references(id)?;
            }
            self.depth_surface = depth_stencil;
            self.depth_stencil_view = dsv;
            self.render_targets = [None; MAX_SIMULTANEOUS_RENDER_TARGETS];
            self.render_targets[0] = rtv;
            self.color_surfaces = [None; MAX_SIMULTANEOUS_RENDER_TARGETS];
            self.color_surfaces[0] = color;
            self.rebind_render_targets();
            tracing::debug!(
                color = ?color,
                depth_stencil = ?depth_stencil,
                read_only = self.depth_stencil_is_read_only,
                "render targets rebound"
            );
        }

        let targets_back_buffer =
            self.back_buffer.is_some() && (color.is_none() || color == self.back_buffer);
        let full_target = if targets_back_buffer {
            self.back_buffer
        } else {
            color
        };
        if let Some(id) = full_target {
            let desc = self.resources.surface(id)?.desc;
            self.apply_viewport(&Viewport::full(desc.width, desc.height));
        }

        if let Some(id) = color {
            self.render_target_is_multisample = self.resources.surface(id)?.desc.is_multisample();
            self.apply_rasterizer_state()?;
        }
        Ok(())
    }

    pub(crate) fn bind_mrt_render_target(
        &mut self,
        color: Option<SurfaceId>,
        target_index: u32,
    ) -> Result<()> {
        let index = render_target_slot(target_index)?;
        let rtv = self.render_target_view(color)?;
        if rtv == self.render_targets[index] {
            return Ok(());
        }
        if let Some(id) = color {
            self.unset_texture_references(id)?;
        }
        self.render_targets[index] = rtv;
        self.color_surfaces[index] = color;
        self.rebind_render_targets();
        tracing::debug!(target_index, color = ?color, "render target slot rebound");
        Ok(())
    }

    /// Stores the depth state and binds the resolved depth-stencil object.
    /// Toggling depth writes swaps the bound DSV between its writable and
    /// read-only variants so the depth surface can stay sampled.
    pub(crate) fn update_depth_state(&mut self, desc: &DepthStateDesc) -> Result<()> {
        self.depth = *desc;
        if let Some(id) = self.depth_surface {
            let read_only = !desc.enable_depth_write;
            if read_only != self.depth_stencil_is_read_only {
                self.depth_stencil_is_read_only = read_only;
                self.depth_stencil_view =
                    depth_stencil_view(self.resources.surface(id)?, read_only);
                self.rebind_render_targets();
                tracing::debug!(read_only, "depth-stencil view swapped");
            }
        }
        self.apply_depth_stencil_state()
    }
}

#[cfg(test)]
mod tests {
    use d3drhi_core::{GraphicsDevice, RhiConfig, SurfaceDesc, SurfaceFormat};

    use super::*;
    use crate::recording::{D3D11Call, RecordingDriver};

    fn rhi() -> D3D11Rhi<RecordingDriver> {
        D3D11Rhi::new(RecordingDriver::new(), RhiConfig::default())
    }

    fn rebinds(rhi: &D3D11Rhi<RecordingDriver>) -> usize {
        rhi.driver()
            .calls()
            .iter()
            .filter(|call| matches!(call, D3D11Call::OmSetRenderTargets { .. }))
            .count()
    }

    #[test]
    fn same_target_twice_binds_once() {
        let mut rhi = rhi();
        let color = rhi
            .create_surface(&SurfaceDesc::render_target(64, 32, SurfaceFormat::Rgba8Unorm))
            .unwrap();
        rhi.set_render_target(Some(color), None).unwrap();
        rhi.set_render_target(Some(color), None).unwrap();
        assert_eq!(rebinds(&rhi), 1);
        assert_eq!(rhi.current_viewport(), Some(Viewport::full(64, 32)));
    }

    #[test]
    fn depth_write_toggle_swaps_to_read_only_view() {
        let mut rhi = rhi();
        let color = rhi
            .create_surface(&SurfaceDesc::render_target(16, 16, SurfaceFormat::Rgba8Unorm))
            .unwrap();
        let depth = rhi.create_surface(&SurfaceDesc::depth_stencil(16, 16)).unwrap();
        rhi.set_render_target(Some(color), Some(depth)).unwrap();
        let writable = rhi.depth_stencil_view;

        rhi.set_depth_state(&DepthStateDesc {
            enable_depth_write: false,
            ..DepthStateDesc::default()
        })
        .unwrap();
        assert!(rhi.depth_stencil_is_read_only);
        assert_ne!(rhi.depth_stencil_view, writable);
        assert_eq!(rebinds(&rhi), 2);

        // Same write state again does not rebind.
        rhi.set_depth_state(&DepthStateDesc {
            enable_depth_write: false,
            ..DepthStateDesc::default()
        })
        .unwrap();
        assert_eq!(rebinds(&rhi), 2);
    }

    #[test]
    fn surface_without_rtv_is_rejected() {
        let mut rhi = rhi();
        let depth = rhi.create_surface(&SurfaceDesc::depth_stencil(16, 16)).unwrap();
        assert!(matches!(
            rhi.set_render_target(Some(depth), None),
            Err(RhiError::NotRenderTarget(_))
        ));
    }
}
