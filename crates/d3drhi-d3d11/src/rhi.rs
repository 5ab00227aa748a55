use std::fmt;
use std::sync::Arc;

use d3drhi_core::constant_buffer::ConstantBufferSet;
use d3drhi_core::dynamic_ring::DynamicBufferRing;
use d3drhi_core::shader_params::{bool_constant, pad_float_array, VIEW_CONSTANT_BUFFER_INDEX};
use d3drhi_core::state::{
    BlendStateDesc, ColorWriteMask, DepthStateDesc, RasterizerStateDesc, SamplerStateDesc,
    StencilStateDesc, MAX_SIMULTANEOUS_RENDER_TARGETS,
};
use d3drhi_core::state_cache::{BlendKey, DepthStencilKey, RasterizerKey, StateCache};
use d3drhi_core::{
    Backend, BoundShaderStateDesc, BoundShaderStateId, ClearValues, GraphicsDevice, IndexBufferId,
    IndexedDraw, IndexedDrawUp, OcclusionQueryId, PrimitiveType, Result, RhiConfig, RhiError,
    RhiStats, SamplerBinding, ScissorRect, ShaderId, ShaderStage, StreamSource, SurfaceDesc,
    SurfaceId, VertexBufferId, VertexDeclarationId, VertexElement, ViewParameters, Viewport,
    MAX_VERTEX_STREAMS,
};

use crate::draw::PendingDrawUp;
use crate::driver::{
    BlendStateHandle, BufferHandle, D3D11Driver, DepthStencilStateHandle, DsvHandle,
    RasterizerStateHandle, RenderTargetViews, SamplerStateHandle,
};
use crate::resources::{BoundShaderState, IndexBuffer, Resources, Shader, Surface};

/// `OMSetBlendState` sample mask enabling every sample.
pub(crate) const SAMPLE_MASK_ALL: u32 = 0xFFFF_FFFF;

/// The D3D11 dispatcher.
///
/// Owns the driver, the state object caches, the constant buffer shadows and
/// the dynamic vertex/index ring, and tracks the currently bound pipeline so
/// redundant native calls can be skipped.
pub struct D3D11Rhi<D: D3D11Driver> {
    pub(crate) driver: D,
    pub(crate) config: RhiConfig,
    pub(crate) stats: Arc<RhiStats>,
    pub(crate) resources: Resources,

    pub(crate) rasterizer_states: StateCache<RasterizerKey, RasterizerStateHandle>,
    pub(crate) depth_stencil_states: StateCache<DepthStencilKey, DepthStencilStateHandle>,
    pub(crate) blend_states: StateCache<BlendKey, BlendStateHandle>,
    pub(crate) sampler_states: StateCache<SamplerStateDesc, SamplerStateHandle>,
    pub(crate) constant_buffers: ConstantBufferSet<BufferHandle>,
    pub(crate) dynamic_buffers: DynamicBufferRing<BufferHandle>,

    pub(crate) rasterizer: RasterizerStateDesc,
    pub(crate) depth: DepthStateDesc,
    pub(crate) stencil: StencilStateDesc,
    pub(crate) blend: BlendStateDesc,
    pub(crate) color_write_masks: [ColorWriteMask; MAX_SIMULTANEOUS_RENDER_TARGETS],
    pub(crate) scissor_enable: bool,
    pub(crate) render_target_is_multisample: bool,
    pub(crate) using_tessellation: bool,
    pub(crate) bound_shader_state: Option<BoundShaderStateId>,

    pub(crate) render_targets: RenderTargetViews,
    pub(crate) color_surfaces: [Option<SurfaceId>; MAX_SIMULTANEOUS_RENDER_TARGETS],
    pub(crate) depth_surface: Option<SurfaceId>,
    pub(crate) depth_stencil_view: Option<DsvHandle>,
    pub(crate) depth_stencil_is_read_only: bool,
    pub(crate) back_buffer: Option<SurfaceId>,
    pub(crate) viewport: Option<Viewport>,

    pub(crate) pending_num_instances: u32,
    pub(crate) pending_draw_up: Option<PendingDrawUp>,
    pub(crate) draw_up_scratch: Vec<u8>,
    pub(crate) clear_shader_state: Option<BoundShaderStateId>,
}

impl<D: D3D11Driver> D3D11Rhi<D> {
    pub fn new(driver: D, config: RhiConfig) -> Self {
        let stats = Arc::new(RhiStats::new());
        Self {
            driver,
            resources: Resources::default(),
            rasterizer_states: StateCache::new("rasterizer").with_stats(stats.clone()),
            depth_stencil_states: StateCache::new("depth_stencil").with_stats(stats.clone()),
            blend_states: StateCache::new("blend").with_stats(stats.clone()),
            sampler_states: StateCache::new("sampler").with_stats(stats.clone()),
            constant_buffers: ConstantBufferSet::new(config.constant_buffer_size)
                .with_stats(stats.clone()),
            dynamic_buffers: DynamicBufferRing::new(
                config.user_data_buffer_size,
                config.num_user_data_buffers,
            )
            .with_stats(stats.clone()),
            rasterizer: RasterizerStateDesc::default(),
            depth: DepthStateDesc::default(),
            stencil: StencilStateDesc::default(),
            blend: BlendStateDesc::default(),
            color_write_masks: [ColorWriteMask::RGBA; MAX_SIMULTANEOUS_RENDER_TARGETS],
            scissor_enable: false,
            render_target_is_multisample: false,
            using_tessellation: false,
            bound_shader_state: None,
            render_targets: [None; MAX_SIMULTANEOUS_RENDER_TARGETS],
            color_surfaces: [None; MAX_SIMULTANEOUS_RENDER_TARGETS],
            depth_surface: None,
            depth_stencil_view: None,
            depth_stencil_is_read_only: false,
            back_buffer: None,
            viewport: None,
            pending_num_instances: 1,
            pending_draw_up: None,
            draw_up_scratch: Vec::new(),
            clear_shader_state: None,
            config,
            stats,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Shader pair (with a float4 position declaration) used by draw-based
    /// clears. The pixel shader reads the clear colour from constant buffer
    /// slot 0.
    pub fn set_clear_shaders(&mut self, state: BoundShaderStateId) -> Result<()> {
        self.resources.bound_shader_state(state)?;
        self.clear_shader_state = Some(state);
        Ok(())
    }

    /// The last viewport handed to the driver.
    pub fn current_viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub(crate) fn rasterizer_state(&mut self, key: RasterizerKey) -> Result<RasterizerStateHandle> {
        let driver = &mut self.driver;
        self.rasterizer_states
            .get_or_create(key, |key| driver.create_rasterizer_state(key))
    }

    pub(crate) fn depth_stencil_state(
        &mut self,
        key: DepthStencilKey,
    ) -> Result<DepthStencilStateHandle> {
        let driver = &mut self.driver;
        self.depth_stencil_states
            .get_or_create(key, |key| driver.create_depth_stencil_state(key))
    }

    pub(crate) fn blend_state(&mut self, key: BlendKey) -> Result<BlendStateHandle> {
        let driver = &mut self.driver;
        self.blend_states
            .get_or_create(key, |key| driver.create_blend_state(key))
    }

    /// Re-resolves the rasterizer object from the current descriptor and
    /// context flags and binds it.
    pub(crate) fn apply_rasterizer_state(&mut self) -> Result<()> {
        let handle = self.rasterizer_state(RasterizerKey {
            desc: self.rasterizer,
            scissor_enable: self.scissor_enable,
            multisample_enable: self.render_target_is_multisample,
        })?;
        self.driver.rs_set_state(handle);
        Ok(())
    }

    pub(crate) fn apply_depth_stencil_state(&mut self) -> Result<()> {
        let handle = self.depth_stencil_state(DepthStencilKey::new(self.depth, self.stencil))?;
        self.driver
            .om_set_depth_stencil_state(handle, self.stencil.stencil_ref);
        Ok(())
    }

    pub(crate) fn apply_blend_state(&mut self) -> Result<()> {
        let handle = self.blend_state(BlendKey {
            desc: self.blend,
            color_write_masks: self.color_write_masks,
        })?;
        self.driver.om_set_blend_state(
            handle,
            self.blend.constant_color.to_array(),
            SAMPLE_MASK_ALL,
        );
        Ok(())
    }

    pub(crate) fn apply_viewport(&mut self, viewport: &Viewport) {
        if viewport.is_empty() {
            tracing::warn!(?viewport, "ignoring zero-area viewport");
            return;
        }
        self.driver.rs_set_viewports(std::slice::from_ref(viewport));
        self.viewport = Some(*viewport);
    }

    /// Binds the input layout and all five graphics stages of `state`.
    pub(crate) fn bind_shader_state(&mut self, state: &BoundShaderState) {
        self.driver.ia_set_input_layout(Some(state.input_layout));
        self.driver
            .set_shader(ShaderStage::Vertex, Some(state.vertex_shader));
        self.driver.set_shader(ShaderStage::Pixel, state.pixel_shader);
        self.driver.set_shader(ShaderStage::Hull, state.hull_shader);
        self.driver.set_shader(ShaderStage::Domain, state.domain_shader);
        self.driver
            .set_shader(ShaderStage::Geometry, state.geometry_shader);
        self.using_tessellation = state.uses_tessellation();
        self.constant_buffers.mark_discard_shared_constants();
    }

    fn set_color_write_mask_at(&mut self, mask: ColorWriteMask, target_index: u32) -> Result<()> {
        let index = render_target_slot(target_index)?;
        self.color_write_masks[index] = mask;
        self.apply_blend_state()
    }
}

/// Validates an MRT index.
pub(crate) fn render_target_slot(index: u32) -> Result<usize> {
    if (index as usize) < MAX_SIMULTANEOUS_RENDER_TARGETS {
        Ok(index as usize)
    } else {
        Err(RhiError::RenderTargetIndexOutOfRange {
            index,
            max: MAX_SIMULTANEOUS_RENDER_TARGETS as u32 - 1,
        })
    }
}

impl<D: D3D11Driver> fmt::Debug for D3D11Rhi<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("D3D11Rhi")
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .field("render_targets", &self.render_targets)
            .field("depth_stencil_view", &self.depth_stencil_view)
            .field("using_tessellation", &self.using_tessellation)
            .finish_non_exhaustive()
    }
}

impl<D: D3D11Driver> GraphicsDevice for D3D11Rhi<D> {
    fn backend(&self) -> Backend {
        Backend::D3D11
    }

    fn config(&self) -> &RhiConfig {
        &self.config
    }

    fn stats(&self) -> &Arc<RhiStats> {
        &self.stats
    }

    fn create_surface(&mut self, desc: &SurfaceDesc) -> Result<SurfaceId> {
        let views = self.driver.create_surface(desc)?;
        let id = self.resources.surfaces.insert(Surface::new(*desc, views));
        Ok(SurfaceId(id))
    }

    fn create_vertex_buffer(&mut self, size: u32) -> Result<VertexBufferId> {
        let buffer = self.driver.create_vertex_buffer(size)?;
        Ok(VertexBufferId(self.resources.vertex_buffers.insert(buffer)))
    }

    fn create_index_buffer(&mut self, stride: u32, size: u32) -> Result<IndexBufferId> {
        if !matches!(stride, 2 | 4) {
            return Err(RhiError::InvalidIndexStride(stride));
        }
        let buffer = self.driver.create_index_buffer(size)?;
        let id = self
            .resources
            .index_buffers
            .insert(IndexBuffer { buffer, stride });
        Ok(IndexBufferId(id))
    }

    fn create_shader(&mut self, stage: ShaderStage, bytecode: &[u8]) -> Result<ShaderId> {
        let handle = self.driver.create_shader(stage, bytecode)?;
        Ok(ShaderId(self.resources.shaders.insert(Shader { stage, handle })))
    }

    fn create_vertex_declaration(
        &mut self,
        elements: &[VertexElement],
    ) -> Result<VertexDeclarationId> {
        // The input layout needs a vertex shader signature; it is created
        // with the bound shader state.
        let id = self.resources.vertex_declarations.insert(elements.to_vec());
        Ok(VertexDeclarationId(id))
    }

    fn create_bound_shader_state(
        &mut self,
        desc: &BoundShaderStateDesc,
    ) -> Result<BoundShaderStateId> {
        let vertex_shader = self
            .resources
            .shader(desc.vertex_shader, ShaderStage::Vertex)?;
        let pixel_shader = self
            .resources
            .optional_shader(desc.pixel_shader, ShaderStage::Pixel)?;
        let hull_shader = self
            .resources
            .optional_shader(desc.hull_shader, ShaderStage::Hull)?;
        let domain_shader = self
            .resources
            .optional_shader(desc.domain_shader, ShaderStage::Domain)?;
        let geometry_shader = self
            .resources
            .optional_shader(desc.geometry_shader, ShaderStage::Geometry)?;
        let elements = self.resources.vertex_declaration(desc.vertex_declaration)?;
        let input_layout = self.driver.create_input_layout(elements, vertex_shader)?;

        let id = self.resources.bound_shader_states.insert(BoundShaderState {
            input_layout,
            vertex_shader,
            pixel_shader,
            hull_shader,
            domain_shader,
            geometry_shader,
        });
        Ok(BoundShaderStateId(id))
    }

    fn create_occlusion_query(&mut self) -> Result<OcclusionQueryId> {
        let query = self.driver.create_occlusion_query()?;
        Ok(OcclusionQueryId(self.resources.occlusion_queries.insert(query)))
    }

    fn begin_drawing_viewport(&mut self, back_buffer: SurfaceId) -> Result<()> {
        self.resources.surface(back_buffer)?;
        self.back_buffer = Some(back_buffer);
        self.bind_render_target(Some(back_buffer), None)
    }

    fn end_drawing_viewport(&mut self) -> Result<()> {
        self.back_buffer = None;
        Ok(())
    }

    fn is_device_lost(&mut self) -> bool {
        false
    }

    fn set_stream_source(&mut self, stream_index: u32, source: &StreamSource) -> Result<()> {
        if stream_index >= MAX_VERTEX_STREAMS {
            return Err(RhiError::StreamIndexOutOfRange {
                index: stream_index,
                max: MAX_VERTEX_STREAMS - 1,
            });
        }
        let buffer = self.resources.vertex_buffer(source.buffer)?;
        self.driver
            .ia_set_vertex_buffer(stream_index, Some(buffer), source.stride, source.offset);
        self.pending_num_instances = source.num_instances;
        Ok(())
    }

    fn set_rasterizer_state(&mut self, desc: &RasterizerStateDesc) -> Result<()> {
        self.rasterizer = *desc;
        self.apply_rasterizer_state()
    }

    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        self.apply_viewport(viewport);
        Ok(())
    }

    fn set_multiple_viewports(&mut self, viewports: &[Viewport]) -> Result<()> {
        let Some(first) = viewports.first() else {
            return Ok(());
        };
        self.driver.rs_set_viewports(viewports);
        self.viewport = Some(*first);
        Ok(())
    }

    fn set_scissor_rect(&mut self, enable: bool, rect: &ScissorRect) -> Result<()> {
        let enable = enable && !self.config.disable_scissor;
        if enable {
            self.driver.rs_set_scissor_rects(std::slice::from_ref(rect));
        }
        self.scissor_enable = enable;
        self.apply_rasterizer_state()
    }

    fn set_depth_bounds_test(
        &mut self,
        _enable: bool,
        _clip_space_near: [f32; 4],
        _clip_space_far: [f32; 4],
    ) -> Result<()> {
        Ok(())
    }

    fn set_bound_shader_state(&mut self, state: BoundShaderStateId) -> Result<()> {
        let resolved = self.resources.bound_shader_state(state)?;
        self.bind_shader_state(&resolved);
        self.bound_shader_state = Some(state);
        Ok(())
    }

    fn set_sampler_state(&mut self, stage: ShaderStage, binding: &SamplerBinding) -> Result<()> {
        let view = match binding.texture {
            Some(id) => Some(
                self.resources
                    .surface(id)?
                    .views
                    .shader_resource
                    .ok_or(RhiError::NotShaderResource(id.0))?,
            ),
            None => None,
        };
        self.driver
            .set_shader_resource(stage, binding.texture_index, view);

        let driver = &mut self.driver;
        let sampler = self
            .sampler_states
            .get_or_create(binding.state, |desc| driver.create_sampler_state(desc))?;
        self.driver.set_sampler(stage, binding.sampler_index, sampler);

        if let Some(id) = binding.texture {
            let surface = self.resources.surface_mut(id)?;
            if surface.is_target() {
                surface.record_srv_slot(stage, binding.texture_index);
            }
        }
        Ok(())
    }

    fn set_shader_parameter(
        &mut self,
        stage: ShaderStage,
        buffer_index: u32,
        base_index: u32,
        value: &[u8],
    ) -> Result<()> {
        self.constant_buffers
            .update_constant(&mut self.driver, stage, buffer_index, base_index, value)
    }

    fn set_shader_bool_parameter(
        &mut self,
        stage: ShaderStage,
        buffer_index: u32,
        base_index: u32,
        value: bool,
    ) -> Result<()> {
        self.set_shader_parameter(stage, buffer_index, base_index, &bool_constant(value))
    }

    fn set_vertex_shader_float_array(
        &mut self,
        buffer_index: u32,
        base_index: u32,
        values: &[f32],
    ) -> Result<()> {
        for group in pad_float_array(base_index, values) {
            self.constant_buffers.update_constant(
                &mut self.driver,
                ShaderStage::Vertex,
                buffer_index,
                group.base_index,
                &group.bytes,
            )?;
        }
        Ok(())
    }

    fn set_view_parameters(&mut self, view: &ViewParameters) -> Result<()> {
        let slot = VIEW_CONSTANT_BUFFER_INDEX;
        let vertex = view.vertex_constants();
        let pixel = view.pixel_constants();
        let hull = view.hull_constants();
        let domain = view.domain_constants();
        for (stage, bytes) in [
            (ShaderStage::Vertex, bytemuck::bytes_of(&vertex)),
            (ShaderStage::Pixel, bytemuck::bytes_of(&pixel)),
            (ShaderStage::Hull, bytemuck::bytes_of(&hull)),
            (ShaderStage::Domain, bytemuck::bytes_of(&domain)),
        ] {
            self.constant_buffers
                .update_constant(&mut self.driver, stage, slot, 0, bytes)?;
        }
        Ok(())
    }

    fn set_depth_state(&mut self, desc: &DepthStateDesc) -> Result<()> {
        self.update_depth_state(desc)
    }

    fn set_stencil_state(&mut self, desc: &StencilStateDesc) -> Result<()> {
        self.stencil = *desc;
        self.apply_depth_stencil_state()
    }

    fn set_blend_state(&mut self, desc: &BlendStateDesc) -> Result<()> {
        self.blend = *desc;
        self.apply_blend_state()
    }

    fn set_mrt_blend_state(&mut self, _desc: &BlendStateDesc, _target_index: u32) -> Result<()> {
        Err(RhiError::Unsupported {
            backend: Backend::D3D11,
            what: "per-target blend state",
        })
    }

    fn set_render_target(
        &mut self,
        color: Option<SurfaceId>,
        depth_stencil: Option<SurfaceId>,
    ) -> Result<()> {
        self.bind_render_target(color, depth_stencil)
    }

    fn set_mrt_render_target(
        &mut self,
        color: Option<SurfaceId>,
        target_index: u32,
    ) -> Result<()> {
        self.bind_mrt_render_target(color, target_index)
    }

    fn set_color_write_enable(&mut self, enable: bool) -> Result<()> {
        self.set_color_write_mask_at(ColorWriteMask::from_enable(enable), 0)
    }

    fn set_mrt_color_write_enable(&mut self, enable: bool, target_index: u32) -> Result<()> {
        self.set_color_write_mask_at(ColorWriteMask::from_enable(enable), target_index)
    }

    fn set_color_write_mask(&mut self, mask: ColorWriteMask) -> Result<()> {
        self.set_color_write_mask_at(mask, 0)
    }

    fn set_mrt_color_write_mask(&mut self, mask: ColorWriteMask, target_index: u32) -> Result<()> {
        self.set_color_write_mask_at(mask, target_index)
    }

    fn begin_occlusion_query(&mut self, query: OcclusionQueryId) -> Result<()> {
        let query = self.resources.occlusion_query(query)?;
        self.driver.begin_query(query);
        Ok(())
    }

    fn end_occlusion_query(&mut self, query: OcclusionQueryId) -> Result<()> {
        let query = self.resources.occlusion_query(query)?;
        self.driver.end_query(query);
        Ok(())
    }

    fn draw_primitive(
        &mut self,
        primitive: PrimitiveType,
        base_vertex_index: u32,
        num_primitives: u32,
    ) -> Result<()> {
        self.submit_draw(primitive, base_vertex_index, num_primitives)
    }

    fn draw_indexed_primitive(&mut self, draw: &IndexedDraw) -> Result<()> {
        self.submit_indexed_draw(draw)
    }

    fn begin_draw_primitive_up(
        &mut self,
        primitive: PrimitiveType,
        num_primitives: u32,
        num_vertices: u32,
        vertex_stride: u32,
    ) -> Result<&mut [u8]> {
        self.begin_draw_up(primitive, num_primitives, num_vertices, vertex_stride)
    }

    fn end_draw_primitive_up(&mut self) -> Result<()> {
        self.end_draw_up()
    }

    fn draw_primitive_up(
        &mut self,
        primitive: PrimitiveType,
        num_primitives: u32,
        vertex_data: &[u8],
        vertex_stride: u32,
    ) -> Result<()> {
        self.submit_draw_up(primitive, num_primitives, vertex_data, vertex_stride)
    }

    fn begin_draw_indexed_primitive_up(
        &mut self,
        draw: &IndexedDrawUp,
    ) -> Result<(&mut [u8], &mut [u8])> {
        self.begin_indexed_draw_up(draw)
    }

    fn end_draw_indexed_primitive_up(&mut self) -> Result<()> {
        self.end_indexed_draw_up()
    }

    fn draw_indexed_primitive_up(
        &mut self,
        draw: &IndexedDrawUp,
        index_data: &[u8],
        vertex_data: &[u8],
    ) -> Result<()> {
        self.submit_indexed_draw_up(draw, index_data, vertex_data)
    }

    fn clear(&mut self, values: &ClearValues) -> Result<()> {
        self.clear_targets(values)
    }

    fn dispatch_compute_shader(
        &mut self,
        shader: ShaderId,
        thread_groups: [u32; 3],
    ) -> Result<()> {
        self.dispatch_compute(shader, thread_groups)
    }
}
