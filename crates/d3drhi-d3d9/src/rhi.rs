use std::fmt;
use std::sync::Arc;

use d3drhi_core::shader_params::{
    bytes_to_registers, pad_float_array, register_span, REGISTER_SIZE, PSR_DIFFUSE_OVERRIDE,
    PSR_MIN_Z_MAX_Z_RATIO, PSR_NV_STEREO_ENABLED, PSR_SCREEN_AND_TEXEL_SIZE,
    PSR_SCREEN_POSITION_SCALE_BIAS, PSR_SPECULAR_OVERRIDE, PSR_VIEW_ORIGIN,
    VSR_PRE_VIEW_TRANSLATION, VSR_VIEW_ORIGIN, VSR_VIEW_PROJ_MATRIX,
};
use d3drhi_core::state::{
    BlendStateDesc, ColorWriteMask, DepthStateDesc, RasterizerStateDesc, StencilStateDesc,
};
use d3drhi_core::{
    Backend, BoundShaderStateDesc, BoundShaderStateId, ClearValues, GraphicsDevice, IndexBufferId,
    IndexedDraw, IndexedDrawUp, OcclusionQueryId, PrimitiveType, Result, RhiConfig, RhiError,
    RhiStats, SamplerBinding, ScissorRect, ShaderId, ShaderStage, StreamSource, SurfaceDesc,
    SurfaceId, VertexBufferId, VertexDeclarationId, VertexElement, ViewParameters, Viewport,
    MAX_VERTEX_STREAMS,
};

use crate::consts::{
    COLOR_WRITE_ENABLE_STATES, D3DRS_ADAPTIVETESS_W, D3DRS_ADAPTIVETESS_X, D3DRS_ADAPTIVETESS_Z,
    D3DRS_SCISSORTESTENABLE, D3DSAMP_MAGFILTER, D3DSAMP_MINFILTER, D3DSAMP_MIPFILTER,
    D3DTEXF_POINT, D3DVERTEXTEXTURESAMPLER0, NVDB_FOURCC,
};
use crate::draw::PendingDrawUp;
use crate::driver::{
    D3D9Driver, IndexFormat, ShaderHandle, StreamFrequency, TextureHandle, VertexBufferHandle,
};
use crate::render_state::{self, RenderStateWrite, SamplerBindParams};
use crate::resources::{check_stage, BoundShaderState, IndexBuffer, Resources, Shader, Surface};

/// A stream whose per-instance data is advanced by hand when the device has
/// no hardware instancing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingStream {
    pub(crate) buffer: VertexBufferHandle,
    pub(crate) stride: u32,
    pub(crate) offset: u32,
}

/// The D3D9 dispatcher.
///
/// D3D9 has no state objects: every descriptor is written through as raw
/// render and sampler states, and shader parameters go straight into the
/// constant register files. What is tracked here is the device-loss flag,
/// the back buffer, the texture slots that may alias a render target, and
/// the streams that need manual instance replication.
pub struct D3D9Rhi<D: D3D9Driver> {
    pub(crate) driver: D,
    pub(crate) config: RhiConfig,
    pub(crate) stats: Arc<RhiStats>,
    pub(crate) resources: Resources,

    pub(crate) back_buffer: Option<SurfaceId>,
    pub(crate) viewport: Option<Viewport>,
    pub(crate) device_lost: bool,

    pub(crate) max_active_stream: Option<u32>,
    pub(crate) pending_num_instances: u32,
    /// Bit per stream in `pending_streams` that is replicated per instance.
    pub(crate) instancing_mask: u32,
    pub(crate) pending_streams: [Option<PendingStream>; MAX_VERTEX_STREAMS as usize],

    /// Pixel and vertex sampler slots with a texture bound.
    pub(crate) bound_pixel_textures: u32,
    pub(crate) bound_vertex_textures: u32,
    pub(crate) null_pixel_shader: Option<ShaderHandle>,

    pub(crate) pending_draw_up: Option<PendingDrawUp>,
    pub(crate) draw_up_scratch: Vec<u8>,
}

impl<D: D3D9Driver> D3D9Rhi<D> {
    pub fn new(driver: D, config: RhiConfig) -> Self {
        Self {
            driver,
            config,
            stats: Arc::new(RhiStats::new()),
            resources: Resources::default(),
            back_buffer: None,
            viewport: None,
            device_lost: false,
            max_active_stream: None,
            pending_num_instances: 1,
            instancing_mask: 0,
            pending_streams: [None; MAX_VERTEX_STREAMS as usize],
            bound_pixel_textures: 0,
            bound_vertex_textures: 0,
            null_pixel_shader: None,
            pending_draw_up: None,
            draw_up_scratch: Vec::new(),
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

    /// Pixel shader bound for shader states that have none; D3D9 shader
    /// model 3 vertex shaders cannot run without one.
    pub fn set_null_pixel_shader(&mut self, shader: ShaderId) -> Result<()> {
        self.null_pixel_shader = Some(self.resources.shader(shader, ShaderStage::Pixel)?);
        Ok(())
    }

    /// The last viewport handed to the driver.
    pub fn current_viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub(crate) fn write_render_states(&mut self, writes: &[RenderStateWrite]) {
        for &(state, value) in writes {
            self.driver.set_render_state(state, value);
        }
    }

    pub(crate) fn apply_viewport(&mut self, viewport: &Viewport) {
        if viewport.is_empty() {
            tracing::warn!(?viewport, "ignoring zero-area viewport");
            return;
        }
        self.driver.set_viewport(viewport);
        self.viewport = Some(*viewport);
    }

    /// Clears every stream up to the highest one used since the last shader
    /// state change, so stale streams are never read by the new declaration.
    fn reset_vertex_streams(&mut self) {
        let Some(max) = self.max_active_stream.take() else {
            return;
        };
        for stream in 0..=max {
            self.driver.set_stream_source(stream, None, 0, 0);
            self.driver
                .set_stream_source_freq(stream, StreamFrequency::PerVertex);
        }
    }

    fn bind_shader_state(&mut self, state: &BoundShaderState) {
        self.driver.set_vertex_declaration(state.vertex_declaration);
        self.driver.set_vertex_shader(Some(state.vertex_shader));
        self.driver
            .set_pixel_shader(state.pixel_shader.or(self.null_pixel_shader));
    }

    fn texture_handle(&self, texture: Option<SurfaceId>) -> Result<Option<TextureHandle>> {
        let Some(id) = texture else {
            return Ok(None);
        };
        let surface = self.resources.surface(id)?;
        surface
            .handles
            .texture
            .map(Some)
            .ok_or(RhiError::NotShaderResource(id.0))
    }

    fn set_color_write_mask_at(&mut self, mask: ColorWriteMask, target_index: u32) -> Result<()> {
        let state = color_write_state(target_index)?;
        self.driver
            .set_render_state(state, render_state::color_write_enable(mask));
        Ok(())
    }
}

/// Bit for `slot` in a texture slot mask, or 0 past the mask width.
pub(crate) fn slot_bit(slot: u32) -> u32 {
    1u32.checked_shl(slot).unwrap_or(0)
}

fn color_write_state(target_index: u32) -> Result<u32> {
    COLOR_WRITE_ENABLE_STATES
        .get(target_index as usize)
        .copied()
        .ok_or(RhiError::RenderTargetIndexOutOfRange {
            index: target_index,
            max: COLOR_WRITE_ENABLE_STATES.len() as u32 - 1,
        })
}

impl<D: D3D9Driver> fmt::Debug for D3D9Rhi<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("D3D9Rhi")
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .field("back_buffer", &self.back_buffer)
            .field("device_lost", &self.device_lost)
            .field("pending_num_instances", &self.pending_num_instances)
            .finish_non_exhaustive()
    }
}

impl<D: D3D9Driver> GraphicsDevice for D3D9Rhi<D> {
    fn backend(&self) -> Backend {
        Backend::D3D9
    }

    fn config(&self) -> &RhiConfig {
        &self.config
    }

    fn stats(&self) -> &Arc<RhiStats> {
        &self.stats
    }

    fn create_surface(&mut self, desc: &SurfaceDesc) -> Result<SurfaceId> {
        let handles = self.driver.create_surface(desc)?;
        let id = self.resources.surfaces.insert(Surface {
            desc: *desc,
            handles,
        });
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
        let buffer = self
            .driver
            .create_index_buffer(size, IndexFormat::from_stride(stride))?;
        let id = self
            .resources
            .index_buffers
            .insert(IndexBuffer { buffer });
        Ok(IndexBufferId(id))
    }

    fn create_shader(&mut self, stage: ShaderStage, bytecode: &[u8]) -> Result<ShaderId> {
        check_stage(stage)?;
        let handle = self.driver.create_shader(stage, bytecode)?;
        Ok(ShaderId(self.resources.shaders.insert(Shader { stage, handle })))
    }

    fn create_vertex_declaration(
        &mut self,
        elements: &[VertexElement],
    ) -> Result<VertexDeclarationId> {
        let handle = self.driver.create_vertex_declaration(elements)?;
        Ok(VertexDeclarationId(
            self.resources.vertex_declarations.insert(handle),
        ))
    }

    fn create_bound_shader_state(
        &mut self,
        desc: &BoundShaderStateDesc,
    ) -> Result<BoundShaderStateId> {
        for (shader, stage) in [
            (desc.hull_shader, ShaderStage::Hull),
            (desc.domain_shader, ShaderStage::Domain),
            (desc.geometry_shader, ShaderStage::Geometry),
        ] {
            if shader.is_some() {
                check_stage(stage)?;
            }
        }
        let vertex_declaration = self
            .resources
            .vertex_declaration(desc.vertex_declaration)?;
        let vertex_shader = self
            .resources
            .shader(desc.vertex_shader, ShaderStage::Vertex)?;
        let pixel_shader = desc
            .pixel_shader
            .map(|id| self.resources.shader(id, ShaderStage::Pixel))
            .transpose()?;
        let id = self.resources.bound_shader_states.insert(BoundShaderState {
            vertex_declaration,
            vertex_shader,
            pixel_shader,
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
        let level = self.driver.test_cooperative_level();
        if !level.is_ok() && !self.device_lost {
            tracing::warn!(?level, "device lost at present");
        }
        self.device_lost = !level.is_ok();
        Ok(())
    }

    fn is_device_lost(&mut self) -> bool {
        if self.config.paranoid_device_lost_checking || self.device_lost {
            let level = self.driver.test_cooperative_level();
            if self.device_lost && level.is_ok() {
                tracing::info!("device restored");
            }
            self.device_lost = !level.is_ok();
        }
        self.device_lost
    }

    fn set_stream_source(&mut self, stream_index: u32, source: &StreamSource) -> Result<()> {
        if stream_index >= MAX_VERTEX_STREAMS {
            return Err(RhiError::StreamIndexOutOfRange {
                index: stream_index,
                max: MAX_VERTEX_STREAMS - 1,
            });
        }
        let buffer = self.resources.vertex_buffer(source.buffer)?;

        let mut stride = source.stride;
        let mut frequency = StreamFrequency::PerVertex;
        if self.config.supports_vertex_instancing {
            self.pending_num_instances = 1;
            if source.use_instance_index {
                frequency = StreamFrequency::InstanceData(1);
            } else if source.num_instances > 1 {
                frequency = StreamFrequency::IndexedData(source.num_instances);
            }
        } else {
            self.pending_num_instances = source.num_instances.max(1);
            if source.use_instance_index {
                self.pending_streams[stream_index as usize] = Some(PendingStream {
                    buffer,
                    stride: source.stride,
                    offset: source.offset,
                });
                self.instancing_mask |= 1 << stream_index;
                stride = 0;
            }
        }

        self.driver
            .set_stream_source(stream_index, Some(buffer), source.offset, stride);
        self.driver.set_stream_source_freq(stream_index, frequency);
        self.max_active_stream = Some(
            self.max_active_stream
                .map_or(stream_index, |max| max.max(stream_index)),
        );
        Ok(())
    }

    fn set_rasterizer_state(&mut self, desc: &RasterizerStateDesc) -> Result<()> {
        let writes = render_state::rasterizer_render_states(desc, self.config.depth_bias_offset);
        self.write_render_states(&writes);
        Ok(())
    }

    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        self.apply_viewport(viewport);
        Ok(())
    }

    fn set_multiple_viewports(&mut self, _viewports: &[Viewport]) -> Result<()> {
        Err(RhiError::Unsupported {
            backend: Backend::D3D9,
            what: "multiple viewports",
        })
    }

    fn set_scissor_rect(&mut self, enable: bool, rect: &ScissorRect) -> Result<()> {
        let enable = enable && !self.config.disable_scissor;
        if enable {
            self.driver.set_scissor_rect(rect);
        }
        self.driver
            .set_render_state(D3DRS_SCISSORTESTENABLE, u32::from(enable));
        Ok(())
    }

    fn set_depth_bounds_test(
        &mut self,
        enable: bool,
        clip_space_near: [f32; 4],
        clip_space_far: [f32; 4],
    ) -> Result<()> {
        if !self.config.depth_bounds_supported {
            return Ok(());
        }
        if !enable {
            self.driver.set_render_state(D3DRS_ADAPTIVETESS_X, 0);
            return Ok(());
        }
        self.driver
            .set_render_state(D3DRS_ADAPTIVETESS_X, NVDB_FOURCC);
        let (min_z, max_z) = render_state::depth_bounds_ndc(clip_space_near, clip_space_far);
        if min_z <= max_z {
            self.driver
                .set_render_state(D3DRS_ADAPTIVETESS_Z, min_z.to_bits());
            self.driver
                .set_render_state(D3DRS_ADAPTIVETESS_W, max_z.to_bits());
        }
        Ok(())
    }

    fn set_bound_shader_state(&mut self, state: BoundShaderStateId) -> Result<()> {
        let resolved = self.resources.bound_shader_state(state)?;
        self.reset_vertex_streams();
        self.bind_shader_state(&resolved);
        Ok(())
    }

    fn set_sampler_state(&mut self, stage: ShaderStage, binding: &SamplerBinding) -> Result<()> {
        let texture = self.texture_handle(binding.texture)?;
        match stage {
            ShaderStage::Pixel => {
                let slot = binding.texture_index;
                let srgb = match binding.texture {
                    Some(id) => self.resources.surface(id)?.desc.format.is_srgb(),
                    None => false,
                };
                self.driver.set_texture(slot, texture);
                let writes = render_state::sampler_states(
                    &binding.state,
                    &SamplerBindParams {
                        mip_bias: binding.mip_bias,
                        largest_mip: binding.largest_mip,
                        force_linear_min_filter: binding.force_linear_min_filter,
                        srgb,
                    },
                );
                for (state, value) in writes {
                    self.driver.set_sampler_state(slot, state, value);
                }
                if texture.is_some() {
                    self.bound_pixel_textures |= slot_bit(slot);
                } else {
                    self.bound_pixel_textures &= !slot_bit(slot);
                }
            }
            ShaderStage::Vertex => {
                let slot = binding.sampler_index;
                let sampler = D3DVERTEXTEXTURESAMPLER0 + slot;
                self.driver.set_texture(sampler, texture);
                for state in [D3DSAMP_MINFILTER, D3DSAMP_MAGFILTER, D3DSAMP_MIPFILTER] {
                    self.driver
                        .set_sampler_state(sampler, state, D3DTEXF_POINT);
                }
                if texture.is_some() {
                    self.bound_vertex_textures |= slot_bit(slot);
                } else {
                    self.bound_vertex_textures &= !slot_bit(slot);
                }
            }
            stage => {
                return Err(RhiError::UnsupportedShaderStage {
                    backend: Backend::D3D9,
                    stage,
                })
            }
        }
        Ok(())
    }

    fn set_shader_parameter(
        &mut self,
        stage: ShaderStage,
        _buffer_index: u32,
        base_index: u32,
        value: &[u8],
    ) -> Result<()> {
        check_stage(stage)?;
        let (start_register, _) = register_span(base_index, value.len());
        let registers = bytes_to_registers(value);
        if stage == ShaderStage::Vertex {
            self.driver
                .set_vertex_shader_constant_f(start_register, &registers);
        } else {
            self.driver
                .set_pixel_shader_constant_f(start_register, &registers);
        }
        Ok(())
    }

    fn set_shader_bool_parameter(
        &mut self,
        stage: ShaderStage,
        _buffer_index: u32,
        base_index: u32,
        value: bool,
    ) -> Result<()> {
        check_stage(stage)?;
        let register = base_index / REGISTER_SIZE;
        if stage == ShaderStage::Vertex {
            self.driver.set_vertex_shader_constant_b(register, &[value]);
        } else {
            self.driver.set_pixel_shader_constant_b(register, &[value]);
        }
        Ok(())
    }

    fn set_vertex_shader_float_array(
        &mut self,
        _buffer_index: u32,
        base_index: u32,
        values: &[f32],
    ) -> Result<()> {
        for group in pad_float_array(base_index, values) {
            self.driver.set_vertex_shader_constant_f(
                group.base_index / REGISTER_SIZE,
                &bytes_to_registers(&group.bytes),
            );
        }
        Ok(())
    }

    fn set_view_parameters(&mut self, view: &ViewParameters) -> Result<()> {
        self.driver
            .set_vertex_shader_constant_f(VSR_VIEW_PROJ_MATRIX, &view.view_projection);
        self.driver
            .set_vertex_shader_constant_f(VSR_VIEW_ORIGIN, &[view.translated_view_origin()]);
        self.driver.set_vertex_shader_constant_f(
            VSR_PRE_VIEW_TRANSLATION,
            &[view.pre_view_translation4()],
        );
        for (register, value) in [
            (PSR_MIN_Z_MAX_Z_RATIO, view.min_z_max_z_ratio),
            (PSR_SCREEN_POSITION_SCALE_BIAS, view.screen_position_scale_bias),
            (PSR_NV_STEREO_ENABLED, view.stereo_register()),
            (PSR_DIFFUSE_OVERRIDE, view.diffuse_override),
            (PSR_SPECULAR_OVERRIDE, view.specular_override),
            (PSR_VIEW_ORIGIN, view.view_origin),
            (PSR_SCREEN_AND_TEXEL_SIZE, view.screen_and_texel_size()),
        ] {
            self.driver.set_pixel_shader_constant_f(register, &[value]);
        }
        Ok(())
    }

    fn set_depth_state(&mut self, desc: &DepthStateDesc) -> Result<()> {
        self.write_render_states(&render_state::depth_render_states(desc));
        Ok(())
    }

    fn set_stencil_state(&mut self, desc: &StencilStateDesc) -> Result<()> {
        self.write_render_states(&render_state::stencil_render_states(desc));
        Ok(())
    }

    fn set_blend_state(&mut self, desc: &BlendStateDesc) -> Result<()> {
        self.write_render_states(&render_state::blend_render_states(desc));
        Ok(())
    }

    fn set_mrt_blend_state(&mut self, _desc: &BlendStateDesc, _target_index: u32) -> Result<()> {
        Err(RhiError::Unsupported {
            backend: Backend::D3D9,
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
        if !self.device_lost {
            self.driver.begin_query(query);
        }
        Ok(())
    }

    fn end_occlusion_query(&mut self, query: OcclusionQueryId) -> Result<()> {
        let query = self.resources.occlusion_query(query)?;
        if !self.device_lost {
            self.driver.end_query(query);
        }
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
        self.clear_targets(values);
        Ok(())
    }

    fn dispatch_compute_shader(
        &mut self,
        _shader: ShaderId,
        _thread_groups: [u32; 3],
    ) -> Result<()> {
        Err(RhiError::Unsupported {
            backend: Backend::D3D9,
            what: "compute shaders",
        })
    }
}
