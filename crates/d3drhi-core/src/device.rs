//! The RHI verb set and the value types that travel through it.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::config::RhiConfig;
use crate::error::Result;
use crate::shader_params::ViewParameters;
use crate::state::{
    BlendStateDesc, ColorWriteMask, DepthStateDesc, LinearColor, RasterizerStateDesc,
    SamplerStateDesc, StencilStateDesc,
};
use crate::stats::RhiStats;
use crate::topology::PrimitiveType;

/// Maximum number of vertex streams a bound shader state may read.
pub const MAX_VERTEX_STREAMS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    D3D9,
    D3D11,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::D3D9 => "d3d9",
            Backend::D3D11 => "d3d11",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
    Compute,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 6] = [
        ShaderStage::Vertex,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Geometry,
        ShaderStage::Pixel,
        ShaderStage::Compute,
    ];

    pub const fn index(self) -> usize {
        match self {
            Self::Vertex => 0,
            Self::Hull => 1,
            Self::Domain => 2,
            Self::Geometry => 3,
            Self::Pixel => 4,
            Self::Compute => 5,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Hull => "hull",
            ShaderStage::Domain => "domain",
            ShaderStage::Geometry => "geometry",
            ShaderStage::Pixel => "pixel",
            ShaderStage::Compute => "compute",
        })
    }
}

macro_rules! resource_id {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

resource_id! {
    /// A render target, depth-stencil target or sampled texture.
    SurfaceId;
    VertexBufferId;
    IndexBufferId;
    ShaderId;
    VertexDeclarationId;
    BoundShaderStateId;
    OcclusionQueryId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba16Float,
    R32Float,
    Depth24Stencil8,
    Depth32Float,
}

impl SurfaceFormat {
    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth24Stencil8 | Self::Depth32Float)
    }

    pub fn is_srgb(self) -> bool {
        self == Self::Rgba8UnormSrgb
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SurfaceUsage: u32 {
        const RENDER_TARGET = 1 << 0;
        const DEPTH_STENCIL = 1 << 1;
        const SHADER_RESOURCE = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceDesc {
    pub width: u32,
    pub height: u32,
    pub format: SurfaceFormat,
    pub sample_count: u32,
    pub usage: SurfaceUsage,
}

impl SurfaceDesc {
    pub fn render_target(width: u32, height: u32, format: SurfaceFormat) -> Self {
        Self {
            width,
            height,
            format,
            sample_count: 1,
            usage: SurfaceUsage::RENDER_TARGET | SurfaceUsage::SHADER_RESOURCE,
        }
    }

    pub fn depth_stencil(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: SurfaceFormat::Depth24Stencil8,
            sample_count: 1,
            usage: SurfaceUsage::DEPTH_STENCIL | SurfaceUsage::SHADER_RESOURCE,
        }
    }

    pub fn with_samples(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }

    pub fn is_multisample(&self) -> bool {
        self.sample_count > 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexElementFormat {
    Float1,
    Float2,
    Float3,
    Float4,
    Half2,
    Half4,
    Short2,
    UByte4,
    UByte4N,
    Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexUsage {
    Position,
    Normal,
    Tangent,
    Binormal,
    Color,
    TexCoord,
    BlendIndices,
    BlendWeight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexElement {
    pub stream: u8,
    pub offset: u16,
    pub format: VertexElementFormat,
    pub usage: VertexUsage,
    pub usage_index: u8,
    /// Per-instance data (D3D11 input layouts only).
    pub per_instance: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundShaderStateDesc {
    pub vertex_declaration: VertexDeclarationId,
    pub vertex_shader: ShaderId,
    pub pixel_shader: Option<ShaderId>,
    pub hull_shader: Option<ShaderId>,
    pub domain_shader: Option<ShaderId>,
    pub geometry_shader: Option<ShaderId>,
}

impl BoundShaderStateDesc {
    pub fn new(
        vertex_declaration: VertexDeclarationId,
        vertex_shader: ShaderId,
        pixel_shader: Option<ShaderId>,
    ) -> Self {
        Self {
            vertex_declaration,
            vertex_shader,
            pixel_shader,
            hull_shader: None,
            domain_shader: None,
            geometry_shader: None,
        }
    }

    /// Hull and domain shaders are both present.
    pub fn uses_tessellation(&self) -> bool {
        self.hull_shader.is_some() && self.domain_shader.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub min_x: u32,
    pub min_y: u32,
    pub min_z: f32,
    pub max_x: u32,
    pub max_y: u32,
    pub max_z: f32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            min_x: 0,
            min_y: 0,
            min_z: 0.0,
            max_x: width,
            max_y: height,
            max_z: 1.0,
        }
    }

    pub fn width(&self) -> u32 {
        self.max_x.saturating_sub(self.min_x)
    }

    pub fn height(&self) -> u32 {
        self.max_y.saturating_sub(self.min_y)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScissorRect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamSource {
    pub buffer: VertexBufferId,
    pub stride: u32,
    pub offset: u32,
    /// The stream is indexed by instance rather than by vertex.
    pub use_instance_index: bool,
    pub vertices_per_instance: u32,
    pub num_instances: u32,
}

impl StreamSource {
    pub fn per_vertex(buffer: VertexBufferId, stride: u32) -> Self {
        Self {
            buffer,
            stride,
            offset: 0,
            use_instance_index: false,
            vertices_per_instance: 0,
            num_instances: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerBinding {
    pub texture_index: u32,
    /// Separate sampler slot; only D3D11 distinguishes it from the texture slot.
    pub sampler_index: u32,
    pub state: SamplerStateDesc,
    pub texture: Option<SurfaceId>,
    pub mip_bias: f32,
    /// Largest mip level to sample, negative for the default.
    pub largest_mip: f32,
    pub force_linear_min_filter: bool,
}

impl SamplerBinding {
    pub fn new(slot: u32, state: SamplerStateDesc, texture: Option<SurfaceId>) -> Self {
        Self {
            texture_index: slot,
            sampler_index: slot,
            state,
            texture,
            mip_bias: 0.0,
            largest_mip: -1.0,
            force_linear_min_filter: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedDraw {
    pub index_buffer: IndexBufferId,
    pub primitive: PrimitiveType,
    pub base_vertex_index: i32,
    pub min_index: u32,
    pub num_vertices: u32,
    pub start_index: u32,
    pub num_primitives: u32,
}

/// Shape of an indexed user-pointer draw; the index count follows from the
/// primitive type and count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedDrawUp {
    pub primitive: PrimitiveType,
    pub min_vertex_index: u32,
    pub num_vertices: u32,
    pub num_primitives: u32,
    pub index_stride: u32,
    pub vertex_stride: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClearValues {
    pub color: Option<LinearColor>,
    pub depth: Option<f32>,
    pub stencil: Option<u32>,
}

impl ClearValues {
    pub fn color(color: LinearColor) -> Self {
        Self {
            color: Some(color),
            ..Self::default()
        }
    }

    pub fn depth_stencil(depth: f32, stencil: u32) -> Self {
        Self {
            color: None,
            depth: Some(depth),
            stencil: Some(stencil),
        }
    }

    pub fn clears_depth_or_stencil(&self) -> bool {
        self.depth.is_some() || self.stencil.is_some()
    }
}

/// The RHI verb set. One call per engine-level RHI operation; implementations
/// track state and issue the minimal set of native driver calls.
pub trait GraphicsDevice {
    fn backend(&self) -> Backend;

    fn config(&self) -> &RhiConfig;

    fn stats(&self) -> &Arc<RhiStats>;

    fn create_surface(&mut self, desc: &SurfaceDesc) -> Result<SurfaceId>;

    fn create_vertex_buffer(&mut self, size: u32) -> Result<VertexBufferId>;

    /// `stride` must be 2 or 4.
    fn create_index_buffer(&mut self, stride: u32, size: u32) -> Result<IndexBufferId>;

    fn create_shader(&mut self, stage: ShaderStage, bytecode: &[u8]) -> Result<ShaderId>;

    fn create_vertex_declaration(&mut self, elements: &[VertexElement])
        -> Result<VertexDeclarationId>;

    fn create_bound_shader_state(&mut self, desc: &BoundShaderStateDesc)
        -> Result<BoundShaderStateId>;

    fn create_occlusion_query(&mut self) -> Result<OcclusionQueryId>;

    /// Makes `back_buffer` the surface that a null colour target resolves to
    /// and whose size full-target viewports use.
    fn begin_drawing_viewport(&mut self, back_buffer: SurfaceId) -> Result<()>;

    fn end_drawing_viewport(&mut self) -> Result<()>;

    fn is_device_lost(&mut self) -> bool;

    fn set_stream_source(&mut self, stream_index: u32, source: &StreamSource) -> Result<()>;

    fn set_rasterizer_state(&mut self, desc: &RasterizerStateDesc) -> Result<()>;

    /// Zero-area viewports are dropped.
    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()>;

    fn set_multiple_viewports(&mut self, viewports: &[Viewport]) -> Result<()>;

    fn set_scissor_rect(&mut self, enable: bool, rect: &ScissorRect) -> Result<()>;

    fn set_depth_bounds_test(
        &mut self,
        enable: bool,
        clip_space_near: [f32; 4],
        clip_space_far: [f32; 4],
    ) -> Result<()>;

    fn set_bound_shader_state(&mut self, state: BoundShaderStateId) -> Result<()>;

    fn set_sampler_state(&mut self, stage: ShaderStage, binding: &SamplerBinding) -> Result<()>;

    fn set_shader_parameter(
        &mut self,
        stage: ShaderStage,
        buffer_index: u32,
        base_index: u32,
        value: &[u8],
    ) -> Result<()>;

    fn set_shader_bool_parameter(
        &mut self,
        stage: ShaderStage,
        buffer_index: u32,
        base_index: u32,
        value: bool,
    ) -> Result<()>;

    /// Pads every float out to a float4 register.
    fn set_vertex_shader_float_array(
        &mut self,
        buffer_index: u32,
        base_index: u32,
        values: &[f32],
    ) -> Result<()>;

    fn set_view_parameters(&mut self, view: &ViewParameters) -> Result<()>;

    fn set_depth_state(&mut self, desc: &DepthStateDesc) -> Result<()>;

    fn set_stencil_state(&mut self, desc: &StencilStateDesc) -> Result<()>;

    fn set_blend_state(&mut self, desc: &BlendStateDesc) -> Result<()>;

    fn set_mrt_blend_state(&mut self, desc: &BlendStateDesc, target_index: u32) -> Result<()>;

    fn set_render_target(
        &mut self,
        color: Option<SurfaceId>,
        depth_stencil: Option<SurfaceId>,
    ) -> Result<()>;

    fn set_mrt_render_target(&mut self, color: Option<SurfaceId>, target_index: u32)
        -> Result<()>;

    fn set_color_write_enable(&mut self, enable: bool) -> Result<()>;

    fn set_mrt_color_write_enable(&mut self, enable: bool, target_index: u32) -> Result<()>;

    fn set_color_write_mask(&mut self, mask: ColorWriteMask) -> Result<()>;

    fn set_mrt_color_write_mask(&mut self, mask: ColorWriteMask, target_index: u32)
        -> Result<()>;

    fn begin_occlusion_query(&mut self, query: OcclusionQueryId) -> Result<()>;

    fn end_occlusion_query(&mut self, query: OcclusionQueryId) -> Result<()>;

    fn draw_primitive(
        &mut self,
        primitive: PrimitiveType,
        base_vertex_index: u32,
        num_primitives: u32,
    ) -> Result<()>;

    fn draw_indexed_primitive(&mut self, draw: &IndexedDraw) -> Result<()>;

    /// Returns scratch memory for `num_vertices * vertex_stride` bytes of
    /// vertex data, submitted by [`GraphicsDevice::end_draw_primitive_up`].
    fn begin_draw_primitive_up(
        &mut self,
        primitive: PrimitiveType,
        num_primitives: u32,
        num_vertices: u32,
        vertex_stride: u32,
    ) -> Result<&mut [u8]>;

    fn end_draw_primitive_up(&mut self) -> Result<()>;

    fn draw_primitive_up(
        &mut self,
        primitive: PrimitiveType,
        num_primitives: u32,
        vertex_data: &[u8],
        vertex_stride: u32,
    ) -> Result<()>;

    /// Returns `(vertex_data, index_data)` scratch memory.
    fn begin_draw_indexed_primitive_up(
        &mut self,
        draw: &IndexedDrawUp,
    ) -> Result<(&mut [u8], &mut [u8])>;

    fn end_draw_indexed_primitive_up(&mut self) -> Result<()>;

    fn draw_indexed_primitive_up(
        &mut self,
        draw: &IndexedDrawUp,
        index_data: &[u8],
        vertex_data: &[u8],
    ) -> Result<()>;

    fn clear(&mut self, values: &ClearValues) -> Result<()>;

    fn dispatch_compute_shader(&mut self, shader: ShaderId, thread_groups: [u32; 3])
        -> Result<()>;
}
