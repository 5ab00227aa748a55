//! The native D3D11 seam.
//!
//! One method per `ID3D11Device` / `ID3D11DeviceContext` call the dispatcher
//! makes. Native objects are represented by opaque handles the driver hands
//! out; a production binding maps them to its COM pointers.

use std::fmt;

use d3drhi_core::constant_buffer::ConstantBufferDevice;
use d3drhi_core::dynamic_ring::DynamicBufferDevice;
use d3drhi_core::state::{SamplerStateDesc, MAX_SIMULTANEOUS_RENDER_TARGETS};
use d3drhi_core::state_cache::{BlendKey, DepthStencilKey, RasterizerKey};
use d3drhi_core::{
    PrimitiveTopology, Result, ScissorRect, ShaderStage, SurfaceDesc, VertexElement, Viewport,
};

macro_rules! native_handle {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name(pub u64);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}#{}", stringify!($name), self.0)
                }
            }
        )*
    };
}

native_handle! {
    /// `ID3D11Buffer` (vertex, index, constant or dynamic).
    BufferHandle;
    /// `ID3D11RenderTargetView`.
    RtvHandle;
    /// `ID3D11DepthStencilView`, writable or read-only.
    DsvHandle;
    /// `ID3D11ShaderResourceView`.
    SrvHandle;
    /// Any of the six shader object kinds.
    ShaderHandle;
    InputLayoutHandle;
    QueryHandle;
    RasterizerStateHandle;
    DepthStencilStateHandle;
    BlendStateHandle;
    SamplerStateHandle;
}

/// Views created alongside a texture. Absent views mean the texture was not
/// created with the matching bind flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceViews {
    pub render_target: Option<RtvHandle>,
    pub depth_stencil: Option<DsvHandle>,
    /// Depth-stencil view with read-only depth and stencil flags.
    pub read_only_depth_stencil: Option<DsvHandle>,
    pub shader_resource: Option<SrvHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    R16Uint,
    R32Uint,
}

impl IndexFormat {
    /// 16-bit indices for a 2 byte stride, 32-bit otherwise.
    pub fn from_stride(stride: u32) -> Self {
        if stride == 2 {
            IndexFormat::R16Uint
        } else {
            IndexFormat::R32Uint
        }
    }
}

/// Every colour slot plus the depth view, as `OMSetRenderTargets` takes them.
pub type RenderTargetViews = [Option<RtvHandle>; MAX_SIMULTANEOUS_RENDER_TARGETS];

pub trait D3D11Driver:
    ConstantBufferDevice<Buffer = BufferHandle> + DynamicBufferDevice<Buffer = BufferHandle>
{
    fn create_surface(&mut self, desc: &SurfaceDesc) -> Result<SurfaceViews>;

    fn create_vertex_buffer(&mut self, size: u32) -> Result<BufferHandle>;

    fn create_index_buffer(&mut self, size: u32) -> Result<BufferHandle>;

    fn create_shader(&mut self, stage: ShaderStage, bytecode: &[u8]) -> Result<ShaderHandle>;

    /// Input layout validated against the vertex shader's input signature.
    fn create_input_layout(
        &mut self,
        elements: &[VertexElement],
        vertex_shader: ShaderHandle,
    ) -> Result<InputLayoutHandle>;

    fn create_occlusion_query(&mut self) -> Result<QueryHandle>;

    fn create_rasterizer_state(&mut self, key: &RasterizerKey) -> Result<RasterizerStateHandle>;

    fn create_depth_stencil_state(
        &mut self,
        key: &DepthStencilKey,
    ) -> Result<DepthStencilStateHandle>;

    fn create_blend_state(&mut self, key: &BlendKey) -> Result<BlendStateHandle>;

    fn create_sampler_state(&mut self, desc: &SamplerStateDesc) -> Result<SamplerStateHandle>;

    fn ia_set_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: Option<BufferHandle>,
        stride: u32,
        offset: u32,
    );

    fn ia_set_index_buffer(&mut self, buffer: BufferHandle, format: IndexFormat, offset: u32);

    fn ia_set_primitive_topology(&mut self, topology: PrimitiveTopology);

    fn ia_set_input_layout(&mut self, layout: Option<InputLayoutHandle>);

    /// `VSSetShader`, `HSSetShader`, ... for `stage`.
    fn set_shader(&mut self, stage: ShaderStage, shader: Option<ShaderHandle>);

    fn set_constant_buffer(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        buffer: Option<BufferHandle>,
    );

    fn set_shader_resource(&mut self, stage: ShaderStage, slot: u32, view: Option<SrvHandle>);

    fn set_sampler(&mut self, stage: ShaderStage, slot: u32, sampler: SamplerStateHandle);

    fn rs_set_state(&mut self, state: RasterizerStateHandle);

    fn rs_set_viewports(&mut self, viewports: &[Viewport]);

    fn rs_set_scissor_rects(&mut self, rects: &[ScissorRect]);

    fn om_set_depth_stencil_state(&mut self, state: DepthStencilStateHandle, stencil_ref: u32);

    fn om_set_blend_state(
        &mut self,
        state: BlendStateHandle,
        blend_factor: [f32; 4],
        sample_mask: u32,
    );

    fn om_set_render_targets(
        &mut self,
        colors: &RenderTargetViews,
        depth_stencil: Option<DsvHandle>,
    );

    fn clear_render_target_view(&mut self, view: RtvHandle, color: [f32; 4]);

    /// Clears depth and/or stencil; `None` leaves that aspect untouched.
    fn clear_depth_stencil_view(
        &mut self,
        view: DsvHandle,
        depth: Option<f32>,
        stencil: Option<u8>,
    );

    fn draw(&mut self, vertex_count: u32, start_vertex: u32);

    fn draw_instanced(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    );

    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32);

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    );

    fn dispatch(&mut self, thread_groups: [u32; 3]);

    fn begin_query(&mut self, query: QueryHandle);

    fn end_query(&mut self, query: QueryHandle);
}
