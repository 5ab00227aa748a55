//! The native D3D9 seam.
//!
//! One method per `IDirect3DDevice9` call the dispatcher makes. Render and
//! sampler states are passed as raw `D3DRS_*` / `D3DSAMP_*` pairs (see
//! [`crate::consts`]); objects are opaque handles handed out by the driver.

use std::fmt;

use bitflags::bitflags;
use d3drhi_core::{
    PrimitiveTopology, Result, ScissorRect, ShaderStage, SurfaceDesc, VertexElement, Viewport,
};

use crate::consts::{D3DSTREAMSOURCE_INDEXEDDATA, D3DSTREAMSOURCE_INSTANCEDATA};

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
    /// `IDirect3DSurface9`, the renderable face of a surface.
    SurfaceHandle;
    /// `IDirect3DTexture9` backing a sampleable surface.
    TextureHandle;
    VertexBufferHandle;
    IndexBufferHandle;
    /// `IDirect3DVertexShader9` or `IDirect3DPixelShader9`.
    ShaderHandle;
    VertexDeclarationHandle;
    QueryHandle;
}

/// Native objects created for one RHI surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceHandles {
    pub surface: SurfaceHandle,
    /// Present when the surface was created with shader-resource usage.
    pub texture: Option<TextureHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    Index16,
    Index32,
}

impl IndexFormat {
    pub fn from_stride(stride: u32) -> Self {
        if stride == 2 {
            IndexFormat::Index16
        } else {
            IndexFormat::Index32
        }
    }
}

/// `SetStreamSourceFreq` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamFrequency {
    /// Plain per-vertex data (`1`).
    PerVertex,
    /// Geometry stream repeated for `n` instances.
    IndexedData(u32),
    /// Instance stream advancing every `n` instances.
    InstanceData(u32),
}

impl StreamFrequency {
    pub fn to_raw(self) -> u32 {
        match self {
            StreamFrequency::PerVertex => 1,
            StreamFrequency::IndexedData(n) => D3DSTREAMSOURCE_INDEXEDDATA | n,
            StreamFrequency::InstanceData(n) => D3DSTREAMSOURCE_INSTANCEDATA | n,
        }
    }
}

bitflags! {
    /// `D3DCLEAR_*` flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const TARGET = 0x1;
        const ZBUFFER = 0x2;
        const STENCIL = 0x4;
    }
}

/// Result of `TestCooperativeLevel`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CooperativeLevel {
    #[default]
    Ok,
    /// `D3DERR_DEVICELOST`: rendering is impossible until the device is
    /// reset.
    DeviceLost,
    /// `D3DERR_DEVICENOTRESET`: the device can be reset now.
    DeviceNotReset,
}

impl CooperativeLevel {
    pub fn is_ok(self) -> bool {
        self == CooperativeLevel::Ok
    }
}

pub trait D3D9Driver {
    fn create_surface(&mut self, desc: &SurfaceDesc) -> Result<SurfaceHandles>;

    fn create_vertex_buffer(&mut self, size: u32) -> Result<VertexBufferHandle>;

    fn create_index_buffer(&mut self, size: u32, format: IndexFormat)
        -> Result<IndexBufferHandle>;

    /// Only vertex and pixel shaders exist on D3D9; the dispatcher never asks
    /// for another stage.
    fn create_shader(&mut self, stage: ShaderStage, bytecode: &[u8]) -> Result<ShaderHandle>;

    fn create_vertex_declaration(
        &mut self,
        elements: &[VertexElement],
    ) -> Result<VertexDeclarationHandle>;

    fn create_occlusion_query(&mut self) -> Result<QueryHandle>;

    fn test_cooperative_level(&mut self) -> CooperativeLevel;

    fn set_render_state(&mut self, state: u32, value: u32);

    fn set_sampler_state(&mut self, sampler: u32, state: u32, value: u32);

    fn set_texture(&mut self, sampler: u32, texture: Option<TextureHandle>);

    fn set_stream_source(
        &mut self,
        stream: u32,
        buffer: Option<VertexBufferHandle>,
        offset: u32,
        stride: u32,
    );

    fn set_stream_source_freq(&mut self, stream: u32, frequency: StreamFrequency);

    fn set_indices(&mut self, buffer: IndexBufferHandle);

    fn set_vertex_declaration(&mut self, declaration: VertexDeclarationHandle);

    fn set_vertex_shader(&mut self, shader: Option<ShaderHandle>);

    fn set_pixel_shader(&mut self, shader: Option<ShaderHandle>);

    fn set_vertex_shader_constant_f(&mut self, start_register: u32, data: &[[f32; 4]]);

    fn set_pixel_shader_constant_f(&mut self, start_register: u32, data: &[[f32; 4]]);

    fn set_vertex_shader_constant_b(&mut self, start_register: u32, data: &[bool]);

    fn set_pixel_shader_constant_b(&mut self, start_register: u32, data: &[bool]);

    fn set_render_target(&mut self, index: u32, surface: Option<SurfaceHandle>);

    fn set_depth_stencil_surface(&mut self, surface: Option<SurfaceHandle>);

    fn set_viewport(&mut self, viewport: &Viewport);

    fn set_scissor_rect(&mut self, rect: &ScissorRect);

    /// Clears the whole bound target set; `color` is a packed `D3DCOLOR`.
    fn clear(&mut self, flags: ClearFlags, color: u32, depth: f32, stencil: u32);

    fn draw_primitive(&mut self, topology: PrimitiveTopology, start_vertex: u32, count: u32);

    fn draw_indexed_primitive(
        &mut self,
        topology: PrimitiveTopology,
        base_vertex_index: i32,
        min_index: u32,
        num_vertices: u32,
        start_index: u32,
        count: u32,
    );

    fn draw_primitive_up(
        &mut self,
        topology: PrimitiveTopology,
        count: u32,
        vertex_data: &[u8],
        vertex_stride: u32,
    );

    #[allow(clippy::too_many_arguments)]
    fn draw_indexed_primitive_up(
        &mut self,
        topology: PrimitiveTopology,
        min_vertex_index: u32,
        num_vertices: u32,
        count: u32,
        index_data: &[u8],
        index_format: IndexFormat,
        vertex_data: &[u8],
        vertex_stride: u32,
    );

    /// `Issue(D3DISSUE_BEGIN)`.
    fn begin_query(&mut self, query: QueryHandle);

    /// `Issue(D3DISSUE_END)`.
    fn end_query(&mut self, query: QueryHandle);
}
