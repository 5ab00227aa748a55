//! A [`D3D9Driver`] that hands out sequential handles and logs every call.

use d3drhi_core::{
    PrimitiveTopology, Result, RhiError, ScissorRect, ShaderStage, SurfaceDesc, SurfaceUsage,
    VertexElement, Viewport,
};

use crate::driver::{
    ClearFlags, CooperativeLevel, D3D9Driver, IndexBufferHandle, IndexFormat, QueryHandle,
    ShaderHandle, StreamFrequency, SurfaceHandle, SurfaceHandles, TextureHandle,
    VertexBufferHandle, VertexDeclarationHandle,
};

#[derive(Debug, Clone, PartialEq)]
pub enum D3D9Call {
    CreateSurface(SurfaceDesc),
    CreateVertexBuffer { size: u32 },
    CreateIndexBuffer { size: u32, format: IndexFormat },
    CreateShader { stage: ShaderStage, len: usize },
    CreateVertexDeclaration { elements: usize },
    CreateOcclusionQuery,
    TestCooperativeLevel,
    SetRenderState { state: u32, value: u32 },
    SetSamplerState { sampler: u32, state: u32, value: u32 },
    SetTexture { sampler: u32, texture: Option<TextureHandle> },
    SetStreamSource {
        stream: u32,
        buffer: Option<VertexBufferHandle>,
        offset: u32,
        stride: u32,
    },
    SetStreamSourceFreq { stream: u32, frequency: StreamFrequency },
    SetIndices(IndexBufferHandle),
    SetVertexDeclaration(VertexDeclarationHandle),
    SetVertexShader(Option<ShaderHandle>),
    SetPixelShader(Option<ShaderHandle>),
    SetVertexShaderConstantF { start_register: u32, data: Vec<[f32; 4]> },
    SetPixelShaderConstantF { start_register: u32, data: Vec<[f32; 4]> },
    SetVertexShaderConstantB { start_register: u32, data: Vec<bool> },
    SetPixelShaderConstantB { start_register: u32, data: Vec<bool> },
    SetRenderTarget { index: u32, surface: Option<SurfaceHandle> },
    SetDepthStencilSurface(Option<SurfaceHandle>),
    SetViewport(Viewport),
    SetScissorRect(ScissorRect),
    Clear { flags: ClearFlags, color: u32, depth: f32, stencil: u32 },
    DrawPrimitive { topology: PrimitiveTopology, start_vertex: u32, count: u32 },
    DrawIndexedPrimitive {
        topology: PrimitiveTopology,
        base_vertex_index: i32,
        min_index: u32,
        num_vertices: u32,
        start_index: u32,
        count: u32,
    },
    DrawPrimitiveUp {
        topology: PrimitiveTopology,
        count: u32,
        vertex_data: Vec<u8>,
        vertex_stride: u32,
    },
    DrawIndexedPrimitiveUp {
        topology: PrimitiveTopology,
        min_vertex_index: u32,
        num_vertices: u32,
        count: u32,
        index_data: Vec<u8>,
        index_format: IndexFormat,
        vertex_data: Vec<u8>,
        vertex_stride: u32,
    },
    BeginQuery(QueryHandle),
    EndQuery(QueryHandle),
}

impl D3D9Call {
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            D3D9Call::DrawPrimitive { .. }
                | D3D9Call::DrawIndexedPrimitive { .. }
                | D3D9Call::DrawPrimitiveUp { .. }
                | D3D9Call::DrawIndexedPrimitiveUp { .. }
        )
    }
}

#[derive(Debug, Default)]
pub struct RecordingDriver {
    calls: Vec<D3D9Call>,
    next_handle: u64,
    fail_next: Option<&'static str>,
    cooperative_level: CooperativeLevel,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[D3D9Call] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<D3D9Call> {
        std::mem::take(&mut self.calls)
    }

    /// The next creation call named `call` returns a driver error.
    pub fn fail_next(&mut self, call: &'static str) {
        self.fail_next = Some(call);
    }

    /// What `TestCooperativeLevel` reports from now on.
    pub fn set_cooperative_level(&mut self, level: CooperativeLevel) {
        self.cooperative_level = level;
    }

    /// Value of the last `SetRenderState` for `state`.
    pub fn render_state(&self, state: u32) -> Option<u32> {
        self.calls.iter().rev().find_map(|call| match call {
            D3D9Call::SetRenderState { state: s, value } if *s == state => Some(*value),
            _ => None,
        })
    }

    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn create(&mut self, call: &'static str, record: D3D9Call) -> Result<u64> {
        if self.fail_next == Some(call) {
            self.fail_next = None;
            return Err(RhiError::driver(call, "D3DERR_OUTOFVIDEOMEMORY"));
        }
        self.calls.push(record);
        Ok(self.handle())
    }
}

impl D3D9Driver for RecordingDriver {
    fn create_surface(&mut self, desc: &SurfaceDesc) -> Result<SurfaceHandles> {
        let surface = self.create("CreateTexture", D3D9Call::CreateSurface(*desc))?;
        let texture = desc
            .usage
            .contains(SurfaceUsage::SHADER_RESOURCE)
            .then(|| TextureHandle(self.handle()));
        Ok(SurfaceHandles {
            surface: SurfaceHandle(surface),
            texture,
        })
    }

    fn create_vertex_buffer(&mut self, size: u32) -> Result<VertexBufferHandle> {
        self.create("CreateVertexBuffer", D3D9Call::CreateVertexBuffer { size })
            .map(VertexBufferHandle)
    }

    fn create_index_buffer(
        &mut self,
        size: u32,
        format: IndexFormat,
    ) -> Result<IndexBufferHandle> {
        self.create("CreateIndexBuffer", D3D9Call::CreateIndexBuffer { size, format })
            .map(IndexBufferHandle)
    }

    fn create_shader(&mut self, stage: ShaderStage, bytecode: &[u8]) -> Result<ShaderHandle> {
        let call = if stage == ShaderStage::Vertex {
            "CreateVertexShader"
        } else {
            "CreatePixelShader"
        };
        self.create(
            call,
            D3D9Call::CreateShader {
                stage,
                len: bytecode.len(),
            },
        )
        .map(ShaderHandle)
    }

    fn create_vertex_declaration(
        &mut self,
        elements: &[VertexElement],
    ) -> Result<VertexDeclarationHandle> {
        self.create(
            "CreateVertexDeclaration",
            D3D9Call::CreateVertexDeclaration {
                elements: elements.len(),
            },
        )
        .map(VertexDeclarationHandle)
    }

    fn create_occlusion_query(&mut self) -> Result<QueryHandle> {
        self.create("CreateQuery", D3D9Call::CreateOcclusionQuery)
            .map(QueryHandle)
    }

    fn test_cooperative_level(&mut self) -> CooperativeLevel {
        self.calls.push(D3D9Call::TestCooperativeLevel);
        self.cooperative_level
    }

    fn set_render_state(&mut self, state: u32, value: u32) {
        self.calls.push(D3D9Call::SetRenderState { state, value });
    }

    fn set_sampler_state(&mut self, sampler: u32, state: u32, value: u32) {
        self.calls.push(D3D9Call::SetSamplerState {
            sampler,
            state,
            value,
        });
    }

    fn set_texture(&mut self, sampler: u32, texture: Option<TextureHandle>) {
        self.calls.push(D3D9Call::SetTexture { sampler, texture });
    }

    fn set_stream_source(
        &mut self,
        stream: u32,
        buffer: Option<VertexBufferHandle>,
        offset: u32,
        stride: u32,
    ) {
        self.calls.push(D3D9Call::SetStreamSource {
            stream,
            buffer,
            offset,
            stride,
        });
    }

    fn set_stream_source_freq(&mut self, stream: u32, frequency: StreamFrequency) {
        self.calls
            .push(D3D9Call::SetStreamSourceFreq { stream, frequency });
    }

    fn set_indices(&mut self, buffer: IndexBufferHandle) {
        self.calls.push(D3D9Call::SetIndices(buffer));
    }

    fn set_vertex_declaration(&mut self, declaration: VertexDeclarationHandle) {
        self.calls.push(D3D9Call::SetVertexDeclaration(declaration));
    }

    fn set_vertex_shader(&mut self, shader: Option<ShaderHandle>) {
        self.calls.push(D3D9Call::SetVertexShader(shader));
    }

    fn set_pixel_shader(&mut self, shader: Option<ShaderHandle>) {
        self.calls.push(D3D9Call::SetPixelShader(shader));
    }

    fn set_vertex_shader_constant_f(&mut self, start_register: u32, data: &[[f32; 4]]) {
        self.calls.push(D3D9Call::SetVertexShaderConstantF {
            start_register,
            data: data.to_vec(),
        });
    }

    fn set_pixel_shader_constant_f(&mut self, start_register: u32, data: &[[f32; 4]]) {
        self.calls.push(D3D9Call::SetPixelShaderConstantF {
            start_register,
            data: data.to_vec(),
        });
    }

    fn set_vertex_shader_constant_b(&mut self, start_register: u32, data: &[bool]) {
        self.calls.push(D3D9Call::SetVertexShaderConstantB {
            start_register,
            data: data.to_vec(),
        });
    }

    fn set_pixel_shader_constant_b(&mut self, start_register: u32, data: &[bool]) {
        self.calls.push(D3D9Call::SetPixelShaderConstantB {
            start_register,
            data: data.to_vec(),
        });
    }

    fn set_render_target(&mut self, index: u32, surface: Option<SurfaceHandle>) {
        self.calls.push(D3D9Call::SetRenderTarget { index, surface });
    }

    fn set_depth_stencil_surface(&mut self, surface: Option<SurfaceHandle>) {
        self.calls.push(D3D9Call::SetDepthStencilSurface(surface));
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        self.calls.push(D3D9Call::SetViewport(*viewport));
    }

    fn set_scissor_rect(&mut self, rect: &ScissorRect) {
        self.calls.push(D3D9Call::SetScissorRect(*rect));
    }

    fn clear(&mut self, flags: ClearFlags, color: u32, depth: f32, stencil: u32) {
        self.calls.push(D3D9Call::Clear {
            flags,
            color,
            depth,
            stencil,
        });
    }

    fn draw_primitive(&mut self, topology: PrimitiveTopology, start_vertex: u32, count: u32) {
        self.calls.push(D3D9Call::DrawPrimitive {
            topology,
            start_vertex,
            count,
        });
    }

    fn draw_indexed_primitive(
        &mut self,
        topology: PrimitiveTopology,
        base_vertex_index: i32,
        min_index: u32,
        num_vertices: u32,
        start_index: u32,
        count: u32,
    ) {
        self.calls.push(D3D9Call::DrawIndexedPrimitive {
            topology,
            base_vertex_index,
            min_index,
            num_vertices,
            start_index,
            count,
        });
    }

    fn draw_primitive_up(
        &mut self,
        topology: PrimitiveTopology,
        count: u32,
        vertex_data: &[u8],
        vertex_stride: u32,
    ) {
        self.calls.push(D3D9Call::DrawPrimitiveUp {
            topology,
            count,
            vertex_data: vertex_data.to_vec(),
            vertex_stride,
        });
    }

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
    ) {
        self.calls.push(D3D9Call::DrawIndexedPrimitiveUp {
            topology,
            min_vertex_index,
            num_vertices,
            count,
            index_data: index_data.to_vec(),
            index_format,
            vertex_data: vertex_data.to_vec(),
            vertex_stride,
        });
    }

    fn begin_query(&mut self, query: QueryHandle) {
        self.calls.push(D3D9Call::BeginQuery(query));
    }

    fn end_query(&mut self, query: QueryHandle) {
        self.calls.push(D3D9Call::EndQuery(query));
    }
}
