//! A [`D3D11Driver`] that hands out sequential handles and logs every call.
//!
//! Used by the test suites to assert on the exact native call stream a verb
//! sequence produces.

use d3drhi_core::constant_buffer::ConstantBufferDevice;
use d3drhi_core::dynamic_ring::{BufferBinding, DynamicBufferDevice, MapMode};
use d3drhi_core::state::SamplerStateDesc;
use d3drhi_core::state_cache::{BlendKey, DepthStencilKey, RasterizerKey};
use d3drhi_core::{
    PrimitiveTopology, Result, RhiError, ScissorRect, ShaderStage, SurfaceDesc, SurfaceUsage,
    VertexElement, Viewport,
};

use crate::driver::{
    BlendStateHandle, BufferHandle, D3D11Driver, DepthStencilStateHandle, DsvHandle, IndexFormat,
    InputLayoutHandle, QueryHandle, RasterizerStateHandle, RenderTargetViews, RtvHandle,
    SamplerStateHandle, ShaderHandle, SrvHandle, SurfaceViews,
};

#[derive(Debug, Clone, PartialEq)]
pub enum D3D11Call {
    CreateSurface(SurfaceDesc),
    CreateVertexBuffer { size: u32 },
    CreateIndexBuffer { size: u32 },
    CreateConstantBuffer { size: u32 },
    CreateDynamicBuffer { binding: BufferBinding, byte_width: u32 },
    CreateShader { stage: ShaderStage, len: usize },
    CreateInputLayout { elements: usize, vertex_shader: ShaderHandle },
    CreateOcclusionQuery,
    CreateRasterizerState(RasterizerKey),
    CreateDepthStencilState(DepthStencilKey),
    CreateBlendState(BlendKey),
    CreateSamplerState(SamplerStateDesc),
    UpdateConstantBuffer { buffer: BufferHandle, offset: u32, data: Vec<u8> },
    WriteDynamicBuffer { buffer: BufferHandle, mode: MapMode, offset: u32, data: Vec<u8> },
    IaSetVertexBuffer { slot: u32, buffer: Option<BufferHandle>, stride: u32, offset: u32 },
    IaSetIndexBuffer { buffer: BufferHandle, format: IndexFormat, offset: u32 },
    IaSetPrimitiveTopology(PrimitiveTopology),
    IaSetInputLayout(Option<InputLayoutHandle>),
    SetShader { stage: ShaderStage, shader: Option<ShaderHandle> },
    SetConstantBuffer { stage: ShaderStage, slot: u32, buffer: Option<BufferHandle> },
    SetShaderResource { stage: ShaderStage, slot: u32, view: Option<SrvHandle> },
    SetSampler { stage: ShaderStage, slot: u32, sampler: SamplerStateHandle },
    RsSetState(RasterizerStateHandle),
    RsSetViewports(Vec<Viewport>),
    RsSetScissorRects(Vec<ScissorRect>),
    OmSetDepthStencilState { state: DepthStencilStateHandle, stencil_ref: u32 },
    OmSetBlendState { state: BlendStateHandle, blend_factor: [f32; 4], sample_mask: u32 },
    OmSetRenderTargets { colors: RenderTargetViews, depth_stencil: Option<DsvHandle> },
    ClearRenderTargetView { view: RtvHandle, color: [f32; 4] },
    ClearDepthStencilView { view: DsvHandle, depth: Option<f32>, stencil: Option<u8> },
    Draw { vertex_count: u32, start_vertex: u32 },
    DrawInstanced {
        vertex_count: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    },
    DrawIndexed { index_count: u32, start_index: u32, base_vertex: i32 },
    DrawIndexedInstanced {
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    },
    Dispatch([u32; 3]),
    BeginQuery(QueryHandle),
    EndQuery(QueryHandle),
}

impl D3D11Call {
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            D3D11Call::Draw { .. }
                | D3D11Call::DrawInstanced { .. }
                | D3D11Call::DrawIndexed { .. }
                | D3D11Call::DrawIndexedInstanced { .. }
        )
    }

    pub fn is_create(&self) -> bool {
        matches!(
            self,
            D3D11Call::CreateSurface(_)
                | D3D11Call::CreateVertexBuffer { .. }
                | D3D11Call::CreateIndexBuffer { .. }
                | D3D11Call::CreateConstantBuffer { .. }
                | D3D11Call::CreateDynamicBuffer { .. }
                | D3D11Call::CreateShader { .. }
                | D3D11Call::CreateInputLayout { .. }
                | D3D11Call::CreateOcclusionQuery
                | D3D11Call::CreateRasterizerState(_)
                | D3D11Call::CreateDepthStencilState(_)
                | D3D11Call::CreateBlendState(_)
                | D3D11Call::CreateSamplerState(_)
        )
    }
}

#[derive(Debug, Default)]
pub struct RecordingDriver {
    calls: Vec<D3D11Call>,
    next_handle: u64,
    /// Name of a creation call that should fail the next time it runs.
    fail_next: Option<&'static str>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[D3D11Call] {
        &self.calls
    }

    /// Drains the log.
    pub fn take_calls(&mut self) -> Vec<D3D11Call> {
        std::mem::take(&mut self.calls)
    }

    /// The next creation call named `call` returns a driver error.
    pub fn fail_next(&mut self, call: &'static str) {
        self.fail_next = Some(call);
    }

    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn create(&mut self, call: &'static str, record: D3D11Call) -> Result<u64> {
        if self.fail_next == Some(call) {
            self.fail_next = None;
            return Err(RhiError::driver(call, "E_OUTOFMEMORY"));
        }
        self.calls.push(record);
        Ok(self.handle())
    }
}

impl ConstantBufferDevice for RecordingDriver {
    type Buffer = BufferHandle;

    fn create_constant_buffer(&mut self, size: u32) -> Result<BufferHandle> {
        self.create("CreateBuffer", D3D11Call::CreateConstantBuffer { size })
            .map(BufferHandle)
    }

    fn update_constant_buffer(
        &mut self,
        buffer: &BufferHandle,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.calls.push(D3D11Call::UpdateConstantBuffer {
            buffer: *buffer,
            offset,
            data: data.to_vec(),
        });
        Ok(())
    }
}

impl DynamicBufferDevice for RecordingDriver {
    type Buffer = BufferHandle;

    fn create_dynamic_buffer(
        &mut self,
        binding: BufferBinding,
        byte_width: u32,
    ) -> Result<BufferHandle> {
        self.create(
            "CreateBuffer",
            D3D11Call::CreateDynamicBuffer {
                binding,
                byte_width,
            },
        )
        .map(BufferHandle)
    }

    fn write_dynamic_buffer(
        &mut self,
        buffer: &BufferHandle,
        mode: MapMode,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.calls.push(D3D11Call::WriteDynamicBuffer {
            buffer: *buffer,
            mode,
            offset,
            data: data.to_vec(),
        });
        Ok(())
    }
}

impl D3D11Driver for RecordingDriver {
    fn create_surface(&mut self, desc: &SurfaceDesc) -> Result<SurfaceViews> {
        self.create("CreateTexture2D", D3D11Call::CreateSurface(*desc))?;
        let mut views = SurfaceViews::default();
        if desc.usage.contains(SurfaceUsage::RENDER_TARGET) {
            views.render_target = Some(RtvHandle(self.handle()));
        }
        if desc.usage.contains(SurfaceUsage::DEPTH_STENCIL) {
            views.depth_stencil = Some(DsvHandle(self.handle()));
            views.read_only_depth_stencil = Some(DsvHandle(self.handle()));
        }
        if desc.usage.contains(SurfaceUsage::SHADER_RESOURCE) {
            views.shader_resource = Some(SrvHandle(self.handle()));
        }
        Ok(views)
    }

    fn create_vertex_buffer(&mut self, size: u32) -> Result<BufferHandle> {
        self.create("CreateBuffer", D3D11Call::CreateVertexBuffer { size })
            .map(BufferHandle)
    }

    fn create_index_buffer(&mut self, size: u32) -> Result<BufferHandle> {
        self.create("CreateBuffer", D3D11Call::CreateIndexBuffer { size })
            .map(BufferHandle)
    }

    fn create_shader(&mut self, stage: ShaderStage, bytecode: &[u8]) -> Result<ShaderHandle> {
        self.create(
            "CreateShader",
            D3D11Call::CreateShader {
                stage,
                len: bytecode.len(),
            },
        )
        .map(ShaderHandle)
    }

    fn create_input_layout(
        &mut self,
        elements: &[VertexElement],
        vertex_shader: ShaderHandle,
    ) -> Result<InputLayoutHandle> {
        self.create(
            "CreateInputLayout",
            D3D11Call::CreateInputLayout {
                elements: elements.len(),
                vertex_shader,
            },
        )
        .map(InputLayoutHandle)
    }

    fn create_occlusion_query(&mut self) -> Result<QueryHandle> {
        self.create("CreateQuery", D3D11Call::CreateOcclusionQuery)
            .map(QueryHandle)
    }

    fn create_rasterizer_state(&mut self, key: &RasterizerKey) -> Result<RasterizerStateHandle> {
        self.create("CreateRasterizerState", D3D11Call::CreateRasterizerState(*key))
            .map(RasterizerStateHandle)
    }

    fn create_depth_stencil_state(
        &mut self,
        key: &DepthStencilKey,
    ) -> Result<DepthStencilStateHandle> {
        self.create("CreateDepthStencilState", D3D11Call::CreateDepthStencilState(*key))
            .map(DepthStencilStateHandle)
    }

    fn create_blend_state(&mut self, key: &BlendKey) -> Result<BlendStateHandle> {
        self.create("CreateBlendState", D3D11Call::CreateBlendState(*key))
            .map(BlendStateHandle)
    }

    fn create_sampler_state(&mut self, desc: &SamplerStateDesc) -> Result<SamplerStateHandle> {
        self.create("CreateSamplerState", D3D11Call::CreateSamplerState(*desc))
            .map(SamplerStateHandle)
    }

    fn ia_set_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: Option<BufferHandle>,
        stride: u32,
        offset: u32,
    ) {
        self.calls.push(D3D11Call::IaSetVertexBuffer {
            slot,
            buffer,
            stride,
            offset,
        });
    }

    fn ia_set_index_buffer(&mut self, buffer: BufferHandle, format: IndexFormat, offset: u32) {
        self.calls.push(D3D11Call::IaSetIndexBuffer {
            buffer,
            format,
            offset,
        });
    }

    fn ia_set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.calls.push(D3D11Call::IaSetPrimitiveTopology(topology));
    }

    fn ia_set_input_layout(&mut self, layout: Option<InputLayoutHandle>) {
        self.calls.push(D3D11Call::IaSetInputLayout(layout));
    }

    fn set_shader(&mut self, stage: ShaderStage, shader: Option<ShaderHandle>) {
        self.calls.push(D3D11Call::SetShader { stage, shader });
    }

    fn set_constant_buffer(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        buffer: Option<BufferHandle>,
    ) {
        self.calls.push(D3D11Call::SetConstantBuffer {
            stage,
            slot,
            buffer,
        });
    }

    fn set_shader_resource(&mut self, stage: ShaderStage, slot: u32, view: Option<SrvHandle>) {
        self.calls.push(D3D11Call::SetShaderResource { stage, slot, view });
    }

    fn set_sampler(&mut self, stage: ShaderStage, slot: u32, sampler: SamplerStateHandle) {
        self.calls.push(D3D11Call::SetSampler {
            stage,
            slot,
            sampler,
        });
    }

    fn rs_set_state(&mut self, state: RasterizerStateHandle) {
        self.calls.push(D3D11Call::RsSetState(state));
    }

    fn rs_set_viewports(&mut self, viewports: &[Viewport]) {
        self.calls.push(D3D11Call::RsSetViewports(viewports.to_vec()));
    }

    fn rs_set_scissor_rects(&mut self, rects: &[ScissorRect]) {
        self.calls.push(D3D11Call::RsSetScissorRects(rects.to_vec()));
    }

    fn om_set_depth_stencil_state(&mut self, state: DepthStencilStateHandle, stencil_ref: u32) {
        self.calls
            .push(D3D11Call::OmSetDepthStencilState { state, stencil_ref });
    }

    fn om_set_blend_state(
        &mut self,
        state: BlendStateHandle,
        blend_factor: [f32; 4],
        sample_mask: u32,
    ) {
        self.calls.push(D3D11Call::OmSetBlendState {
            state,
            blend_factor,
            sample_mask,
        });
    }

    fn om_set_render_targets(
        &mut self,
        colors: &RenderTargetViews,
        depth_stencil: Option<DsvHandle>,
    ) {
        self.calls.push(D3D11Call::OmSetRenderTargets {
            colors: *colors,
            depth_stencil,
        });
    }

    fn clear_render_target_view(&mut self, view: RtvHandle, color: [f32; 4]) {
        self.calls
            .push(D3D11Call::ClearRenderTargetView { view, color });
    }

    fn clear_depth_stencil_view(
        &mut self,
        view: DsvHandle,
        depth: Option<f32>,
        stencil: Option<u8>,
    ) {
        self.calls.push(D3D11Call::ClearDepthStencilView {
            view,
            depth,
            stencil,
        });
    }

    fn draw(&mut self, vertex_count: u32, start_vertex: u32) {
        self.calls.push(D3D11Call::Draw {
            vertex_count,
            start_vertex,
        });
    }

    fn draw_instanced(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    ) {
        self.calls.push(D3D11Call::DrawInstanced {
            vertex_count,
            instance_count,
            start_vertex,
            start_instance,
        });
    }

    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) {
        self.calls.push(D3D11Call::DrawIndexed {
            index_count,
            start_index,
            base_vertex,
        });
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) {
        self.calls.push(D3D11Call::DrawIndexedInstanced {
            index_count,
            instance_count,
            start_index,
            base_vertex,
            start_instance,
        });
    }

    fn dispatch(&mut self, thread_groups: [u32; 3]) {
        self.calls.push(D3D11Call::Dispatch(thread_groups));
    }

    fn begin_query(&mut self, query: QueryHandle) {
        self.calls.push(D3D11Call::BeginQuery(query));
    }

    fn end_query(&mut self, query: QueryHandle) {
        self.calls.push(D3D11Call::EndQuery(query));
    }
}
