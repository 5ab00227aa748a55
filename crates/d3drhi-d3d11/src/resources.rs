//! Id-indexed tables of the native objects behind each RHI resource.

use d3drhi_core::{
    BoundShaderStateId, IndexBufferId, OcclusionQueryId, Result, RhiError, ShaderId, ShaderStage,
    SurfaceDesc, SurfaceId, VertexBufferId, VertexDeclarationId, VertexElement,
};

use crate::driver::{BufferHandle, InputLayoutHandle, QueryHandle, ShaderHandle, SurfaceViews};

/// Append-only table; ids are indices.
#[derive(Debug)]
pub(crate) struct Table<T> {
    entries: Vec<T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Table<T> {
    pub(crate) fn insert(&mut self, value: T) -> u32 {
        self.entries.push(value);
        (self.entries.len() - 1) as u32
    }

    pub(crate) fn get(&self, id: u32) -> Option<&T> {
        self.entries.get(id as usize)
    }

    pub(crate) fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.entries.get_mut(id as usize)
    }
}

#[derive(Debug)]
pub(crate) struct Surface {
    pub(crate) desc: SurfaceDesc,
    pub(crate) views: SurfaceViews,
    /// Shader resource slots, per stage, this surface's SRV is bound to.
    /// Only tracked for render and depth targets.
    pub(crate) bound_srv_slots: [Vec<u32>; 6],
}

impl Surface {
    pub(crate) fn new(desc: SurfaceDesc, views: SurfaceViews) -> Self {
        Self {
            desc,
            views,
            bound_srv_slots: Default::default(),
        }
    }

    pub(crate) fn is_target(&self) -> bool {
        self.views.render_target.is_some() || self.views.depth_stencil.is_some()
    }

    pub(crate) fn record_srv_slot(&mut self, stage: ShaderStage, slot: u32) {
        let slots = &mut self.bound_srv_slots[stage.index()];
        if !slots.contains(&slot) {
            slots.push(slot);
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexBuffer {
    pub(crate) buffer: BufferHandle,
    pub(crate) stride: u32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Shader {
    pub(crate) stage: ShaderStage,
    pub(crate) handle: ShaderHandle,
}

/// Native objects of a bound shader state, resolved at creation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BoundShaderState {
    pub(crate) input_layout: InputLayoutHandle,
    pub(crate) vertex_shader: ShaderHandle,
    pub(crate) pixel_shader: Option<ShaderHandle>,
    pub(crate) hull_shader: Option<ShaderHandle>,
    pub(crate) domain_shader: Option<ShaderHandle>,
    pub(crate) geometry_shader: Option<ShaderHandle>,
}

impl BoundShaderState {
    pub(crate) fn uses_tessellation(&self) -> bool {
        self.hull_shader.is_some() && self.domain_shader.is_some()
    }
}

#[derive(Debug, Default)]
pub(crate) struct Resources {
    pub(crate) surfaces: Table<Surface>,
    pub(crate) vertex_buffers: Table<BufferHandle>,
    pub(crate) index_buffers: Table<IndexBuffer>,
    pub(crate) shaders: Table<Shader>,
    pub(crate) vertex_declarations: Table<Vec<VertexElement>>,
    pub(crate) bound_shader_states: Table<BoundShaderState>,
    pub(crate) occlusion_queries: Table<QueryHandle>,
}

impl Resources {
    pub(crate) fn surface(&self, id: SurfaceId) -> Result<&Surface> {
        self.surfaces.get(id.0).ok_or(RhiError::UnknownSurface(id.0))
    }

    pub(crate) fn surface_mut(&mut self, id: SurfaceId) -> Result<&mut Surface> {
        self.surfaces
            .get_mut(id.0)
            .ok_or(RhiError::UnknownSurface(id.0))
    }

    pub(crate) fn vertex_buffer(&self, id: VertexBufferId) -> Result<BufferHandle> {
        self.vertex_buffers
            .get(id.0)
            .copied()
            .ok_or(RhiError::UnknownVertexBuffer(id.0))
    }

    pub(crate) fn index_buffer(&self, id: IndexBufferId) -> Result<IndexBuffer> {
        self.index_buffers
            .get(id.0)
            .copied()
            .ok_or(RhiError::UnknownIndexBuffer(id.0))
    }

    /// The native shader for `id`, which must have been created for `stage`.
    pub(crate) fn shader(&self, id: ShaderId, stage: ShaderStage) -> Result<ShaderHandle> {
        let shader = self
            .shaders
            .get(id.0)
            .ok_or(RhiError::UnknownShader(id.0))?;
        if shader.stage != stage {
            return Err(RhiError::ShaderStageMismatch {
                shader: id.0,
                expected: stage,
                actual: shader.stage,
            });
        }
        Ok(shader.handle)
    }

    pub(crate) fn optional_shader(
        &self,
        id: Option<ShaderId>,
        stage: ShaderStage,
    ) -> Result<Option<ShaderHandle>> {
        id.map(|id| self.shader(id, stage)).transpose()
    }

    pub(crate) fn vertex_declaration(&self, id: VertexDeclarationId) -> Result<&[VertexElement]> {
        self.vertex_declarations
            .get(id.0)
            .map(Vec::as_slice)
            .ok_or(RhiError::UnknownVertexDeclaration(id.0))
    }

    pub(crate) fn bound_shader_state(&self, id: BoundShaderStateId) -> Result<BoundShaderState> {
        self.bound_shader_states
            .get(id.0)
            .copied()
            .ok_or(RhiError::UnknownBoundShaderState(id.0))
    }

    pub(crate) fn occlusion_query(&self, id: OcclusionQueryId) -> Result<QueryHandle> {
        self.occlusion_queries
            .get(id.0)
            .copied()
            .ok_or(RhiError::UnknownOcclusionQuery(id.0))
    }
}
