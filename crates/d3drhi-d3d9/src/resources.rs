//! Id-indexed tables of the native objects behind each RHI resource.

use d3drhi_core::{
    Backend, BoundShaderStateId, IndexBufferId, OcclusionQueryId, Result, RhiError, ShaderId,
    ShaderStage, SurfaceDesc, SurfaceId, VertexBufferId, VertexDeclarationId,
};

use crate::driver::{
    IndexBufferHandle, QueryHandle, ShaderHandle, SurfaceHandles, VertexBufferHandle,
    VertexDeclarationHandle,
};

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

impl<T: Copy> Table<T> {
    pub(crate) fn insert(&mut self, value: T) -> u32 {
        self.entries.push(value);
        (self.entries.len() - 1) as u32
    }

    pub(crate) fn get(&self, id: u32) -> Option<T> {
        self.entries.get(id as usize).copied()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Surface {
    pub(crate) desc: SurfaceDesc,
    pub(crate) handles: SurfaceHandles,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexBuffer {
    pub(crate) buffer: IndexBufferHandle,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Shader {
    pub(crate) stage: ShaderStage,
    pub(crate) handle: ShaderHandle,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct BoundShaderState {
    pub(crate) vertex_declaration: VertexDeclarationHandle,
    pub(crate) vertex_shader: ShaderHandle,
    pub(crate) pixel_shader: Option<ShaderHandle>,
}

/// Shader stages a D3D9 device can create.
pub(crate) fn check_stage(stage: ShaderStage) -> Result<()> {
    match stage {
        ShaderStage::Vertex | ShaderStage::Pixel => Ok(()),
        stage => Err(RhiError::UnsupportedShaderStage {
            backend: Backend::D3D9,
            stage,
        }),
    }
}

#[derive(Debug, Default)]
pub(crate) struct Resources {
    pub(crate) surfaces: Table<Surface>,
    pub(crate) vertex_buffers: Table<VertexBufferHandle>,
    pub(crate) index_buffers: Table<IndexBuffer>,
    pub(crate) shaders: Table<Shader>,
    pub(crate) vertex_declarations: Table<VertexDeclarationHandle>,
    pub(crate) bound_shader_states: Table<BoundShaderState>,
    pub(crate) occlusion_queries: Table<QueryHandle>,
}

impl Resources {
    pub(crate) fn surface(&self, id: SurfaceId) -> Result<Surface> {
        self.surfaces.get(id.0).ok_or(RhiError::UnknownSurface(id.0))
    }

    pub(crate) fn vertex_buffer(&self, id: VertexBufferId) -> Result<VertexBufferHandle> {
        self.vertex_buffers
            .get(id.0)
            .ok_or(RhiError::UnknownVertexBuffer(id.0))
    }

    pub(crate) fn index_buffer(&self, id: IndexBufferId) -> Result<IndexBuffer> {
        self.index_buffers
            .get(id.0)
            .ok_or(RhiError::UnknownIndexBuffer(id.0))
    }

    pub(crate) fn shader(&self, id: ShaderId, stage: ShaderStage) -> Result<ShaderHandle> {
        let shader = self.shaders.get(id.0).ok_or(RhiError::UnknownShader(id.0))?;
        if shader.stage != stage {
            return Err(RhiError::ShaderStageMismatch {
                shader: id.0,
                expected: stage,
                actual: shader.stage,
            });
        }
        Ok(shader.handle)
    }

    pub(crate) fn vertex_declaration(
        &self,
        id: VertexDeclarationId,
    ) -> Result<VertexDeclarationHandle> {
        self.vertex_declarations
            .get(id.0)
            .ok_or(RhiError::UnknownVertexDeclaration(id.0))
    }

    pub(crate) fn bound_shader_state(&self, id: BoundShaderStateId) -> Result<BoundShaderState> {
        self.bound_shader_states
            .get(id.0)
            .ok_or(RhiError::UnknownBoundShaderState(id.0))
    }

    pub(crate) fn occlusion_query(&self, id: OcclusionQueryId) -> Result<QueryHandle> {
        self.occlusion_queries
            .get(id.0)
            .ok_or(RhiError::UnknownOcclusionQuery(id.0))
    }
}
