use thiserror::Error;

use crate::device::{Backend, ShaderStage};
use crate::topology::PrimitiveType;

#[derive(Debug, Error)]
pub enum RhiError {
    #[error("{backend} does not support {what}")]
    Unsupported { backend: Backend, what: &'static str },
    #[error("{backend} does not support {stage} shaders")]
    UnsupportedShaderStage { backend: Backend, stage: ShaderStage },
    #[error("primitive type {primitive} is not valid for a tessellated draw")]
    InvalidTessellatedPrimitive { primitive: PrimitiveType },
    #[error("unknown primitive type {primitive} for {backend}")]
    UnknownPrimitiveType {
        backend: Backend,
        primitive: PrimitiveType,
    },
    #[error("control point patch list must have 1..=32 control points, got {0}")]
    InvalidControlPointCount(u32),
    #[error("{num_primitives} {primitive} primitives overflow the vertex count")]
    InvalidPrimitiveCount {
        primitive: PrimitiveType,
        num_primitives: u32,
    },
    #[error("index stride must be 2 or 4 bytes, got {0}")]
    InvalidIndexStride(u32),
    #[error("render target index {index} out of range (max {max})")]
    RenderTargetIndexOutOfRange { index: u32, max: u32 },
    #[error("vertex stream {index} out of range (max {max})")]
    StreamIndexOutOfRange { index: u32, max: u32 },
    #[error("constant buffer slot {slot} out of range for {stage} (max {max})")]
    ConstantBufferSlotOutOfRange {
        stage: ShaderStage,
        slot: u32,
        max: u32,
    },
    #[error(
        "constant buffer write out of bounds (buffer size {buffer_size}, write end {write_end})"
    )]
    ConstantBufferOverflow { buffer_size: u32, write_end: u64 },
    #[error("{what} data is {actual} bytes but {expected} bytes are required")]
    DataSizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{0} called while an immediate-mode draw is already pending")]
    DrawUpAlreadyPending(&'static str),
    #[error("{0} called without a matching begin")]
    DrawUpNotPending(&'static str),
    #[error("unknown surface {0}")]
    UnknownSurface(u32),
    #[error("unknown vertex buffer {0}")]
    UnknownVertexBuffer(u32),
    #[error("unknown index buffer {0}")]
    UnknownIndexBuffer(u32),
    #[error("unknown shader {0}")]
    UnknownShader(u32),
    #[error("unknown vertex declaration {0}")]
    UnknownVertexDeclaration(u32),
    #[error("unknown bound shader state {0}")]
    UnknownBoundShaderState(u32),
    #[error("unknown occlusion query {0}")]
    UnknownOcclusionQuery(u32),
    #[error("shader {shader} is a {actual} shader but was bound as {expected}")]
    ShaderStageMismatch {
        shader: u32,
        expected: ShaderStage,
        actual: ShaderStage,
    },
    #[error("surface {0} has no render target view")]
    NotRenderTarget(u32),
    #[error("surface {0} has no depth-stencil view")]
    NotDepthStencil(u32),
    #[error("surface {0} has no shader resource view")]
    NotShaderResource(u32),
    #[error("draw-based clear requires the clear shaders to be configured")]
    MissingClearShaders,
    #[error("driver call {call} failed: {message}")]
    Driver { call: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, RhiError>;

impl RhiError {
    pub fn driver(call: &'static str, message: impl Into<String>) -> Self {
        Self::Driver {
            call,
            message: message.into(),
        }
    }
}
