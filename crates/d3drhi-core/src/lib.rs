//! `d3drhi-core` holds the backend independent half of the D3D9/D3D11 RHI.
//!
//! Currently this crate provides:
//! - Pipeline state descriptors and the native state object cache
//!   (see [`state`] and [`state_cache::StateCache`]).
//! - Shadowed constant buffers (see [`constant_buffer::ConstantBufferSet`]).
//! - The dynamic vertex/index ring used by user-pointer draws
//!   (see [`dynamic_ring::DynamicBufferRing`]).
//! - The primitive topology tables and the [`GraphicsDevice`] verb set both
//!   backends implement.

mod error;

pub mod config;
pub mod constant_buffer;
pub mod device;
pub mod dynamic_ring;
pub mod shader_params;
pub mod state;
pub mod state_cache;
pub mod stats;
pub mod topology;

pub use config::RhiConfig;
pub use device::{
    Backend, BoundShaderStateDesc, BoundShaderStateId, ClearValues, GraphicsDevice, IndexBufferId,
    IndexedDraw, IndexedDrawUp, OcclusionQueryId, SamplerBinding, ScissorRect, ShaderId,
    ShaderStage, StreamSource, SurfaceDesc, SurfaceFormat, SurfaceId, SurfaceUsage,
    VertexBufferId, VertexDeclarationId, VertexElement, VertexElementFormat, VertexUsage,
    Viewport, MAX_VERTEX_STREAMS,
};
pub use error::{Result, RhiError};
pub use shader_params::ViewParameters;
pub use stats::{RhiStats, RhiStatsSnapshot};
pub use topology::{PrimitiveTopology, PrimitiveType};
