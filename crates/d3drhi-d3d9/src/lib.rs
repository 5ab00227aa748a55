//! D3D9 backend of the RHI.
//!
//! [`D3D9Rhi`] implements [`d3drhi_core::GraphicsDevice`] on top of a
//! [`D3D9Driver`]. State descriptors become raw render and sampler state
//! writes (see [`render_state`]); instancing falls back to replaying the draw
//! per instance when the device has no stream frequency dividers.

mod draw;
mod render_target;
mod resources;
mod rhi;

pub mod consts;
pub mod driver;
pub mod recording;
pub mod render_state;

pub use driver::{
    ClearFlags, CooperativeLevel, D3D9Driver, IndexFormat, StreamFrequency, SurfaceHandles,
};
pub use recording::{D3D9Call, RecordingDriver};
pub use rhi::D3D9Rhi;
