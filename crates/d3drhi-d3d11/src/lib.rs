//! D3D11 backend of the RHI.
//!
//! [`D3D11Rhi`] implements [`d3drhi_core::GraphicsDevice`] on top of a
//! [`D3D11Driver`], the thin seam over an immediate context. Native state
//! objects are created through the driver on first use and cached by
//! descriptor; [`RecordingDriver`] logs every call for tests and tooling.

mod clear;
mod draw;
mod render_target;
mod resources;
mod rhi;

pub mod driver;
pub mod recording;

pub use driver::{D3D11Driver, IndexFormat, RenderTargetViews, SurfaceViews};
pub use recording::{D3D11Call, RecordingDriver};
pub use rhi::D3D11Rhi;
