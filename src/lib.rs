//! State-caching RHI over Direct3D 9 and Direct3D 11 class drivers.
//!
//! Callers program against [`GraphicsDevice`]; [`D3D9Rhi`] and [`D3D11Rhi`]
//! implement it over their driver seams. This crate re-exports the three
//! workspace crates under one name.

pub use d3drhi_core;
pub use d3drhi_d3d11;
pub use d3drhi_d3d9;

pub use d3drhi_core::{Backend, GraphicsDevice, Result, RhiConfig, RhiError, RhiStats};
pub use d3drhi_d3d11::D3D11Rhi;
pub use d3drhi_d3d9::D3D9Rhi;

/// A boxed dispatcher for `backend` over a [`RecordingDriver`] double, for
/// tooling that replays RHI traffic without a GPU.
///
/// [`RecordingDriver`]: d3drhi_d3d11::RecordingDriver
pub fn recording_device(backend: Backend, config: RhiConfig) -> Box<dyn GraphicsDevice> {
    tracing::debug!(%backend, "creating recording device");
    match backend {
        Backend::D3D9 => Box::new(D3D9Rhi::new(d3drhi_d3d9::RecordingDriver::new(), config)),
        Backend::D3D11 => Box::new(D3D11Rhi::new(
            d3drhi_d3d11::RecordingDriver::new(),
            config,
        )),
    }
}

#[cfg(test)]
mod tests {
    use d3drhi_core::{PrimitiveType, ShaderStage};

    use super::*;

    #[test]
    fn both_backends_share_the_verb_set() {
        for backend in [Backend::D3D9, Backend::D3D11] {
            let mut device = recording_device(backend, RhiConfig::default());
            assert_eq!(device.backend(), backend);
            device
                .draw_primitive_up(PrimitiveType::TriangleList, 1, &[0; 36], 12)
                .unwrap();
            assert_eq!(device.stats().snapshot().draw_calls, 1);
        }
    }

    #[test]
    fn only_d3d11_creates_hull_shaders() {
        let mut d3d9 = recording_device(Backend::D3D9, RhiConfig::default());
        let mut d3d11 = recording_device(Backend::D3D11, RhiConfig::default());
        assert!(d3d9.create_shader(ShaderStage::Hull, &[0; 4]).is_err());
        assert!(d3d11.create_shader(ShaderStage::Hull, &[0; 4]).is_ok());
    }
}
