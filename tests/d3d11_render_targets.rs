use d3drhi_core::state::{DepthStateDesc, LinearColor, SamplerStateDesc, StencilStateDesc};
use d3drhi_core::{
    BoundShaderStateDesc, BoundShaderStateId, ClearValues, GraphicsDevice, RhiConfig, RhiError,
    SamplerBinding, ShaderStage, SurfaceDesc, SurfaceFormat, SurfaceId, VertexElement,
    VertexElementFormat, VertexUsage, Viewport,
};
use d3drhi_d3d11::{D3D11Call, D3D11Rhi, RecordingDriver};
use pretty_assertions::assert_eq;

fn rhi() -> D3D11Rhi<RecordingDriver> {
    D3D11Rhi::new(RecordingDriver::new(), RhiConfig::default())
}

fn color_target(rhi: &mut D3D11Rhi<RecordingDriver>, width: u32, height: u32) -> SurfaceId {
    rhi.create_surface(&SurfaceDesc::render_target(
        width,
        height,
        SurfaceFormat::Rgba8Unorm,
    ))
    .unwrap()
}

fn clear_shaders(rhi: &mut D3D11Rhi<RecordingDriver>) -> BoundShaderStateId {
    let declaration = rhi
        .create_vertex_declaration(&[VertexElement {
            stream: 0,
            offset: 0,
            format: VertexElementFormat::Float4,
            usage: VertexUsage::Position,
            usage_index: 0,
            per_instance: false,
        }])
        .unwrap();
    let vs = rhi.create_shader(ShaderStage::Vertex, b"clear_vs").unwrap();
    let ps = rhi.create_shader(ShaderStage::Pixel, b"clear_ps").unwrap();
    rhi.create_bound_shader_state(&BoundShaderStateDesc::new(declaration, vs, Some(ps)))
        .unwrap()
}

fn render_target_binds(calls: &[D3D11Call]) -> Vec<&D3D11Call> {
    calls
        .iter()
        .filter(|call| matches!(call, D3D11Call::OmSetRenderTargets { .. }))
        .collect()
}

#[test]
fn null_color_target_uses_back_buffer_viewport() {
    let mut rhi = rhi();
    let back_buffer = color_target(&mut rhi, 1280, 720);
    let offscreen = color_target(&mut rhi, 256, 256);
    let depth = rhi.create_surface(&SurfaceDesc::depth_stencil(1280, 720)).unwrap();

    rhi.begin_drawing_viewport(back_buffer).unwrap();
    assert_eq!(rhi.current_viewport(), Some(Viewport::full(1280, 720)));

    rhi.set_render_target(Some(offscreen), None).unwrap();
    assert_eq!(rhi.current_viewport(), Some(Viewport::full(256, 256)));

    rhi.set_render_target(None, Some(depth)).unwrap();
    assert_eq!(rhi.current_viewport(), Some(Viewport::full(1280, 720)));

    rhi.end_drawing_viewport().unwrap();
    rhi.set_render_target(None, Some(depth)).unwrap();
    // No colour target and no back buffer: the viewport is left alone.
    assert_eq!(rhi.current_viewport(), Some(Viewport::full(1280, 720)));
}

#[test]
fn mrt_slots_are_cleared_by_single_target_bind() {
    let mut rhi = rhi();
    let a = color_target(&mut rhi, 64, 64);
    let b = color_target(&mut rhi, 64, 64);
    rhi.set_render_target(Some(a), None).unwrap();
    rhi.set_mrt_render_target(Some(b), 1).unwrap();
    rhi.set_mrt_render_target(Some(b), 1).unwrap();
    rhi.set_render_target(Some(a), None).unwrap();

    let calls = rhi.driver_mut().take_calls();
    let binds = render_target_binds(&calls);
    assert_eq!(binds.len(), 3);
    match binds[1] {
        D3D11Call::OmSetRenderTargets { colors, .. } => {
            assert!(colors[0].is_some() && colors[1].is_some());
        }
        other => panic!("unexpected call {other:?}"),
    }
    match binds[2] {
        D3D11Call::OmSetRenderTargets { colors, .. } => {
            assert!(colors[0].is_some());
            assert!(colors[1..].iter().all(Option::is_none));
        }
        other => panic!("unexpected call {other:?}"),
    }
    assert_eq!(rhi.stats().snapshot().render_target_rebinds, 3);
}

#[test]
fn sampled_surface_is_unbound_before_it_becomes_a_target() {
    let mut rhi = rhi();
    let target = color_target(&mut rhi, 32, 32);
    rhi.set_sampler_state(
        ShaderStage::Pixel,
        &SamplerBinding::new(3, SamplerStateDesc::default(), Some(target)),
    )
    .unwrap();
    rhi.driver_mut().take_calls();

    rhi.set_render_target(Some(target), None).unwrap();
    let calls = rhi.driver_mut().take_calls();
    assert_eq!(
        calls[0],
        D3D11Call::SetShaderResource {
            stage: ShaderStage::Pixel,
            slot: 3,
            view: None,
        }
    );
    assert!(matches!(calls[1], D3D11Call::OmSetRenderTargets { .. }));

    // The slot list was consumed; rebinding elsewhere and back does not
    // unbind again.
    let other = color_target(&mut rhi, 32, 32);
    rhi.set_render_target(Some(other), None).unwrap();
    rhi.set_render_target(Some(target), None).unwrap();
    assert!(!rhi
        .driver()
        .calls()
        .iter()
        .any(|call| matches!(call, D3D11Call::SetShaderResource { .. })));
}

#[test]
fn multisampled_target_enables_multisample_rasterization() {
    let mut rhi = rhi();
    let msaa = rhi
        .create_surface(
            &SurfaceDesc::render_target(64, 64, SurfaceFormat::Rgba16Float).with_samples(4),
        )
        .unwrap();
    rhi.set_render_target(Some(msaa), None).unwrap();

    let multisample: Vec<bool> = rhi
        .driver()
        .calls()
        .iter()
        .filter_map(|call| match call {
            D3D11Call::CreateRasterizerState(key) => Some(key.multisample_enable),
            _ => None,
        })
        .collect();
    assert_eq!(multisample, vec![true]);
}

#[test]
fn read_only_depth_view_follows_depth_writes() {
    let mut rhi = rhi();
    let color = color_target(&mut rhi, 64, 64);
    let depth = rhi.create_surface(&SurfaceDesc::depth_stencil(64, 64)).unwrap();
    rhi.set_depth_state(&DepthStateDesc {
        enable_depth_write: false,
        ..DepthStateDesc::default()
    })
    .unwrap();
    rhi.set_render_target(Some(color), Some(depth)).unwrap();
    rhi.set_depth_state(&DepthStateDesc::default()).unwrap();

    let calls = rhi.driver_mut().take_calls();
    let views: Vec<_> = render_target_binds(&calls)
        .into_iter()
        .map(|call| match call {
            D3D11Call::OmSetRenderTargets { depth_stencil, .. } => *depth_stencil,
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(views.len(), 2);
    assert!(views[0].is_some() && views[1].is_some());
    assert_ne!(views[0], views[1]);
}

#[test]
fn zero_area_viewport_is_dropped() {
    let mut rhi = rhi();
    rhi.set_viewport(&Viewport::full(0, 100)).unwrap();
    assert_eq!(rhi.current_viewport(), None);
    assert!(rhi.driver().calls().is_empty());

    rhi.set_multiple_viewports(&[Viewport::full(10, 10), Viewport::full(20, 20)])
        .unwrap();
    assert_eq!(rhi.current_viewport(), Some(Viewport::full(10, 10)));
    assert_eq!(
        rhi.driver().calls(),
        &[D3D11Call::RsSetViewports(vec![
            Viewport::full(10, 10),
            Viewport::full(20, 20)
        ])]
    );
}

#[test]
fn partial_viewport_clear_draws_a_quad_and_restores_state() {
    let mut rhi = rhi();
    let shaders = clear_shaders(&mut rhi);
    rhi.set_clear_shaders(shaders).unwrap();
    let color = color_target(&mut rhi, 64, 64);
    let depth = rhi.create_surface(&SurfaceDesc::depth_stencil(64, 64)).unwrap();
    rhi.set_depth_state(&DepthStateDesc {
        enable_depth_write: false,
        ..DepthStateDesc::default()
    })
    .unwrap();
    rhi.set_render_target(Some(color), Some(depth)).unwrap();
    rhi.set_viewport(&Viewport {
        min_x: 0,
        min_y: 0,
        min_z: 0.0,
        max_x: 32,
        max_y: 32,
        max_z: 1.0,
    })
    .unwrap();
    rhi.driver_mut().take_calls();

    rhi.clear(&ClearValues {
        color: Some(LinearColor::new(0.25, 0.5, 0.75, 1.0)),
        depth: Some(0.5),
        stencil: None,
    })
    .unwrap();
    let calls = rhi.driver_mut().take_calls();

    assert!(!calls
        .iter()
        .any(|call| matches!(call, D3D11Call::ClearRenderTargetView { .. })));
    assert!(calls.contains(&D3D11Call::Draw {
        vertex_count: 4,
        start_vertex: 0,
    }));

    let quad = calls
        .iter()
        .find_map(|call| match call {
            D3D11Call::WriteDynamicBuffer { data, .. } => Some(data.clone()),
            _ => None,
        })
        .unwrap();
    let quad: Vec<f32> = bytemuck::pod_collect_to_vec(&quad);
    assert_eq!(quad.len(), 16);
    assert!(quad.chunks(4).all(|v| v[2] == 0.5 && v[3] == 1.0));

    let color_upload = calls
        .iter()
        .find_map(|call| match call {
            D3D11Call::UpdateConstantBuffer { data, .. } => Some(data.clone()),
            _ => None,
        })
        .unwrap();
    let color_upload: Vec<f32> = bytemuck::pod_collect_to_vec(&color_upload[..16]);
    assert_eq!(color_upload, vec![0.25, 0.5, 0.75, 1.0]);

    // The writable view is bound for the clear, then the read-only view is
    // restored.
    let binds: Vec<_> = render_target_binds(&calls)
        .into_iter()
        .map(|call| match call {
            D3D11Call::OmSetRenderTargets { depth_stencil, .. } => *depth_stencil,
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(binds.len(), 2);
    assert_ne!(binds[0], binds[1]);

    // Without a previously bound shader state every stage is unbound again
    // and the pipeline state objects are rebound last.
    let tail = &calls[calls.len() - 3..];
    assert!(matches!(tail[0], D3D11Call::OmSetDepthStencilState { .. }));
    assert!(matches!(tail[1], D3D11Call::OmSetBlendState { .. }));
    assert!(matches!(tail[2], D3D11Call::RsSetState(_)));
    assert!(calls.contains(&D3D11Call::IaSetInputLayout(None)));
}

#[test]
fn draw_clear_stencil_reference_follows_the_clear_or_the_bound_state() {
    let mut rhi = rhi();
    let shaders = clear_shaders(&mut rhi);
    rhi.set_clear_shaders(shaders).unwrap();
    let color = color_target(&mut rhi, 64, 64);
    let depth = rhi.create_surface(&SurfaceDesc::depth_stencil(64, 64)).unwrap();
    rhi.set_render_target(Some(color), Some(depth)).unwrap();
    rhi.set_stencil_state(&StencilStateDesc {
        stencil_ref: 5,
        ..StencilStateDesc::default()
    })
    .unwrap();
    rhi.set_viewport(&Viewport {
        min_x: 8,
        min_y: 8,
        min_z: 0.0,
        max_x: 40,
        max_y: 40,
        max_z: 1.0,
    })
    .unwrap();

    let first_stencil_ref = |rhi: &mut D3D11Rhi<RecordingDriver>| {
        rhi.driver_mut()
            .take_calls()
            .iter()
            .find_map(|call| match call {
                D3D11Call::OmSetDepthStencilState { stencil_ref, .. } => Some(*stencil_ref),
                _ => None,
            })
    };
    first_stencil_ref(&mut rhi);

    rhi.clear(&ClearValues::color(LinearColor::BLACK)).unwrap();
    assert_eq!(first_stencil_ref(&mut rhi), Some(5));

    rhi.clear(&ClearValues::depth_stencil(1.0, 9)).unwrap();
    assert_eq!(first_stencil_ref(&mut rhi), Some(9));
}

#[test]
fn full_target_clear_of_read_only_depth_uses_writable_view() {
    let mut rhi = rhi();
    let depth = rhi.create_surface(&SurfaceDesc::depth_stencil(16, 16)).unwrap();
    rhi.set_depth_state(&DepthStateDesc {
        enable_depth_write: false,
        ..DepthStateDesc::default()
    })
    .unwrap();
    rhi.set_render_target(None, Some(depth)).unwrap();
    let read_only = rhi
        .driver()
        .calls()
        .iter()
        .find_map(|call| match call {
            D3D11Call::OmSetRenderTargets { depth_stencil, .. } => *depth_stencil,
            _ => None,
        })
        .unwrap();
    rhi.driver_mut().take_calls();

    rhi.clear(&ClearValues::depth_stencil(1.0, 0)).unwrap();
    let calls = rhi.driver_mut().take_calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        D3D11Call::ClearDepthStencilView { view, .. } => assert_ne!(*view, read_only),
        other => panic!("unexpected call {other:?}"),
    }
}

#[test]
fn clear_shaders_must_exist() {
    let mut rhi = rhi();
    assert!(matches!(
        rhi.set_clear_shaders(BoundShaderStateId(9)),
        Err(RhiError::UnknownBoundShaderState(9))
    ));
}
