use d3drhi_core::dynamic_ring::MapMode;
use d3drhi_core::{
    BoundShaderStateDesc, GraphicsDevice, IndexedDraw, IndexedDrawUp, PrimitiveTopology,
    PrimitiveType, RhiConfig, RhiError, ShaderStage, StreamSource, VertexElement,
    VertexElementFormat, VertexUsage, ViewParameters,
};
use d3drhi_d3d11::{D3D11Call, D3D11Rhi, IndexFormat, RecordingDriver};
use pretty_assertions::assert_eq;

fn rhi() -> D3D11Rhi<RecordingDriver> {
    D3D11Rhi::new(RecordingDriver::new(), RhiConfig::default())
}

fn position_only(rhi: &mut D3D11Rhi<RecordingDriver>) -> d3drhi_core::VertexDeclarationId {
    rhi.create_vertex_declaration(&[VertexElement {
        stream: 0,
        offset: 0,
        format: VertexElementFormat::Float3,
        usage: VertexUsage::Position,
        usage_index: 0,
        per_instance: false,
    }])
    .unwrap()
}

fn draws(calls: &[D3D11Call]) -> Vec<D3D11Call> {
    calls.iter().filter(|call| call.is_draw()).cloned().collect()
}

#[test]
fn instanced_stream_turns_draws_into_instanced_draws() {
    let mut rhi = rhi();
    let vb = rhi.create_vertex_buffer(1024).unwrap();
    rhi.set_stream_source(
        0,
        &StreamSource {
            num_instances: 3,
            ..StreamSource::per_vertex(vb, 12)
        },
    )
    .unwrap();
    rhi.draw_primitive(PrimitiveType::TriangleList, 6, 2).unwrap();

    rhi.set_stream_source(0, &StreamSource::per_vertex(vb, 12))
        .unwrap();
    rhi.draw_primitive(PrimitiveType::LineList, 0, 4).unwrap();

    assert_eq!(
        draws(rhi.driver().calls()),
        vec![
            D3D11Call::DrawInstanced {
                vertex_count: 6,
                instance_count: 3,
                start_vertex: 6,
                start_instance: 0,
            },
            D3D11Call::Draw {
                vertex_count: 8,
                start_vertex: 0,
            },
        ]
    );
    let stats = rhi.stats().snapshot();
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.triangles, 2);
    assert_eq!(stats.lines, 4);
}

#[test]
fn oversized_primitive_count_is_rejected_before_submission() {
    let mut rhi = rhi();
    assert!(matches!(
        rhi.draw_primitive(PrimitiveType::TriangleList, 0, 0x6000_0000),
        Err(RhiError::InvalidPrimitiveCount {
            num_primitives: 0x6000_0000,
            ..
        })
    ));
    assert!(matches!(
        rhi.draw_primitive(PrimitiveType::ControlPointPatchList(32), 0, u32::MAX / 16),
        Err(RhiError::InvalidPrimitiveCount { .. })
    ));
    assert!(draws(rhi.driver().calls()).is_empty());
    assert_eq!(rhi.stats().snapshot().draw_calls, 0);
}

#[test]
fn stream_index_is_bounded() {
    let mut rhi = rhi();
    let vb = rhi.create_vertex_buffer(64).unwrap();
    assert!(matches!(
        rhi.set_stream_source(16, &StreamSource::per_vertex(vb, 16)),
        Err(RhiError::StreamIndexOutOfRange { index: 16, max: 15 })
    ));
}

#[test]
fn indexed_draw_binds_index_format_from_stride() {
    let mut rhi = rhi();
    let ib16 = rhi.create_index_buffer(2, 600).unwrap();
    let ib32 = rhi.create_index_buffer(4, 600).unwrap();
    assert!(matches!(
        rhi.create_index_buffer(3, 600),
        Err(RhiError::InvalidIndexStride(3))
    ));

    let draw = IndexedDraw {
        index_buffer: ib16,
        primitive: PrimitiveType::TriangleStrip,
        base_vertex_index: -4,
        min_index: 0,
        num_vertices: 10,
        start_index: 12,
        num_primitives: 8,
    };
    rhi.draw_indexed_primitive(&draw).unwrap();
    rhi.draw_indexed_primitive(&IndexedDraw {
        index_buffer: ib32,
        ..draw
    })
    .unwrap();

    let calls = rhi.driver_mut().take_calls();
    let formats: Vec<IndexFormat> = calls
        .iter()
        .filter_map(|call| match call {
            D3D11Call::IaSetIndexBuffer { format, offset, .. } => {
                assert_eq!(*offset, 0);
                Some(*format)
            }
            _ => None,
        })
        .collect();
    assert_eq!(formats, vec![IndexFormat::R16Uint, IndexFormat::R32Uint]);
    assert!(calls.contains(&D3D11Call::IaSetPrimitiveTopology(
        PrimitiveTopology::TriangleStrip
    )));
    assert_eq!(
        draws(&calls)[0],
        D3D11Call::DrawIndexed {
            index_count: 10,
            start_index: 12,
            base_vertex: -4,
        }
    );
}

#[test]
fn dirty_constants_upload_once_per_change() {
    let mut rhi = rhi();
    rhi.set_shader_parameter(ShaderStage::Vertex, 2, 16, &[1, 2, 3, 4])
        .unwrap();
    rhi.set_shader_parameter(ShaderStage::Hull, 0, 0, &[9; 16])
        .unwrap();
    rhi.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();
    rhi.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();

    let calls = rhi.driver_mut().take_calls();
    let bound: Vec<(ShaderStage, u32)> = calls
        .iter()
        .filter_map(|call| match call {
            D3D11Call::SetConstantBuffer { stage, slot, .. } => Some((*stage, *slot)),
            _ => None,
        })
        .collect();
    // Hull constants wait until a tessellated draw.
    assert_eq!(bound, vec![(ShaderStage::Vertex, 2)]);
    assert_eq!(
        calls
            .iter()
            .filter(|call| matches!(call, D3D11Call::UpdateConstantBuffer { .. }))
            .count(),
        1
    );
    assert_eq!(rhi.stats().snapshot().constant_buffer_uploads, 1);
}

#[test]
fn constant_writes_past_the_buffer_fail() {
    let config = RhiConfig {
        constant_buffer_size: 64,
        ..RhiConfig::default()
    };
    let mut rhi = D3D11Rhi::new(RecordingDriver::new(), config);
    assert!(matches!(
        rhi.set_shader_parameter(ShaderStage::Pixel, 0, 60, &[0; 8]),
        Err(RhiError::ConstantBufferOverflow {
            buffer_size: 64,
            write_end: 68
        })
    ));
}

#[test]
fn view_parameters_fill_the_view_slot_of_each_graphics_stage() {
    let mut rhi = rhi();
    rhi.set_view_parameters(&ViewParameters::default()).unwrap();
    let created = rhi
        .driver()
        .calls()
        .iter()
        .filter(|call| matches!(call, D3D11Call::CreateConstantBuffer { .. }))
        .count();
    assert_eq!(created, 4);

    rhi.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();
    let bound: Vec<(ShaderStage, u32)> = rhi
        .driver()
        .calls()
        .iter()
        .filter_map(|call| match call {
            D3D11Call::SetConstantBuffer { stage, slot, .. } => Some((*stage, *slot)),
            _ => None,
        })
        .collect();
    assert_eq!(bound, vec![(ShaderStage::Vertex, 1), (ShaderStage::Pixel, 1)]);
}

#[test]
fn tessellation_switches_triangle_lists_to_patches() {
    let mut rhi = rhi();
    let declaration = position_only(&mut rhi);
    let vs = rhi.create_shader(ShaderStage::Vertex, b"vs").unwrap();
    let hs = rhi.create_shader(ShaderStage::Hull, b"hs").unwrap();
    let ds = rhi.create_shader(ShaderStage::Domain, b"ds").unwrap();
    let ps = rhi.create_shader(ShaderStage::Pixel, b"ps").unwrap();
    let state = rhi
        .create_bound_shader_state(&BoundShaderStateDesc {
            hull_shader: Some(hs),
            domain_shader: Some(ds),
            ..BoundShaderStateDesc::new(declaration, vs, Some(ps))
        })
        .unwrap();
    rhi.set_bound_shader_state(state).unwrap();
    rhi.set_shader_parameter(ShaderStage::Domain, 0, 0, &[1; 16])
        .unwrap();

    rhi.draw_primitive(PrimitiveType::TriangleList, 0, 2).unwrap();
    let calls = rhi.driver_mut().take_calls();
    assert!(calls.contains(&D3D11Call::IaSetPrimitiveTopology(
        PrimitiveTopology::PatchList { control_points: 3 }
    )));
    assert!(calls.iter().any(|call| matches!(
        call,
        D3D11Call::SetConstantBuffer {
            stage: ShaderStage::Domain,
            slot: 0,
            ..
        }
    )));

    assert!(matches!(
        rhi.draw_primitive(PrimitiveType::TriangleStrip, 0, 2),
        Err(RhiError::InvalidTessellatedPrimitive { .. })
    ));
    assert!(draws(rhi.driver().calls()).is_empty());
}

#[test]
fn bound_shader_state_checks_shader_stages() {
    let mut rhi = rhi();
    let declaration = position_only(&mut rhi);
    let vs = rhi.create_shader(ShaderStage::Vertex, b"vs").unwrap();
    let ps = rhi.create_shader(ShaderStage::Pixel, b"ps").unwrap();
    assert!(matches!(
        rhi.create_bound_shader_state(&BoundShaderStateDesc::new(declaration, ps, Some(vs))),
        Err(RhiError::ShaderStageMismatch {
            expected: ShaderStage::Vertex,
            actual: ShaderStage::Pixel,
            ..
        })
    ));
}

#[test]
fn user_pointer_draws_append_to_the_ring_then_wrap() {
    let config = RhiConfig {
        user_data_buffer_size: 128,
        ..RhiConfig::default()
    };
    let mut rhi = D3D11Rhi::new(RecordingDriver::new(), config);
    let triangle = [0u8; 48];
    for _ in 0..3 {
        rhi.draw_primitive_up(PrimitiveType::TriangleList, 1, &triangle, 16)
            .unwrap();
    }

    let calls = rhi.driver_mut().take_calls();
    let writes: Vec<(MapMode, u32)> = calls
        .iter()
        .filter_map(|call| match call {
            D3D11Call::WriteDynamicBuffer { mode, offset, .. } => Some((*mode, *offset)),
            _ => None,
        })
        .collect();
    assert_eq!(
        writes,
        vec![
            (MapMode::NoOverwrite, 0),
            (MapMode::NoOverwrite, 48),
            (MapMode::Discard, 0),
        ]
    );
    let vertex_offsets: Vec<u32> = calls
        .iter()
        .filter_map(|call| match call {
            D3D11Call::IaSetVertexBuffer {
                slot: 0, offset, ..
            } => Some(*offset),
            _ => None,
        })
        .collect();
    assert_eq!(vertex_offsets, vec![0, 48, 0]);
    assert_eq!(rhi.stats().snapshot().ring_discards, 1);
}

#[test]
fn indexed_user_pointer_draw_through_scratch() {
    let mut rhi = rhi();
    let draw = IndexedDrawUp {
        primitive: PrimitiveType::TriangleList,
        min_vertex_index: 2,
        num_vertices: 4,
        num_primitives: 2,
        index_stride: 4,
        vertex_stride: 8,
    };
    {
        let (vertices, indices) = rhi.begin_draw_indexed_primitive_up(&draw).unwrap();
        assert_eq!(vertices.len(), 32);
        assert_eq!(indices.len(), 24);
        vertices.fill(0xAB);
        indices.copy_from_slice(bytemuck::cast_slice(&[0u32, 1, 2, 2, 1, 3]));
    }
    rhi.end_draw_indexed_primitive_up().unwrap();

    let calls = rhi.driver_mut().take_calls();
    let uploads: Vec<Vec<u8>> = calls
        .iter()
        .filter_map(|call| match call {
            D3D11Call::WriteDynamicBuffer { data, .. } => Some(data.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0], vec![0xAB; 32]);
    assert_eq!(
        bytemuck::pod_collect_to_vec::<u8, u32>(&uploads[1]),
        vec![0, 1, 2, 2, 1, 3]
    );
    assert!(calls.iter().any(|call| matches!(
        call,
        D3D11Call::IaSetIndexBuffer {
            format: IndexFormat::R32Uint,
            ..
        }
    )));
    assert_eq!(
        draws(&calls),
        vec![D3D11Call::DrawIndexed {
            index_count: 6,
            start_index: 0,
            base_vertex: 2,
        }]
    );
}

#[test]
fn occlusion_queries_bracket_draws() {
    let mut rhi = rhi();
    let query = rhi.create_occlusion_query().unwrap();
    rhi.begin_occlusion_query(query).unwrap();
    rhi.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();
    rhi.end_occlusion_query(query).unwrap();

    let calls = rhi.driver_mut().take_calls();
    assert!(matches!(calls.first(), Some(D3D11Call::CreateOcclusionQuery)));
    assert!(matches!(calls[1], D3D11Call::BeginQuery(_)));
    assert!(matches!(calls.last(), Some(D3D11Call::EndQuery(_))));
    assert!(matches!(
        rhi.begin_occlusion_query(d3drhi_core::OcclusionQueryId(5)),
        Err(RhiError::UnknownOcclusionQuery(5))
    ));
}

#[test]
fn float_arrays_are_padded_to_registers() {
    let mut rhi = rhi();
    rhi.set_vertex_shader_float_array(0, 32, &[1.0, 2.0]).unwrap();
    rhi.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();

    let upload = rhi
        .driver()
        .calls()
        .iter()
        .find_map(|call| match call {
            D3D11Call::UpdateConstantBuffer { offset, data, .. } => Some((*offset, data.clone())),
            _ => None,
        })
        .unwrap();
    let (offset, data) = upload;
    let floats: Vec<f32> = bytemuck::pod_collect_to_vec(&data);
    // Either the dirty range or the whole buffer was uploaded; the padded
    // registers sit at byte 32 either way.
    let start = (32 - offset as usize) / 4;
    assert_eq!(
        &floats[start..start + 8],
        &[1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0]
    );
}
