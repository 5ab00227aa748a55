use d3drhi_core::topology::{
    d3d11_topology, d3d9_topology, vertex_count_for_primitive_count, MAX_CONTROL_POINTS,
};
use d3drhi_core::{PrimitiveTopology, PrimitiveType, RhiError};

const NON_PATCH: [PrimitiveType; 6] = [
    PrimitiveType::TriangleList,
    PrimitiveType::TriangleStrip,
    PrimitiveType::LineList,
    PrimitiveType::QuadList,
    PrimitiveType::TessellatedQuadPatch,
    PrimitiveType::PointSprite,
];

/// Every accepted patch list topology keeps the control point count of the
/// primitive type it came from.
#[test]
fn patch_topologies_match_control_point_count() {
    for n in 1..=MAX_CONTROL_POINTS {
        let primitive = PrimitiveType::patch_list(n).unwrap();
        for tessellating in [false, true] {
            match d3d11_topology(primitive, tessellating) {
                Ok(topology) => {
                    assert_eq!(topology.control_points(), Some(n), "{primitive}");
                    assert_eq!(
                        vertex_count_for_primitive_count(1, primitive).unwrap(),
                        n
                    );
                }
                Err(err) => {
                    assert!(n < 3 && !tessellating, "{primitive}: {err}");
                }
            }
        }
    }
}

#[test]
fn tessellated_table() {
    let expected = [
        Some(PrimitiveTopology::PatchList { control_points: 3 }),
        None,
        None,
        None,
        None,
        None,
    ];
    for (primitive, expected) in NON_PATCH.into_iter().zip(expected) {
        assert_eq!(d3d11_topology(primitive, true).ok(), expected, "{primitive}");
    }
    assert!(matches!(
        d3d11_topology(PrimitiveType::TessellatedQuadPatch, true),
        Err(RhiError::UnknownPrimitiveType { .. })
    ));
}

#[test]
fn non_tessellated_tables_agree_for_basic_types() {
    for primitive in NON_PATCH {
        let d3d11 = d3d11_topology(primitive, false).ok();
        let d3d9 = d3d9_topology(primitive).ok();
        assert_eq!(d3d11, d3d9, "{primitive}");
    }
}

#[test]
fn patch_list_constructor_validates_range() {
    assert!(matches!(
        PrimitiveType::patch_list(0),
        Err(RhiError::InvalidControlPointCount(0))
    ));
    assert!(matches!(
        PrimitiveType::patch_list(33),
        Err(RhiError::InvalidControlPointCount(33))
    ));
    assert_eq!(
        PrimitiveType::patch_list(32).unwrap().to_string(),
        "32_control_point_patch_list"
    );
}
