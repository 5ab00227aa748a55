use std::fmt;

use crate::device::Backend;
use crate::error::{Result, RhiError};

pub const MAX_CONTROL_POINTS: u32 = 32;

/// RHI primitive types.
///
/// This is a "semantic" enum (not the raw driver constants) so draw callers
/// stay backend independent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    TriangleList,
    TriangleStrip,
    LineList,
    QuadList,
    TessellatedQuadPatch,
    PointSprite,
    /// Patch list with the given number of control points (1..=32).
    ControlPointPatchList(u32),
}

impl PrimitiveType {
    pub fn patch_list(control_points: u32) -> Result<Self> {
        if (1..=MAX_CONTROL_POINTS).contains(&control_points) {
            Ok(Self::ControlPointPatchList(control_points))
        } else {
            Err(RhiError::InvalidControlPointCount(control_points))
        }
    }

    pub fn is_line(self) -> bool {
        self == Self::LineList
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveType::TriangleList => f.write_str("triangle_list"),
            PrimitiveType::TriangleStrip => f.write_str("triangle_strip"),
            PrimitiveType::LineList => f.write_str("line_list"),
            PrimitiveType::QuadList => f.write_str("quad_list"),
            PrimitiveType::TessellatedQuadPatch => f.write_str("tessellated_quad_patch"),
            PrimitiveType::PointSprite => f.write_str("point_sprite"),
            PrimitiveType::ControlPointPatchList(n) => write!(f, "{n}_control_point_patch_list"),
        }
    }
}

/// Native input-assembler topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
    /// `D3D11_PRIMITIVE_TOPOLOGY_N_CONTROL_POINT_PATCHLIST`.
    PatchList { control_points: u32 },
}

impl PrimitiveTopology {
    /// Vertices consumed per primitive for list topologies.
    pub fn control_points(self) -> Option<u32> {
        match self {
            PrimitiveTopology::PatchList { control_points } => Some(control_points),
            _ => None,
        }
    }
}

fn patch(control_points: u32) -> Result<PrimitiveTopology> {
    if (1..=MAX_CONTROL_POINTS).contains(&control_points) {
        Ok(PrimitiveTopology::PatchList { control_points })
    } else {
        Err(RhiError::InvalidControlPointCount(control_points))
    }
}

/// D3D11 topology for a draw, given whether hull and domain shaders are bound.
///
/// Under tessellation a plain triangle list becomes a 3 control point patch
/// list. Patch lists with 3 or more control points map to themselves in both
/// modes; 1 and 2 point patch lists are only valid while tessellating.
pub fn d3d11_topology(primitive: PrimitiveType, tessellating: bool) -> Result<PrimitiveTopology> {
    if tessellating {
        match primitive {
            PrimitiveType::ControlPointPatchList(n @ (1 | 2)) => return patch(n),
            PrimitiveType::TriangleList => return patch(3),
            PrimitiveType::LineList
            | PrimitiveType::TriangleStrip
            | PrimitiveType::QuadList
            | PrimitiveType::PointSprite => {
                return Err(RhiError::InvalidTessellatedPrimitive { primitive })
            }
            _ => {}
        }
    }

    match primitive {
        PrimitiveType::TriangleList => Ok(PrimitiveTopology::TriangleList),
        PrimitiveType::TriangleStrip => Ok(PrimitiveTopology::TriangleStrip),
        PrimitiveType::LineList => Ok(PrimitiveTopology::LineList),
        PrimitiveType::ControlPointPatchList(n) if (3..=MAX_CONTROL_POINTS).contains(&n) => {
            patch(n)
        }
        _ => Err(RhiError::UnknownPrimitiveType {
            backend: Backend::D3D11,
            primitive,
        }),
    }
}

/// D3D9 only knows the three basic list/strip topologies.
pub fn d3d9_topology(primitive: PrimitiveType) -> Result<PrimitiveTopology> {
    match primitive {
        PrimitiveType::TriangleList => Ok(PrimitiveTopology::TriangleList),
        PrimitiveType::TriangleStrip => Ok(PrimitiveTopology::TriangleStrip),
        PrimitiveType::LineList => Ok(PrimitiveTopology::LineList),
        _ => Err(RhiError::UnknownPrimitiveType {
            backend: Backend::D3D9,
            primitive,
        }),
    }
}

/// Number of vertices (or indices) a draw of `num_primitives` consumes.
pub fn vertex_count_for_primitive_count(
    num_primitives: u32,
    primitive: PrimitiveType,
) -> Result<u32> {
    let count = match primitive {
        PrimitiveType::TriangleList => num_primitives.checked_mul(3),
        PrimitiveType::TriangleStrip => num_primitives.checked_add(2),
        PrimitiveType::LineList => num_primitives.checked_mul(2),
        PrimitiveType::ControlPointPatchList(n) if (1..=MAX_CONTROL_POINTS).contains(&n) => {
            num_primitives.checked_mul(n)
        }
        PrimitiveType::ControlPointPatchList(n) => {
            return Err(RhiError::InvalidControlPointCount(n))
        }
        _ => {
            return Err(RhiError::UnknownPrimitiveType {
                backend: Backend::D3D11,
                primitive,
            })
        }
    };
    count.ok_or(RhiError::InvalidPrimitiveCount {
        primitive,
        num_primitives,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_list_becomes_three_point_patch_when_tessellating() {
        assert_eq!(
            d3d11_topology(PrimitiveType::TriangleList, true).unwrap(),
            PrimitiveTopology::PatchList { control_points: 3 }
        );
        assert_eq!(
            d3d11_topology(PrimitiveType::TriangleList, false).unwrap(),
            PrimitiveTopology::TriangleList
        );
    }

    #[test]
    fn small_patch_lists_need_tessellation() {
        for n in [1, 2] {
            let p = PrimitiveType::ControlPointPatchList(n);
            assert_eq!(
                d3d11_topology(p, true).unwrap(),
                PrimitiveTopology::PatchList { control_points: n }
            );
            assert!(d3d11_topology(p, false).is_err());
        }
    }

    #[test]
    fn strips_and_quads_are_rejected_under_tessellation() {
        for p in [
            PrimitiveType::LineList,
            PrimitiveType::TriangleStrip,
            PrimitiveType::QuadList,
            PrimitiveType::PointSprite,
        ] {
            assert!(matches!(
                d3d11_topology(p, true),
                Err(RhiError::InvalidTessellatedPrimitive { .. })
            ));
        }
    }

    #[test]
    fn vertex_counts() {
        assert_eq!(
            vertex_count_for_primitive_count(4, PrimitiveType::TriangleList).unwrap(),
            12
        );
        assert_eq!(
            vertex_count_for_primitive_count(4, PrimitiveType::TriangleStrip).unwrap(),
            6
        );
        assert_eq!(
            vertex_count_for_primitive_count(4, PrimitiveType::LineList).unwrap(),
            8
        );
        assert_eq!(
            vertex_count_for_primitive_count(4, PrimitiveType::ControlPointPatchList(16)).unwrap(),
            64
        );
        assert!(vertex_count_for_primitive_count(1, PrimitiveType::QuadList).is_err());
        assert!(matches!(
            vertex_count_for_primitive_count(u32::MAX, PrimitiveType::TriangleStrip),
            Err(RhiError::InvalidPrimitiveCount { .. })
        ));
    }

    #[test]
    fn d3d9_rejects_patch_lists() {
        assert!(d3d9_topology(PrimitiveType::ControlPointPatchList(3)).is_err());
        assert_eq!(
            d3d9_topology(PrimitiveType::LineList).unwrap(),
            PrimitiveTopology::LineList
        );
    }
}
