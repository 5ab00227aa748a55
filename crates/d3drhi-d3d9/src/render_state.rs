//! Descriptor to render/sampler state translation.
//!
//! Each `*_render_states` function returns the `(D3DRS_*, value)` pairs a
//! set-state verb writes, in the order they are written.

use d3drhi_core::state::{
    BlendFactor, BlendOperation, BlendStateDesc, ColorWriteMask, CompareFunction, CullMode,
    DepthStateDesc, FillMode, RasterizerStateDesc, SamplerAddressMode, SamplerFilter,
    SamplerStateDesc, StencilOp, StencilStateDesc,
};

use crate::consts::*;

pub type RenderStateWrite = (u32, u32);

pub fn compare_function(func: CompareFunction) -> u32 {
    match func {
        CompareFunction::Never => D3DCMP_NEVER,
        CompareFunction::Less => D3DCMP_LESS,
        CompareFunction::Equal => D3DCMP_EQUAL,
        CompareFunction::LessEqual => D3DCMP_LESSEQUAL,
        CompareFunction::Greater => D3DCMP_GREATER,
        CompareFunction::NotEqual => D3DCMP_NOTEQUAL,
        CompareFunction::GreaterEqual => D3DCMP_GREATEREQUAL,
        CompareFunction::Always => D3DCMP_ALWAYS,
    }
}

pub fn stencil_op(op: StencilOp) -> u32 {
    match op {
        StencilOp::Keep => D3DSTENCILOP_KEEP,
        StencilOp::Zero => D3DSTENCILOP_ZERO,
        StencilOp::Replace => D3DSTENCILOP_REPLACE,
        StencilOp::SaturatedIncrement => D3DSTENCILOP_INCRSAT,
        StencilOp::SaturatedDecrement => D3DSTENCILOP_DECRSAT,
        StencilOp::Invert => D3DSTENCILOP_INVERT,
        StencilOp::Increment => D3DSTENCILOP_INCR,
        StencilOp::Decrement => D3DSTENCILOP_DECR,
    }
}

pub fn blend_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => D3DBLEND_ZERO,
        BlendFactor::One => D3DBLEND_ONE,
        BlendFactor::SourceColor => D3DBLEND_SRCCOLOR,
        BlendFactor::InverseSourceColor => D3DBLEND_INVSRCCOLOR,
        BlendFactor::SourceAlpha => D3DBLEND_SRCALPHA,
        BlendFactor::InverseSourceAlpha => D3DBLEND_INVSRCALPHA,
        BlendFactor::DestAlpha => D3DBLEND_DESTALPHA,
        BlendFactor::InverseDestAlpha => D3DBLEND_INVDESTALPHA,
        BlendFactor::DestColor => D3DBLEND_DESTCOLOR,
        BlendFactor::InverseDestColor => D3DBLEND_INVDESTCOLOR,
        BlendFactor::ConstantBlendColor => D3DBLEND_BLENDFACTOR,
    }
}

pub fn blend_op(op: BlendOperation) -> u32 {
    match op {
        BlendOperation::Add => D3DBLENDOP_ADD,
        BlendOperation::Subtract => D3DBLENDOP_SUBTRACT,
        BlendOperation::ReverseSubtract => D3DBLENDOP_REVSUBTRACT,
        BlendOperation::Min => D3DBLENDOP_MIN,
        BlendOperation::Max => D3DBLENDOP_MAX,
    }
}

fn fill_mode(mode: FillMode) -> u32 {
    match mode {
        FillMode::Point => D3DFILL_POINT,
        FillMode::Wireframe => D3DFILL_WIREFRAME,
        FillMode::Solid => D3DFILL_SOLID,
    }
}

fn cull_mode(mode: CullMode) -> u32 {
    match mode {
        CullMode::None => D3DCULL_NONE,
        CullMode::Cw => D3DCULL_CW,
        CullMode::Ccw => D3DCULL_CCW,
    }
}

fn address_mode(mode: SamplerAddressMode) -> u32 {
    match mode {
        SamplerAddressMode::Wrap => D3DTADDRESS_WRAP,
        SamplerAddressMode::Clamp => D3DTADDRESS_CLAMP,
        SamplerAddressMode::Mirror => D3DTADDRESS_MIRROR,
        SamplerAddressMode::Border => D3DTADDRESS_BORDER,
    }
}

/// `D3DCOLORWRITEENABLE_*` bits share the mask's bit layout.
pub fn color_write_enable(mask: ColorWriteMask) -> u32 {
    u32::from(mask.bits())
}

pub fn rasterizer_render_states(
    desc: &RasterizerStateDesc,
    depth_bias_offset: f32,
) -> [RenderStateWrite; 4] {
    [
        (D3DRS_FILLMODE, fill_mode(desc.fill_mode)),
        (D3DRS_CULLMODE, cull_mode(desc.cull_mode)),
        (
            D3DRS_DEPTHBIAS,
            (desc.depth_bias + depth_bias_offset).to_bits(),
        ),
        (
            D3DRS_SLOPESCALEDEPTHBIAS,
            desc.slope_scale_depth_bias.to_bits(),
        ),
    ]
}

pub fn depth_render_states(desc: &DepthStateDesc) -> [RenderStateWrite; 3] {
    [
        (D3DRS_ZENABLE, u32::from(desc.depth_enable())),
        (D3DRS_ZWRITEENABLE, u32::from(desc.enable_depth_write)),
        (D3DRS_ZFUNC, compare_function(desc.depth_test)),
    ]
}

/// Front face on the clockwise states, back face on the `CCW_*` states.
pub fn stencil_render_states(desc: &StencilStateDesc) -> [RenderStateWrite; 13] {
    [
        (D3DRS_STENCILENABLE, u32::from(desc.enable_front_stencil)),
        (D3DRS_STENCILFUNC, compare_function(desc.front.test)),
        (D3DRS_STENCILFAIL, stencil_op(desc.front.fail_op)),
        (D3DRS_STENCILZFAIL, stencil_op(desc.front.depth_fail_op)),
        (D3DRS_STENCILPASS, stencil_op(desc.front.pass_op)),
        (D3DRS_TWOSIDEDSTENCILMODE, u32::from(desc.enable_back_stencil)),
        (D3DRS_CCW_STENCILFUNC, compare_function(desc.back.test)),
        (D3DRS_CCW_STENCILFAIL, stencil_op(desc.back.fail_op)),
        (D3DRS_CCW_STENCILZFAIL, stencil_op(desc.back.depth_fail_op)),
        (D3DRS_CCW_STENCILPASS, stencil_op(desc.back.pass_op)),
        (D3DRS_STENCILMASK, desc.read_mask),
        (D3DRS_STENCILWRITEMASK, desc.write_mask),
        (D3DRS_STENCILREF, desc.stencil_ref),
    ]
}

pub fn blend_render_states(desc: &BlendStateDesc) -> [RenderStateWrite; 12] {
    [
        (D3DRS_ALPHABLENDENABLE, u32::from(desc.blend_enable())),
        (D3DRS_BLENDOP, blend_op(desc.color_op)),
        (D3DRS_SRCBLEND, blend_factor(desc.color_src)),
        (D3DRS_DESTBLEND, blend_factor(desc.color_dst)),
        (
            D3DRS_SEPARATEALPHABLENDENABLE,
            u32::from(desc.separate_alpha_blend_enable()),
        ),
        (D3DRS_BLENDOPALPHA, blend_op(desc.alpha_op)),
        (D3DRS_SRCBLENDALPHA, blend_factor(desc.alpha_src)),
        (D3DRS_DESTBLENDALPHA, blend_factor(desc.alpha_dst)),
        (D3DRS_ALPHATESTENABLE, u32::from(desc.alpha_test_enable())),
        (D3DRS_ALPHAFUNC, compare_function(desc.alpha_test)),
        (D3DRS_ALPHAREF, u32::from(desc.alpha_ref)),
        (D3DRS_BLENDFACTOR, desc.constant_color.to_d3dcolor()),
    ]
}

/// `(min, mag, mip)` filters for a sampler filter mode.
pub fn texture_filters(filter: SamplerFilter) -> (u32, u32, u32) {
    match filter {
        SamplerFilter::Point => (D3DTEXF_POINT, D3DTEXF_POINT, D3DTEXF_POINT),
        SamplerFilter::Bilinear => (D3DTEXF_LINEAR, D3DTEXF_LINEAR, D3DTEXF_POINT),
        SamplerFilter::Trilinear => (D3DTEXF_LINEAR, D3DTEXF_LINEAR, D3DTEXF_LINEAR),
        SamplerFilter::AnisotropicPoint => (D3DTEXF_ANISOTROPIC, D3DTEXF_LINEAR, D3DTEXF_POINT),
        SamplerFilter::AnisotropicLinear => {
            (D3DTEXF_ANISOTROPIC, D3DTEXF_LINEAR, D3DTEXF_LINEAR)
        }
    }
}

/// Per-bind sampler inputs that are not part of the sampler descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerBindParams {
    pub mip_bias: f32,
    pub largest_mip: f32,
    pub force_linear_min_filter: bool,
    pub srgb: bool,
}

/// `(D3DSAMP_*, value)` pairs for a pixel sampler bind.
///
/// A descriptor without its own mip bias takes the bind-time bias; a
/// fractional bind-time bias forces linear min and mip filtering.
pub fn sampler_states(
    desc: &SamplerStateDesc,
    params: &SamplerBindParams,
) -> [RenderStateWrite; 11] {
    let (mut min_filter, mag_filter, mut mip_filter) = texture_filters(desc.filter);
    let state_has_bias = desc.mip_bias != 0.0;
    if !state_has_bias && params.mip_bias.trunc() != params.mip_bias {
        min_filter = D3DTEXF_LINEAR;
        mip_filter = D3DTEXF_LINEAR;
    }
    if params.force_linear_min_filter {
        min_filter = D3DTEXF_LINEAR;
    }
    let mip_bias = if state_has_bias {
        desc.mip_bias
    } else {
        params.mip_bias
    };
    let max_mip_level = if params.largest_mip < 0.0 {
        0
    } else {
        params.largest_mip as u32
    };
    [
        (D3DSAMP_SRGBTEXTURE, u32::from(params.srgb)),
        (D3DSAMP_MAGFILTER, mag_filter),
        (D3DSAMP_MINFILTER, min_filter),
        (D3DSAMP_MIPFILTER, mip_filter),
        (D3DSAMP_ADDRESSU, address_mode(desc.address_u)),
        (D3DSAMP_ADDRESSV, address_mode(desc.address_v)),
        (D3DSAMP_ADDRESSW, address_mode(desc.address_w)),
        (D3DSAMP_MIPMAPLODBIAS, mip_bias.to_bits()),
        (D3DSAMP_MAXMIPLEVEL, max_mip_level),
        (D3DSAMP_MAXANISOTROPY, desc.max_anisotropy.max(1)),
        (D3DSAMP_BORDERCOLOR, desc.border_color),
    ]
}

/// Converts clip-space depth bounds to NDC, clamped to `[0, 1]`.
pub fn depth_bounds_ndc(clip_space_near: [f32; 4], clip_space_far: [f32; 4]) -> (f32, f32) {
    let min_z = (clip_space_near[2].max(0.0) / clip_space_near[3]).clamp(0.0, 1.0);
    let max_z = (clip_space_far[2] / clip_space_far[3]).clamp(0.0, 1.0);
    (min_z, max_z)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_of(writes: &[RenderStateWrite], state: u32) -> u32 {
        writes
            .iter()
            .find(|(s, _)| *s == state)
            .map(|(_, v)| *v)
            .unwrap()
    }

    #[test]
    fn depth_bias_offset_is_added() {
        let desc = RasterizerStateDesc {
            depth_bias: 0.5,
            ..RasterizerStateDesc::default()
        };
        let writes = rasterizer_render_states(&desc, 0.25);
        assert_eq!(f32::from_bits(value_of(&writes, D3DRS_DEPTHBIAS)), 0.75);
        assert_eq!(value_of(&writes, D3DRS_FILLMODE), D3DFILL_SOLID);
        assert_eq!(value_of(&writes, D3DRS_CULLMODE), D3DCULL_NONE);
    }

    #[test]
    fn always_without_writes_disables_z() {
        let desc = DepthStateDesc {
            enable_depth_write: false,
            depth_test: CompareFunction::Always,
        };
        assert_eq!(value_of(&depth_render_states(&desc), D3DRS_ZENABLE), 0);
        assert_eq!(
            value_of(&depth_render_states(&DepthStateDesc::default()), D3DRS_ZFUNC),
            D3DCMP_LESSEQUAL
        );
    }

    #[test]
    fn blend_factor_is_packed_d3dcolor() {
        let writes = blend_render_states(&BlendStateDesc::translucent());
        assert_eq!(value_of(&writes, D3DRS_ALPHABLENDENABLE), 1);
        assert_eq!(value_of(&writes, D3DRS_SRCBLEND), D3DBLEND_SRCALPHA);
        assert_eq!(value_of(&writes, D3DRS_BLENDFACTOR), 0xFFFF_FFFF);
    }

    #[test]
    fn fractional_mip_bias_forces_linear() {
        let desc = SamplerStateDesc::default();
        let mut params = SamplerBindParams {
            mip_bias: 1.0,
            largest_mip: -1.0,
            force_linear_min_filter: false,
            srgb: false,
        };
        let whole = sampler_states(&desc, &params);
        assert_eq!(value_of(&whole, D3DSAMP_MINFILTER), D3DTEXF_POINT);
        assert_eq!(value_of(&whole, D3DSAMP_MIPFILTER), D3DTEXF_POINT);
        assert_eq!(value_of(&whole, D3DSAMP_MAXMIPLEVEL), 0);

        params.mip_bias = 0.5;
        let fractional = sampler_states(&desc, &params);
        assert_eq!(value_of(&fractional, D3DSAMP_MINFILTER), D3DTEXF_LINEAR);
        assert_eq!(value_of(&fractional, D3DSAMP_MIPFILTER), D3DTEXF_LINEAR);
        assert_eq!(
            f32::from_bits(value_of(&fractional, D3DSAMP_MIPMAPLODBIAS)),
            0.5
        );
    }

    #[test]
    fn descriptor_mip_bias_wins() {
        let desc = SamplerStateDesc {
            mip_bias: -1.0,
            ..SamplerStateDesc::default()
        };
        let params = SamplerBindParams {
            mip_bias: 0.5,
            largest_mip: 2.7,
            force_linear_min_filter: false,
            srgb: true,
        };
        let writes = sampler_states(&desc, &params);
        assert_eq!(value_of(&writes, D3DSAMP_MINFILTER), D3DTEXF_POINT);
        assert_eq!(f32::from_bits(value_of(&writes, D3DSAMP_MIPMAPLODBIAS)), -1.0);
        assert_eq!(value_of(&writes, D3DSAMP_MAXMIPLEVEL), 2);
        assert_eq!(value_of(&writes, D3DSAMP_SRGBTEXTURE), 1);
    }

    #[test]
    fn depth_bounds_clamp_to_unit_range() {
        assert_eq!(
            depth_bounds_ndc([0.0, 0.0, -1.0, 1.0], [0.0, 0.0, 4.0, 2.0]),
            (0.0, 1.0)
        );
        assert_eq!(
            depth_bounds_ndc([0.0, 0.0, 1.0, 4.0], [0.0, 0.0, 1.0, 2.0]),
            (0.25, 0.5)
        );
    }

    #[test]
    fn nvdb_fourcc() {
        assert_eq!(NVDB_FOURCC, 0x4244_564E);
    }
}
