//! Pipeline state descriptors.
//!
//! These are plain values: callers build them, the dispatchers compare them
//! structurally and the state cache uses them (plus context flags) as keys.
//! Float fields compare and hash by bit pattern so every descriptor can be a
//! hash-map key.

use std::fmt;
use std::hash::{Hash, Hasher};

use bitflags::bitflags;
use xxhash_rust::xxh3::Xxh3;

/// Number of simultaneously bound colour targets on D3D11 class hardware.
pub const MAX_SIMULTANEOUS_RENDER_TARGETS: usize = 8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FillMode {
    Point,
    Wireframe,
    #[default]
    Solid,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CullMode {
    #[default]
    None,
    Cw,
    Ccw,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Less,
    #[default]
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    Never,
    Always,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    SaturatedIncrement,
    SaturatedDecrement,
    Invert,
    Increment,
    Decrement,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendOperation {
    #[default]
    Add,
    Subtract,
    Min,
    Max,
    ReverseSubtract,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SourceColor,
    InverseSourceColor,
    SourceAlpha,
    InverseSourceAlpha,
    DestAlpha,
    InverseDestAlpha,
    DestColor,
    InverseDestColor,
    ConstantBlendColor,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SamplerFilter {
    #[default]
    Point,
    Bilinear,
    Trilinear,
    AnisotropicPoint,
    AnisotropicLinear,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SamplerAddressMode {
    #[default]
    Wrap,
    Clamp,
    Mirror,
    Border,
}

bitflags! {
    /// Per-target colour channel write mask.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ColorWriteMask: u8 {
        const RED = 0x1;
        const GREEN = 0x2;
        const BLUE = 0x4;
        const ALPHA = 0x8;
        const RGB = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits();
        const RGBA = Self::RGB.bits() | Self::ALPHA.bits();
    }
}

impl Default for ColorWriteMask {
    fn default() -> Self {
        Self::RGBA
    }
}

impl ColorWriteMask {
    pub fn from_enable(enable: bool) -> Self {
        if enable {
            Self::RGBA
        } else {
            Self::empty()
        }
    }
}

/// Linear-space RGBA colour.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LinearColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl LinearColor {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Truncating 8-bit quantisation, clamped per channel: `[r, g, b, a]`.
    pub fn quantize(self) -> [u8; 4] {
        fn channel(v: f32) -> u8 {
            ((v * 255.0) as i32).clamp(0, 255) as u8
        }
        [
            channel(self.r),
            channel(self.g),
            channel(self.b),
            channel(self.a),
        ]
    }

    /// Packed `D3DCOLOR` (A8R8G8B8).
    pub fn to_d3dcolor(self) -> u32 {
        let [r, g, b, a] = self.quantize();
        u32::from_be_bytes([a, r, g, b])
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RasterizerStateDesc {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub depth_bias: f32,
    pub slope_scale_depth_bias: f32,
    pub allow_msaa: bool,
}

impl Default for RasterizerStateDesc {
    fn default() -> Self {
        Self {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::None,
            depth_bias: 0.0,
            slope_scale_depth_bias: 0.0,
            allow_msaa: true,
        }
    }
}

impl PartialEq for RasterizerStateDesc {
    fn eq(&self, other: &Self) -> bool {
        self.fill_mode == other.fill_mode
            && self.cull_mode == other.cull_mode
            && self.depth_bias.to_bits() == other.depth_bias.to_bits()
            && self.slope_scale_depth_bias.to_bits() == other.slope_scale_depth_bias.to_bits()
            && self.allow_msaa == other.allow_msaa
    }
}

impl Eq for RasterizerStateDesc {}

impl Hash for RasterizerStateDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fill_mode.hash(state);
        self.cull_mode.hash(state);
        self.depth_bias.to_bits().hash(state);
        self.slope_scale_depth_bias.to_bits().hash(state);
        self.allow_msaa.hash(state);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DepthStateDesc {
    pub enable_depth_write: bool,
    pub depth_test: CompareFunction,
}

impl Default for DepthStateDesc {
    fn default() -> Self {
        Self {
            enable_depth_write: true,
            depth_test: CompareFunction::LessEqual,
        }
    }
}

impl DepthStateDesc {
    /// Depth testing is enabled unless the test always passes and nothing is
    /// written.
    pub fn depth_enable(&self) -> bool {
        self.depth_test != CompareFunction::Always || self.enable_depth_write
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StencilFaceDesc {
    pub test: CompareFunction,
    pub fail_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub pass_op: StencilOp,
}

impl Default for StencilFaceDesc {
    fn default() -> Self {
        Self {
            test: CompareFunction::Always,
            fail_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
        }
    }
}

/// Stencil state. `stencil_ref` travels with the descriptor but is applied
/// at bind time, so it is not part of the cached object key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StencilStateDesc {
    pub enable_front_stencil: bool,
    pub front: StencilFaceDesc,
    pub enable_back_stencil: bool,
    pub back: StencilFaceDesc,
    pub read_mask: u32,
    pub write_mask: u32,
    pub stencil_ref: u32,
}

impl Default for StencilStateDesc {
    fn default() -> Self {
        Self {
            enable_front_stencil: false,
            front: StencilFaceDesc::default(),
            enable_back_stencil: false,
            back: StencilFaceDesc::default(),
            read_mask: 0xFFFF_FFFF,
            write_mask: 0xFFFF_FFFF,
            stencil_ref: 0,
        }
    }
}

impl StencilStateDesc {
    /// The part of the descriptor baked into a native depth-stencil object.
    pub fn without_ref(&self) -> Self {
        Self {
            stencil_ref: 0,
            ..*self
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BlendStateDesc {
    pub color_op: BlendOperation,
    pub color_src: BlendFactor,
    pub color_dst: BlendFactor,
    pub alpha_op: BlendOperation,
    pub alpha_src: BlendFactor,
    pub alpha_dst: BlendFactor,
    pub alpha_test: CompareFunction,
    pub alpha_ref: u8,
    pub constant_color: LinearColor,
}

impl Default for BlendStateDesc {
    fn default() -> Self {
        Self {
            color_op: BlendOperation::Add,
            color_src: BlendFactor::One,
            color_dst: BlendFactor::Zero,
            alpha_op: BlendOperation::Add,
            alpha_src: BlendFactor::One,
            alpha_dst: BlendFactor::Zero,
            alpha_test: CompareFunction::Always,
            alpha_ref: 0,
            constant_color: LinearColor::WHITE,
        }
    }
}

impl BlendStateDesc {
    /// Translucent "src alpha, inverse src alpha" blending.
    pub fn translucent() -> Self {
        Self {
            color_src: BlendFactor::SourceAlpha,
            color_dst: BlendFactor::InverseSourceAlpha,
            ..Self::default()
        }
    }

    pub fn blend_enable(&self) -> bool {
        self.color_op != BlendOperation::Add
            || self.color_src != BlendFactor::One
            || self.color_dst != BlendFactor::Zero
            || self.separate_alpha_blend_enable()
    }

    pub fn separate_alpha_blend_enable(&self) -> bool {
        self.alpha_op != self.color_op
            || self.alpha_src != self.color_src
            || self.alpha_dst != self.color_dst
    }

    pub fn alpha_test_enable(&self) -> bool {
        self.alpha_test != CompareFunction::Always
    }
}

impl PartialEq for BlendStateDesc {
    fn eq(&self, other: &Self) -> bool {
        self.color_op == other.color_op
            && self.color_src == other.color_src
            && self.color_dst == other.color_dst
            && self.alpha_op == other.alpha_op
            && self.alpha_src == other.alpha_src
            && self.alpha_dst == other.alpha_dst
            && self.alpha_test == other.alpha_test
            && self.alpha_ref == other.alpha_ref
            && color_bits(self.constant_color) == color_bits(other.constant_color)
    }
}

impl Eq for BlendStateDesc {}

impl Hash for BlendStateDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.color_op.hash(state);
        self.color_src.hash(state);
        self.color_dst.hash(state);
        self.alpha_op.hash(state);
        self.alpha_src.hash(state);
        self.alpha_dst.hash(state);
        self.alpha_test.hash(state);
        self.alpha_ref.hash(state);
        color_bits(self.constant_color).hash(state);
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SamplerStateDesc {
    pub filter: SamplerFilter,
    pub address_u: SamplerAddressMode,
    pub address_v: SamplerAddressMode,
    pub address_w: SamplerAddressMode,
    pub mip_bias: f32,
    pub max_anisotropy: u32,
    pub border_color: u32,
    pub compare: Option<CompareFunction>,
}

impl Default for SamplerStateDesc {
    fn default() -> Self {
        Self {
            filter: SamplerFilter::Point,
            address_u: SamplerAddressMode::Wrap,
            address_v: SamplerAddressMode::Wrap,
            address_w: SamplerAddressMode::Wrap,
            mip_bias: 0.0,
            max_anisotropy: 0,
            border_color: 0,
            compare: None,
        }
    }
}

impl PartialEq for SamplerStateDesc {
    fn eq(&self, other: &Self) -> bool {
        self.filter == other.filter
            && self.address_u == other.address_u
            && self.address_v == other.address_v
            && self.address_w == other.address_w
            && self.mip_bias.to_bits() == other.mip_bias.to_bits()
            && self.max_anisotropy == other.max_anisotropy
            && self.border_color == other.border_color
            && self.compare == other.compare
    }
}

impl Eq for SamplerStateDesc {}

impl Hash for SamplerStateDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.filter.hash(state);
        self.address_u.hash(state);
        self.address_v.hash(state);
        self.address_w.hash(state);
        self.mip_bias.to_bits().hash(state);
        self.max_anisotropy.hash(state);
        self.border_color.hash(state);
        self.compare.hash(state);
    }
}

fn color_bits(c: LinearColor) -> [u32; 4] {
    [c.r.to_bits(), c.g.to_bits(), c.b.to_bits(), c.a.to_bits()]
}

/// Stable 64-bit digest of a state key, used to correlate log lines.
pub fn key_digest<K: Hash + ?Sized>(key: &K) -> u64 {
    let mut hasher = Xxh3::new();
    key.hash(&mut hasher);
    hasher.finish()
}

impl fmt::Display for CompareFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareFunction::Less => "less",
            CompareFunction::LessEqual => "less_equal",
            CompareFunction::Greater => "greater",
            CompareFunction::GreaterEqual => "greater_equal",
            CompareFunction::Equal => "equal",
            CompareFunction::NotEqual => "not_equal",
            CompareFunction::Never => "never",
            CompareFunction::Always => "always",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_truncates_and_clamps() {
        let c = LinearColor::new(1.5, 0.5, -1.0, 1.0);
        assert_eq!(c.quantize(), [255, 127, 0, 255]);
        assert_eq!(LinearColor::new(1.0, 0.0, 0.0, 1.0).to_d3dcolor(), 0xFFFF_0000);
    }

    #[test]
    fn float_fields_compare_by_bits() {
        let a = RasterizerStateDesc {
            depth_bias: 0.0,
            ..Default::default()
        };
        let b = RasterizerStateDesc {
            depth_bias: -0.0,
            ..Default::default()
        };
        assert_ne!(a, b);
        assert_eq!(a, a);
        assert_ne!(key_digest(&a), key_digest(&b));
    }

    #[test]
    fn stencil_ref_is_not_part_of_object_key() {
        let a = StencilStateDesc {
            stencil_ref: 3,
            ..Default::default()
        };
        let b = StencilStateDesc {
            stencil_ref: 7,
            ..Default::default()
        };
        assert_ne!(a, b);
        assert_eq!(a.without_ref(), b.without_ref());
    }

    #[test]
    fn default_blend_is_opaque() {
        let opaque = BlendStateDesc::default();
        assert!(!opaque.blend_enable());
        assert!(!opaque.alpha_test_enable());

        let translucent = BlendStateDesc::translucent();
        assert!(translucent.blend_enable());
        assert!(translucent.separate_alpha_blend_enable());
    }
}
