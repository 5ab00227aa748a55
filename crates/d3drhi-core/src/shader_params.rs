//! Shader constant packing shared by both backends.
//!
//! D3D11 writes the view constants as whole constant buffers (the `*ViewConstants`
//! structs below, uploaded with `bytemuck`); D3D9 writes the same values into
//! fixed float registers.

use bytemuck::{Pod, Zeroable};

/// Bytes per float4 constant register.
pub const REGISTER_SIZE: u32 = 16;

/// Floats padded per batch by [`pad_float_array`].
pub const FLOAT_ARRAY_GROUP_SIZE: usize = 64;

/// Constant buffer slot holding the per-view constants on every D3D11 stage.
pub const VIEW_CONSTANT_BUFFER_INDEX: u32 = 1;

// D3D9 vertex shader registers.
pub const VSR_VIEW_PROJ_MATRIX: u32 = 0;
pub const VSR_VIEW_ORIGIN: u32 = 4;
pub const VSR_PRE_VIEW_TRANSLATION: u32 = 5;

// D3D9 pixel shader registers.
pub const PSR_SCREEN_POSITION_SCALE_BIAS: u32 = 1;
pub const PSR_MIN_Z_MAX_Z_RATIO: u32 = 2;
pub const PSR_NV_STEREO_ENABLED: u32 = 3;
pub const PSR_DIFFUSE_OVERRIDE: u32 = 4;
pub const PSR_SPECULAR_OVERRIDE: u32 = 5;
pub const PSR_VIEW_ORIGIN: u32 = 6;
pub const PSR_SCREEN_AND_TEXEL_SIZE: u32 = 7;

/// Per-view inputs to [`set_view_parameters`].
///
/// [`set_view_parameters`]: crate::GraphicsDevice::set_view_parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewParameters {
    /// Translated view-projection matrix, row major.
    pub view_projection: [[f32; 4]; 4],
    pub view_origin: [f32; 4],
    pub pre_view_translation: [f32; 3],
    pub screen_position_scale_bias: [f32; 4],
    /// Inverse device-z to world-z transform.
    pub min_z_max_z_ratio: [f32; 4],
    pub diffuse_override: [f32; 4],
    pub specular_override: [f32; 4],
    pub view_size: [u32; 2],
    pub render_target_size: [u32; 2],
    /// `projection[1][1]`, used by adaptive tessellation.
    pub projection_scale_y: f32,
    pub tessellation_pixels_per_triangle: f32,
    pub stereo_enabled: bool,
}

impl Default for ViewParameters {
    fn default() -> Self {
        Self {
            view_projection: IDENTITY,
            view_origin: [0.0, 0.0, 0.0, 1.0],
            pre_view_translation: [0.0; 3],
            screen_position_scale_bias: [0.5, -0.5, 0.5, 0.5],
            min_z_max_z_ratio: [0.0, 0.0, 1.0, 0.0],
            diffuse_override: [0.0; 4],
            specular_override: [0.0; 4],
            view_size: [1, 1],
            render_target_size: [1, 1],
            projection_scale_y: 1.0,
            tessellation_pixels_per_triangle: 48.0,
            stereo_enabled: false,
        }
    }
}

const IDENTITY: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

impl ViewParameters {
    /// View origin moved into translated world space.
    pub fn translated_view_origin(&self) -> [f32; 4] {
        let [x, y, z, w] = self.view_origin;
        let [tx, ty, tz] = self.pre_view_translation;
        [x + tx, y + ty, z + tz, w]
    }

    pub fn pre_view_translation4(&self) -> [f32; 4] {
        let [x, y, z] = self.pre_view_translation;
        [x, y, z, 0.0]
    }

    pub fn screen_and_texel_size(&self) -> [f32; 4] {
        [
            self.view_size[0] as f32,
            self.view_size[1] as f32,
            1.0 / self.render_target_size[0].max(1) as f32,
            1.0 / self.render_target_size[1].max(1) as f32,
        ]
    }

    fn stereo(&self) -> f32 {
        if self.stereo_enabled {
            1.0
        } else {
            0.0
        }
    }

    pub fn vertex_constants(&self) -> VsViewConstants {
        VsViewConstants {
            view_projection: self.view_projection,
            view_origin: self.translated_view_origin(),
            pre_view_translation: self.pre_view_translation4(),
        }
    }

    pub fn pixel_constants(&self) -> PsViewConstants {
        PsViewConstants {
            screen_position_scale_bias: self.screen_position_scale_bias,
            min_z_max_z_ratio: self.min_z_max_z_ratio,
            diffuse_override: self.diffuse_override,
            specular_override: self.specular_override,
            view_origin: self.view_origin,
            screen_and_texel_size: self.screen_and_texel_size(),
            nv_stereo_enabled: self.stereo(),
            _pad: [0.0; 3],
        }
    }

    pub fn hull_constants(&self) -> HsViewConstants {
        // Pixels per triangle -> pixels per tessellated edge.
        let pixels_per_edge = (2.0 * self.tessellation_pixels_per_triangle).sqrt();
        let adaptive_tessellation_factor = if pixels_per_edge > 0.0 {
            0.5 * self.view_size[1] as f32 / pixels_per_edge
        } else {
            0.0
        };
        HsViewConstants {
            view_projection: self.view_projection,
            adaptive_tessellation_factor,
            projection_scale_y: self.projection_scale_y,
            _pad: [0.0; 2],
        }
    }

    pub fn domain_constants(&self) -> DsViewConstants {
        DsViewConstants {
            view_projection: self.view_projection,
            camera_position: self.translated_view_origin(),
        }
    }

    /// Stereo flag broadcast to all four components (D3D9 register form).
    pub fn stereo_register(&self) -> [f32; 4] {
        [self.stereo(); 4]
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VsViewConstants {
    pub view_projection: [[f32; 4]; 4],
    pub view_origin: [f32; 4],
    pub pre_view_translation: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PsViewConstants {
    pub screen_position_scale_bias: [f32; 4],
    pub min_z_max_z_ratio: [f32; 4],
    pub diffuse_override: [f32; 4],
    pub specular_override: [f32; 4],
    pub view_origin: [f32; 4],
    pub screen_and_texel_size: [f32; 4],
    pub nv_stereo_enabled: f32,
    pub _pad: [f32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct HsViewConstants {
    pub view_projection: [[f32; 4]; 4],
    pub adaptive_tessellation_factor: f32,
    pub projection_scale_y: f32,
    pub _pad: [f32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DsViewConstants {
    pub view_projection: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
}

/// One padded group of a float array: the register-aligned bytes to write at
/// `base_index`.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedFloatGroup {
    pub base_index: u32,
    pub bytes: Vec<u8>,
}

/// Pads every float to its own float4 (`[v, 0, 0, 0]`), in groups of
/// [`FLOAT_ARRAY_GROUP_SIZE`]. `base_index` is a byte offset and advances by
/// one register per value.
pub fn pad_float_array(base_index: u32, values: &[f32]) -> Vec<PaddedFloatGroup> {
    values
        .chunks(FLOAT_ARRAY_GROUP_SIZE)
        .enumerate()
        .map(|(group, chunk)| {
            let padded: Vec<[f32; 4]> = chunk.iter().map(|&v| [v, 0.0, 0.0, 0.0]).collect();
            PaddedFloatGroup {
                base_index: base_index
                    + (group * FLOAT_ARRAY_GROUP_SIZE) as u32 * REGISTER_SIZE,
                bytes: bytemuck::cast_slice(&padded).to_vec(),
            }
        })
        .collect()
}

/// Register index and register count covering `num_bytes` at byte offset
/// `base_index` (D3D9 constant registers are 16 bytes).
pub fn register_span(base_index: u32, num_bytes: usize) -> (u32, u32) {
    let count = (num_bytes as u32).div_ceil(REGISTER_SIZE);
    (base_index / REGISTER_SIZE, count)
}

/// `bool` in shader `BOOL` form.
pub fn bool_constant(value: bool) -> [u8; 4] {
    u32::from(value).to_le_bytes()
}

/// Reinterprets parameter bytes as floats, zero filling a partial tail
/// register.
pub fn bytes_to_registers(bytes: &[u8]) -> Vec<[f32; 4]> {
    bytes
        .chunks(REGISTER_SIZE as usize)
        .map(|chunk| {
            let mut reg = [0u8; REGISTER_SIZE as usize];
            reg[..chunk.len()].copy_from_slice(chunk);
            bytemuck::cast(reg)
        })
        .collect()
}
