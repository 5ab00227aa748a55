/// Environment variable overriding [`RhiConfig::paranoid_device_lost_checking`].
pub const PARANOID_DEVICE_LOST_ENV: &str = "D3DRHI_PARANOID_DEVICE_LOST";
/// Environment variable overriding [`RhiConfig::user_data_buffer_size`] (bytes).
pub const USER_DATA_BUFFER_SIZE_ENV: &str = "D3DRHI_USER_DATA_BUFFER_SIZE";
/// Environment variable overriding [`RhiConfig::disable_scissor`].
pub const DISABLE_SCISSOR_ENV: &str = "D3DRHI_DISABLE_SCISSOR";

#[derive(Debug, Clone, PartialEq)]
pub struct RhiConfig {
    /// Capacity of each dynamic vertex/index pool buffer, in bytes.
    pub user_data_buffer_size: u32,
    /// Pool buffers per binding kind.
    pub num_user_data_buffers: usize,
    /// Size of every constant buffer slot, in bytes.
    pub constant_buffer_size: u32,
    /// Query the cooperative level before every draw (D3D9).
    pub paranoid_device_lost_checking: bool,
    /// Hardware stream frequency dividers are available (D3D9).
    pub supports_vertex_instancing: bool,
    /// The NVDB depth-bounds extension is available (D3D9).
    pub depth_bounds_supported: bool,
    /// Added to every rasterizer depth bias (D3D9).
    pub depth_bias_offset: f32,
    /// Forces scissor testing off, used while taking tiled screenshots.
    pub disable_scissor: bool,
}

impl Default for RhiConfig {
    fn default() -> Self {
        Self {
            user_data_buffer_size: 1024 * 1024,
            num_user_data_buffers: 3,
            constant_buffer_size: 4096,
            paranoid_device_lost_checking: true,
            supports_vertex_instancing: true,
            depth_bounds_supported: false,
            depth_bias_offset: 0.0,
            disable_scissor: false,
        }
    }
}

impl RhiConfig {
    /// Defaults overlaid with any `D3DRHI_*` environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok());
        config
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup(PARANOID_DEVICE_LOST_ENV) {
            self.paranoid_device_lost_checking = truthy(&v);
        }
        if let Some(v) = lookup(DISABLE_SCISSOR_ENV) {
            self.disable_scissor = truthy(&v);
        }
        if let Some(v) = lookup(USER_DATA_BUFFER_SIZE_ENV) {
            match v.trim().parse::<u32>() {
                Ok(size) if size > 0 => self.user_data_buffer_size = size,
                _ => tracing::warn!(
                    value = %v,
                    "ignoring invalid {USER_DATA_BUFFER_SIZE_ENV}"
                ),
            }
        }
    }
}

fn truthy(raw: &str) -> bool {
    let v = raw.trim();
    v == "1"
        || v.eq_ignore_ascii_case("true")
        || v.eq_ignore_ascii_case("yes")
        || v.eq_ignore_ascii_case("on")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with(vars: &'static [(&'static str, &'static str)]) -> RhiConfig {
        let mut config = RhiConfig::default();
        config.apply_overrides(|name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        });
        config
    }

    #[test]
    fn defaults() {
        let config = RhiConfig::default();
        assert_eq!(config.user_data_buffer_size, 1 << 20);
        assert_eq!(config.num_user_data_buffers, 3);
        assert!(config.paranoid_device_lost_checking);
        assert!(!config.depth_bounds_supported);
    }

    #[test]
    fn env_overrides() {
        let config = with(&[
            (PARANOID_DEVICE_LOST_ENV, "off"),
            (DISABLE_SCISSOR_ENV, "YES"),
            (USER_DATA_BUFFER_SIZE_ENV, " 65536 "),
        ]);
        assert!(!config.paranoid_device_lost_checking);
        assert!(config.disable_scissor);
        assert_eq!(config.user_data_buffer_size, 65536);
    }

    #[test]
    fn invalid_buffer_size_is_ignored() {
        let config = with(&[(USER_DATA_BUFFER_SIZE_ENV, "0")]);
        assert_eq!(config.user_data_buffer_size, 1 << 20);
        let config = with(&[(USER_DATA_BUFFER_SIZE_ENV, "lots")]);
        assert_eq!(config.user_data_buffer_size, 1 << 20);
    }
}
