//! Native state object cache.
//!
//! Maps a resolved descriptor key to the driver object created for it. Entries
//! live as long as the cache; there is no eviction, the set of distinct state
//! combinations a renderer uses is small and bounded.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::error::Result;
use crate::state::{
    key_digest, BlendStateDesc, ColorWriteMask, DepthStateDesc, RasterizerStateDesc,
    StencilStateDesc, MAX_SIMULTANEOUS_RENDER_TARGETS,
};
use crate::stats::RhiStats;

/// Rasterizer object key: the descriptor plus the context flags baked into
/// the native object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RasterizerKey {
    pub desc: RasterizerStateDesc,
    pub scissor_enable: bool,
    pub multisample_enable: bool,
}

/// Depth-stencil object key. The stencil reference is stripped; it is a bind
/// time argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DepthStencilKey {
    pub depth: DepthStateDesc,
    pub stencil: StencilStateDesc,
}

impl DepthStencilKey {
    pub fn new(depth: DepthStateDesc, stencil: StencilStateDesc) -> Self {
        Self {
            depth,
            stencil: stencil.without_ref(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendKey {
    pub desc: BlendStateDesc,
    pub color_write_masks: [ColorWriteMask; MAX_SIMULTANEOUS_RENDER_TARGETS],
}

pub struct StateCache<K, V> {
    label: &'static str,
    entries: HashMap<K, V>,
    hits: u64,
    misses: u64,
    stats: Option<Arc<RhiStats>>,
}

impl<K, V> StateCache<K, V>
where
    K: Eq + Hash + fmt::Debug,
    V: Clone,
{
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
            stats: None,
        }
    }

    /// Also report hits and misses to a shared counter set.
    pub fn with_stats(mut self, stats: Arc<RhiStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Returns the object cached for `key`, creating it with `create` on the
    /// first request. A failed creation inserts nothing.
    pub fn get_or_create(&mut self, key: K, create: impl FnOnce(&K) -> Result<V>) -> Result<V> {
        if let Some(v) = self.entries.get(&key) {
            self.hits += 1;
            if let Some(stats) = &self.stats {
                stats.inc_state_cache_hits();
            }
            return Ok(v.clone());
        }

        let value = create(&key)?;
        self.misses += 1;
        if let Some(stats) = &self.stats {
            stats.inc_state_cache_misses();
        }
        tracing::debug!(
            cache = self.label,
            key_hash = key_digest(&key),
            entries = self.entries.len() + 1,
            "state cache miss"
        );
        self.entries.insert(key, value.clone());
        Ok(value)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl<K, V> fmt::Debug for StateCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCache")
            .field("label", &self.label)
            .field("entries", &self.entries.len())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RhiError;
    use crate::state::BlendFactor;

    fn blend_key(desc: BlendStateDesc) -> BlendKey {
        BlendKey {
            desc,
            color_write_masks: [ColorWriteMask::RGBA; MAX_SIMULTANEOUS_RENDER_TARGETS],
        }
    }

    #[test]
    fn same_key_creates_once() {
        let mut cache = StateCache::new("blend");
        let mut created = 0u32;
        let a = cache
            .get_or_create(blend_key(BlendStateDesc::translucent()), |_| {
                created += 1;
                Ok(created)
            })
            .unwrap();
        let b = cache
            .get_or_create(blend_key(BlendStateDesc::translucent()), |_| {
                created += 1;
                Ok(created)
            })
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(created, 1);
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
    }

    #[test]
    fn write_mask_is_part_of_blend_key() {
        let mut cache = StateCache::new("blend");
        let mut key = blend_key(BlendStateDesc::default());
        let first = cache.get_or_create(key, |_| Ok(1u32)).unwrap();
        key.color_write_masks[3] = ColorWriteMask::RGB;
        let second = cache.get_or_create(key, |_| Ok(2u32)).unwrap();
        assert_ne!(first, second);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failed_creation_is_not_cached() {
        let mut cache: StateCache<BlendKey, u32> = StateCache::new("blend");
        let key = blend_key(BlendStateDesc {
            color_dst: BlendFactor::One,
            ..BlendStateDesc::default()
        });
        let err = cache
            .get_or_create(key, |_| Err(RhiError::driver("CreateBlendState", "E_OUTOFMEMORY")))
            .unwrap_err();
        assert!(matches!(err, RhiError::Driver { .. }));
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_create(key, |_| Ok(9)).unwrap(), 9);
    }

    #[test]
    fn stencil_ref_does_not_split_depth_stencil_objects() {
        let mut cache = StateCache::new("depth_stencil");
        let stencil = |stencil_ref| StencilStateDesc {
            enable_front_stencil: true,
            stencil_ref,
            ..StencilStateDesc::default()
        };
        let a = cache
            .get_or_create(DepthStencilKey::new(DepthStateDesc::default(), stencil(1)), |_| {
                Ok(10u32)
            })
            .unwrap();
        let b = cache
            .get_or_create(DepthStencilKey::new(DepthStateDesc::default(), stencil(2)), |_| {
                Ok(20u32)
            })
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn shared_stats_see_hits_and_misses() {
        let stats = Arc::new(RhiStats::new());
        let mut cache = StateCache::new("rasterizer").with_stats(stats.clone());
        let key = RasterizerKey {
            desc: RasterizerStateDesc::default(),
            scissor_enable: false,
            multisample_enable: false,
        };
        cache.get_or_create(key, |_| Ok(())).unwrap();
        cache.get_or_create(key, |_| Ok(())).unwrap();
        let snap = stats.snapshot();
        assert_eq!((snap.state_cache_hits, snap.state_cache_misses), (1, 1));
    }
}
