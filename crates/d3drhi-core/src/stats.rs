use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the RHI dispatchers.
///
/// Updated on the render thread with relaxed atomics; a shared `Arc<RhiStats>`
/// can be snapshotted from anywhere.
#[derive(Debug, Default)]
pub struct RhiStats {
    draw_calls: AtomicU64,
    triangles: AtomicU64,
    lines: AtomicU64,
    state_cache_hits: AtomicU64,
    state_cache_misses: AtomicU64,
    render_target_rebinds: AtomicU64,
    constant_buffer_uploads: AtomicU64,
    ring_discards: AtomicU64,
    draws_skipped_device_lost: AtomicU64,
}

impl RhiStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_draw_calls(&self) {
        self.draw_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts `num_primitives` as lines or triangles.
    pub fn add_primitives(&self, num_primitives: u32, is_line: bool) {
        let counter = if is_line { &self.lines } else { &self.triangles };
        counter.fetch_add(u64::from(num_primitives), Ordering::Relaxed);
    }

    pub fn inc_state_cache_hits(&self) {
        self.state_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_state_cache_misses(&self) {
        self.state_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_render_target_rebinds(&self) {
        self.render_target_rebinds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_constant_buffer_uploads(&self) {
        self.constant_buffer_uploads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ring_discards(&self) {
        self.ring_discards.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_draws_skipped_device_lost(&self) {
        self.draws_skipped_device_lost
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RhiStatsSnapshot {
        RhiStatsSnapshot {
            draw_calls: self.draw_calls.load(Ordering::Relaxed),
            triangles: self.triangles.load(Ordering::Relaxed),
            lines: self.lines.load(Ordering::Relaxed),
            state_cache_hits: self.state_cache_hits.load(Ordering::Relaxed),
            state_cache_misses: self.state_cache_misses.load(Ordering::Relaxed),
            render_target_rebinds: self.render_target_rebinds.load(Ordering::Relaxed),
            constant_buffer_uploads: self.constant_buffer_uploads.load(Ordering::Relaxed),
            ring_discards: self.ring_discards.load(Ordering::Relaxed),
            draws_skipped_device_lost: self
                .draws_skipped_device_lost
                .load(Ordering::Relaxed),
        }
    }

    /// Returns a JSON object as a string.
    pub fn to_json(&self) -> String {
        self.snapshot().to_json()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RhiStatsSnapshot {
    pub draw_calls: u64,
    pub triangles: u64,
    pub lines: u64,
    pub state_cache_hits: u64,
    pub state_cache_misses: u64,
    pub render_target_rebinds: u64,
    pub constant_buffer_uploads: u64,
    pub ring_discards: u64,
    pub draws_skipped_device_lost: u64,
}

impl RhiStatsSnapshot {
    pub fn to_json(self) -> String {
        format!(
            "{{\"draw_calls\":{},\"triangles\":{},\"lines\":{},\"state_cache\":{{\"hits\":{},\"misses\":{}}},\"render_target_rebinds\":{},\"constant_buffer_uploads\":{},\"ring_discards\":{},\"draws_skipped_device_lost\":{}}}",
            self.draw_calls,
            self.triangles,
            self.lines,
            self.state_cache_hits,
            self.state_cache_misses,
            self.render_target_rebinds,
            self.constant_buffer_uploads,
            self.ring_discards,
            self.draws_skipped_device_lost,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_json_contains_counters() {
        let stats = RhiStats::new();
        stats.inc_draw_calls();
        stats.add_primitives(4, false);
        stats.add_primitives(2, true);
        stats.inc_state_cache_misses();
        stats.inc_state_cache_hits();
        stats.inc_state_cache_hits();

        let snap = stats.snapshot();
        assert_eq!(snap.triangles, 4);
        assert_eq!(snap.lines, 2);

        let json = stats.to_json();
        assert!(json.contains("\"draw_calls\":1"));
        assert!(json.contains("\"state_cache\":{\"hits\":2,\"misses\":1}"));
        assert!(json.contains("\"ring_discards\":0"));
    }
}
