//! Engine configuration.
//!
//! Every tunable the spec calls out — worker pool size, mmap threshold, cache ceiling,
//! operation timeout, the fuzzy-recovery threshold — is passed to the constructor. Nothing here
//! is read from process-wide environment variables.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of blocking-pool slots available for mmap scanning, line indexing, and fsync.
    pub worker_pool_size: usize,
    /// Files at or above this size are served through the mapped-file store.
    pub mmap_threshold_bytes: u64,
    /// Total bytes the byte cache may hold before it starts evicting.
    pub cache_ceiling_bytes: usize,
    /// Upper bound on the cooperative time a single request may spend.
    pub operation_timeout: Duration,
    /// Minimum similarity score for fuzzy target recovery to fire.
    pub fuzzy_threshold: f64,
    /// A parameter removal or required-parameter addition aborts the replace when true.
    pub abort_on_critical_incompatibility: bool,
}

/// The auto-retry loop for a cleaned highlight never runs more than once (Design Notes: make
/// termination obvious via a bounded counter rather than recursion).
pub const MAX_AUTO_RETRIES: u8 = 1;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: num_cpus::get(),
            mmap_threshold_bytes: 1024 * 1024,
            cache_ceiling_bytes: 16 * 1024 * 1024,
            operation_timeout: Duration::from_secs(60),
            fuzzy_threshold: 0.85,
            abort_on_critical_incompatibility: true,
        }
    }
}
