//! Engine tuning parameters.
//!
//! All values have defaults suitable for an interactive application; none
//! affect correctness, only throughput and memory.

/// Tuning knobs for [`Engine`](crate::Engine).
#[derive(Debug, Clone)]
pub struct Config {
    /// Size of the read-only connection pool (the concurrent reader lane).
    pub reader_pool_size: u32,

    /// Capacity of the commit notification channel. Observations that fall
    /// behind by more than this many commits simply re-evaluate their read
    /// unconditionally, so a small capacity is safe.
    pub notify_capacity: usize,

    /// Buffered emissions per observation before backpressure delays the
    /// next re-evaluation.
    pub observation_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reader_pool_size: 8,
            notify_capacity: 256,
            observation_buffer: 16,
        }
    }
}
