//! Session configuration.
//!
//! [`SessionConfig`] collects the tile geometry, streaming range, thread budget and
//! cache policy used by [`crate::session::Session`]. Build it with the `with_*`
//! methods and check it with [`SessionConfig::validate`].
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for a generation session.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Edge length of one chunk in world units.
    pub chunk_size: f32,
    /// Number of raster cells along one chunk edge.
    pub resolution: usize,
    /// Generation radius around each viewpoint in world units.
    pub generate_range: f32,
    /// Extra chunks kept alive on every side beyond the generation range.
    pub stock_margin: i32,
    /// Relocate unused chunks instead of destroying and recreating them.
    pub allow_move: bool,
    /// Maximum number of chunk workers running at the same time.
    ///
    /// Only read when `multithreading` is on. Inline sessions ignore it and run every
    /// waiting chunk within a single tick.
    pub max_threads: usize,
    /// Run generation on background threads. When off, every waiting chunk's pass runs
    /// inside `tick`, with no `max_threads` limit.
    pub multithreading: bool,
    /// Keep per-node results after apply so later edits only recompute what changed.
    pub save_intermediate: bool,
    /// Number of apply steps executed per tick.
    pub apply_steps_per_tick: usize,
    /// Ticks to wait before restarting a chunk whose pass failed.
    pub retry_delay_ticks: u64,
    /// Base seed mixed with chunk coordinates.
    pub seed: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100.0,
            resolution: 64,
            generate_range: 200.0,
            stock_margin: 1,
            allow_move: true,
            max_threads: 3,
            multithreading: true,
            save_intermediate: true,
            apply_steps_per_tick: 8,
            retry_delay_ticks: 30,
            seed: 12345,
        }
    }
}

impl SessionConfig {
    /// Creates a new [`SessionConfig`] with the specified chunk size and resolution.
    pub fn new(chunk_size: f32, resolution: usize) -> Self {
        Self {
            chunk_size,
            resolution,
            ..Default::default()
        }
    }

    /// Sets the generation range.
    pub fn with_generate_range(mut self, generate_range: f32) -> Self {
        self.generate_range = generate_range;
        self
    }

    /// Sets the stock margin in chunks.
    pub fn with_stock_margin(mut self, stock_margin: i32) -> Self {
        self.stock_margin = stock_margin;
        self
    }

    /// Enables or disables chunk relocation on deploy.
    pub fn with_allow_move(mut self, allow_move: bool) -> Self {
        self.allow_move = allow_move;
        self
    }

    /// Sets the worker budget. Has no effect while multithreading is off.
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Enables or disables background generation threads.
    ///
    /// With threads disabled `max_threads` is ignored: each tick evaluates all chunks that
    /// are waiting to start, nearest first, before the apply step.
    pub fn with_multithreading(mut self, multithreading: bool) -> Self {
        self.multithreading = multithreading;
        self
    }

    /// Keeps or drops per-node results after apply.
    pub fn with_save_intermediate(mut self, save_intermediate: bool) -> Self {
        self.save_intermediate = save_intermediate;
        self
    }

    /// Sets how many apply steps run per tick.
    pub fn with_apply_steps_per_tick(mut self, steps: usize) -> Self {
        self.apply_steps_per_tick = steps;
        self
    }

    /// Sets the retry delay for failed chunks.
    pub fn with_retry_delay_ticks(mut self, ticks: u64) -> Self {
        self.retry_delay_ticks = ticks;
        self
    }

    /// Sets the base seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Generation range expressed in whole chunks.
    pub fn range_in_chunks(&self) -> i32 {
        (self.generate_range / self.chunk_size).ceil().max(0.0) as i32
    }

    /// Validates the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if !self.chunk_size.is_finite() || self.chunk_size <= 0.0 {
            return Err(Error::InvalidConfig("chunk_size must be > 0".into()));
        }
        if self.resolution == 0 {
            return Err(Error::InvalidConfig("resolution must be > 0".into()));
        }
        if !self.generate_range.is_finite() || self.generate_range < 0.0 {
            return Err(Error::InvalidConfig("generate_range must be >= 0".into()));
        }
        if self.stock_margin < 0 {
            return Err(Error::InvalidConfig("stock_margin must be >= 0".into()));
        }
        if self.multithreading && self.max_threads == 0 {
            return Err(Error::InvalidConfig(
                "max_threads must be > 0 when multithreading is enabled".into(),
            ));
        }
        if self.apply_steps_per_tick == 0 {
            return Err(Error::InvalidConfig(
                "apply_steps_per_tick must be > 0".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SessionConfig::default()
            .validate()
            .expect("default config validates");
    }

    #[test]
    fn builder_sets_fields() {
        let config = SessionConfig::new(50.0, 16)
            .with_generate_range(120.0)
            .with_stock_margin(2)
            .with_max_threads(1)
            .with_save_intermediate(false)
            .with_seed(9);
        assert_eq!(config.chunk_size, 50.0);
        assert_eq!(config.resolution, 16);
        assert_eq!(config.stock_margin, 2);
        assert!(!config.save_intermediate);
        assert_eq!(config.seed, 9);
        assert_eq!(config.range_in_chunks(), 3);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad = [
            SessionConfig::new(0.0, 16),
            SessionConfig::new(10.0, 0),
            SessionConfig::new(10.0, 4).with_generate_range(-1.0),
            SessionConfig::new(10.0, 4).with_stock_margin(-1),
            SessionConfig::new(10.0, 4).with_max_threads(0),
            SessionConfig::new(10.0, 4).with_apply_steps_per_tick(0),
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        }
    }

    #[test]
    fn inline_mode_tolerates_zero_threads() {
        let config = SessionConfig::new(10.0, 4)
            .with_multithreading(false)
            .with_max_threads(0);
        assert!(config.validate().is_ok());
    }
}
