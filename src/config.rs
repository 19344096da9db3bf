//! Store Configuration

use std::time::Duration;
use tracing::warn;

/// Default interval between background sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Default mapping size that triggers an inline sweep.
pub const DEFAULT_SIZE_THRESHOLD: usize = 1000;

/// Reclamation strategy for expired entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStrategy {
    /// Dedicated background task sweeps on a fixed interval
    Background,
    /// Hot-path calls sweep inline once the mapping grows past a threshold
    Threshold,
    /// No proactive reclamation; expired entries are removed lazily on access
    None,
}

impl Default for CleanupStrategy {
    fn default() -> Self {
        Self::Background
    }
}

/// Store configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Reclamation strategy
    pub strategy: CleanupStrategy,

    /// Interval between background sweeps (used with `Background`)
    pub sweep_interval: Duration,

    /// Mapping size that triggers an inline sweep (used with `Threshold`)
    pub size_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: CleanupStrategy::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            size_threshold: DEFAULT_SIZE_THRESHOLD,
        }
    }
}

impl Config {
    /// Set the reclamation strategy
    pub fn with_strategy(mut self, strategy: CleanupStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the background sweep interval
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the inline sweep size threshold
    pub fn with_size_threshold(mut self, threshold: usize) -> Self {
        self.size_threshold = threshold;
        self
    }

    /// Replace zero values with the documented defaults.
    ///
    /// A zero interval or threshold can never be honored (the sweeper would
    /// spin, the threshold would fire on an empty map), so construction
    /// corrects them instead of failing.
    pub(crate) fn sanitized(mut self) -> Self {
        if self.sweep_interval.is_zero() {
            warn!(
                default = ?DEFAULT_SWEEP_INTERVAL,
                "zero sweep interval corrected to default"
            );
            self.sweep_interval = DEFAULT_SWEEP_INTERVAL;
        }
        if self.size_threshold == 0 {
            warn!(
                default = DEFAULT_SIZE_THRESHOLD,
                "zero size threshold corrected to default"
            );
            self.size_threshold = DEFAULT_SIZE_THRESHOLD;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.strategy, CleanupStrategy::Background);
        assert_eq!(config.sweep_interval, DEFAULT_SWEEP_INTERVAL);
        assert_eq!(config.size_threshold, DEFAULT_SIZE_THRESHOLD);
    }

    #[test]
    fn test_builder_chaining() {
        let config = Config::default()
            .with_strategy(CleanupStrategy::Threshold)
            .with_sweep_interval(Duration::from_millis(250))
            .with_size_threshold(64);

        assert_eq!(config.strategy, CleanupStrategy::Threshold);
        assert_eq!(config.sweep_interval, Duration::from_millis(250));
        assert_eq!(config.size_threshold, 64);
    }

    #[test]
    fn test_zero_values_corrected() {
        let config = Config::default()
            .with_sweep_interval(Duration::ZERO)
            .with_size_threshold(0)
            .sanitized();

        assert_eq!(config.sweep_interval, DEFAULT_SWEEP_INTERVAL);
        assert_eq!(config.size_threshold, DEFAULT_SIZE_THRESHOLD);
    }

    #[test]
    fn test_valid_values_untouched() {
        let config = Config::default()
            .with_sweep_interval(Duration::from_millis(10))
            .with_size_threshold(1)
            .sanitized();

        assert_eq!(config.sweep_interval, Duration::from_millis(10));
        assert_eq!(config.size_threshold, 1);
    }
}
